use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use dealboard_core::board::Board;
use dealboard_core::contracts::RecordStore;
use dealboard_core::detail::AddDetail;
use dealboard_core::expansion::Phase;
use dealboard_core::filter;
use dealboard_core::{ActionItem, ActionItemId, ActionStatus, DealId, Stage};

use super::canvas::{Canvas, Hit};

/// What the keyboard currently drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    /// Keyboard drag of a grabbed card.
    Grab,
    Input,
}

/// Which half of the board has keyboard focus while a detail panel is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Cards,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    Note,
    ItemTitle,
    Assign(ActionItemId),
    Due(ActionItemId),
    BulkMove,
}

impl PromptKind {
    pub fn label(self) -> &'static str {
        match self {
            PromptKind::Search => "Search",
            PromptKind::Note => "Note",
            PromptKind::ItemTitle => "New action item",
            PromptKind::Assign(_) => "Assign to (empty clears)",
            PromptKind::Due(_) => "Due YYYY-MM-DD (empty clears)",
            PromptKind::BulkMove => "Move selected to stage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

/// Facets that can be stepped from the board without a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Facet {
    Region,
    Owner,
    Handoff,
}

/// Pointer press that may turn into a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    deal: DealId,
    dragging: bool,
}

/// Application state for the board TUI.
pub struct App<S: RecordStore> {
    pub board: Board<S>,
    pub canvas: Canvas,
    pub should_quit: bool,
    pub mode: Mode,
    pub focus: Focus,
    pub prompt: Option<Prompt>,
    pub message: Option<String>,
    /// Cursor: index into the visible stages and row within that column.
    pub cursor: (usize, usize),
    pub item_cursor: usize,
    press: Option<Press>,
}

impl<S: RecordStore> App<S> {
    pub fn new(board: Board<S>) -> Self {
        Self {
            board,
            canvas: Canvas::new(),
            should_quit: false,
            mode: Mode::Browse,
            focus: Focus::Cards,
            prompt: None,
            message: None,
            cursor: (0, 0),
            item_cursor: 0,
            press: None,
        }
    }

    // ── Derived views ──

    /// Card ids per visible column, in display order.
    pub fn columns(&self) -> Vec<(Stage, Vec<DealId>)> {
        let outcome = self.board.outcome();
        outcome
            .visible_stages
            .iter()
            .map(|stage| (*stage, outcome.column(*stage).iter().map(|d| d.id).collect()))
            .collect()
    }

    pub fn cursor_deal(&self) -> Option<DealId> {
        let columns = self.columns();
        let (_, ids) = columns.get(self.cursor.0)?;
        ids.get(self.cursor.1).copied()
    }

    /// Items of the open panel in display order: active first, then closed.
    pub fn detail_items(&self) -> Vec<&ActionItem> {
        match self.board.detail() {
            Some(panel) => panel.active_items().chain(panel.closed_items()).collect(),
            None => Vec::new(),
        }
    }

    fn selected_item(&self) -> Option<&ActionItem> {
        self.detail_items().get(self.item_cursor).copied()
    }

    fn clamp_cursor(&mut self) {
        let columns = self.columns();
        if columns.is_empty() {
            self.cursor = (0, 0);
            return;
        }
        self.cursor.0 = self.cursor.0.min(columns.len() - 1);
        let len = columns[self.cursor.0].1.len();
        self.cursor.1 = self.cursor.1.min(len.saturating_sub(1));
        let items = self.detail_items().len();
        self.item_cursor = self.item_cursor.min(items.saturating_sub(1));
        if self.board.detail().is_none() {
            self.focus = Focus::Cards;
        }
    }

    // ── Timing ──

    pub fn tick(&mut self, now: Instant) {
        self.board.tick(now, &mut self.canvas);
        self.clamp_cursor();
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.canvas.is_animating()
            || self.board.has_pending_layout()
            || self.board.transition_progress(now).is_some()
    }

    // ── Keys ──

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.handle_key_at(key, Instant::now());
    }

    pub fn handle_key_at(&mut self, key: KeyEvent, now: Instant) {
        match self.mode {
            Mode::Input => self.handle_prompt_key(key),
            Mode::Grab => self.handle_grab_key(key),
            Mode::Browse => {
                self.message = None;
                self.board.take_notice();
                self.handle_browse_key(key, now);
            }
        }
        self.clamp_cursor();
    }

    fn handle_browse_key(&mut self, key: KeyEvent, now: Instant) {
        let detail_open = self.board.detail().is_some();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.board.selection().is_active() {
                    self.board.exit_multi_select();
                } else {
                    self.board.close(now, &mut self.canvas);
                }
            }
            KeyCode::Tab if detail_open => {
                self.focus = match self.focus {
                    Focus::Cards => Focus::Detail,
                    Focus::Detail => Focus::Cards,
                };
            }
            KeyCode::Char('h') | KeyCode::Left => {
                self.cursor.0 = self.cursor.0.saturating_sub(1);
            }
            KeyCode::Char('l') | KeyCode::Right => self.cursor.0 += 1,
            KeyCode::Char('j') | KeyCode::Down => match self.focus {
                Focus::Cards => self.cursor.1 += 1,
                Focus::Detail => self.item_cursor += 1,
            },
            KeyCode::Char('k') | KeyCode::Up => match self.focus {
                Focus::Cards => self.cursor.1 = self.cursor.1.saturating_sub(1),
                Focus::Detail => self.item_cursor = self.item_cursor.saturating_sub(1),
            },
            KeyCode::PageDown => self.canvas.scroll_by(0, 10),
            KeyCode::PageUp => self.canvas.scroll_by(0, -10),
            KeyCode::Enter => {
                if let Some(deal) = self.cursor_deal() {
                    self.board.expand(deal, now, &mut self.canvas);
                }
            }
            KeyCode::Char('m') => self.grab(),
            KeyCode::Char('v') => {
                if self.board.selection().is_active() {
                    self.board.exit_multi_select();
                } else if !self.board.enter_multi_select() {
                    self.message = Some("Close the detail panel to select cards.".into());
                }
            }
            KeyCode::Char(' ') if self.board.selection().is_active() => {
                if let Some(deal) = self.cursor_deal() {
                    self.board.toggle_selected(deal);
                }
            }
            KeyCode::Char('b') if self.board.selection().is_active() => {
                if self.board.selection().ids().is_empty() {
                    self.message = Some("Nothing selected.".into());
                } else {
                    self.open_prompt(PromptKind::BulkMove, String::new());
                }
            }
            KeyCode::Char('/') => {
                let current = self.board.filter_state().search.clone();
                self.open_prompt(PromptKind::Search, current);
            }
            KeyCode::Char('R') => self.step_facet(Facet::Region),
            KeyCode::Char('O') => self.step_facet(Facet::Owner),
            KeyCode::Char('H') => self.step_facet(Facet::Handoff),
            KeyCode::Char('c') => {
                self.board.set_filter(Default::default());
                self.message = Some("Filter cleared.".into());
            }
            KeyCode::Char('r') => {
                self.board.reload();
                self.board.with_detail(|panel, store| panel.refresh(store));
            }
            KeyCode::Char('n') if detail_open => self.open_prompt(PromptKind::Note, String::new()),
            KeyCode::Char('a') if detail_open => {
                self.open_prompt(PromptKind::ItemTitle, String::new())
            }
            KeyCode::Char('s') if detail_open => self.cycle_status(),
            KeyCode::Char('x') if detail_open => self.set_status(ActionStatus::Cancelled),
            KeyCode::Char('d') if detail_open => self.delete_item(),
            KeyCode::Char('u') if detail_open => {
                if let Some(item) = self.selected_item() {
                    let current = item.assigned_to.clone().unwrap_or_default();
                    let id = item.id;
                    self.open_prompt(PromptKind::Assign(id), current);
                }
            }
            KeyCode::Char('D') if detail_open => {
                if let Some(item) = self.selected_item() {
                    let current = item.due_date.clone().unwrap_or_default();
                    let id = item.id;
                    self.open_prompt(PromptKind::Due(id), current);
                }
            }
            _ => {}
        }
    }

    fn handle_grab_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('h') | KeyCode::Left => self.board.drag_step(false),
            KeyCode::Char('l') | KeyCode::Right => self.board.drag_step(true),
            KeyCode::Enter | KeyCode::Char('m') => {
                if let Some(change) = self.board.release_drag() {
                    self.message = Some(format!("Moved #{} to {}.", change.deal, change.to));
                    self.follow(change.deal);
                }
                self.mode = Mode::Browse;
            }
            KeyCode::Esc => {
                self.board.cancel_drag();
                self.mode = Mode::Browse;
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            self.mode = Mode::Browse;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                self.mode = Mode::Browse;
            }
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.mode = Mode::Browse;
                    self.submit(prompt);
                }
            }
            KeyCode::Backspace => {
                prompt.buffer.pop();
            }
            KeyCode::Char(c) => prompt.buffer.push(c),
            _ => {}
        }
    }

    // ── Mouse ──

    /// Pointer input. `area_top` is the screen row of the canvas.
    pub fn handle_mouse(&mut self, mouse: MouseEvent, area_top: u16) {
        self.handle_mouse_at(mouse, area_top, Instant::now());
    }

    pub fn handle_mouse_at(&mut self, mouse: MouseEvent, area_top: u16, now: Instant) {
        if self.mode == Mode::Input {
            return;
        }
        let hit = mouse
            .row
            .checked_sub(area_top)
            .and_then(|row| self.canvas.hit_test(mouse.column, row));
        match mouse.kind {
            MouseEventKind::ScrollDown => self.canvas.scroll_by(0, 3),
            MouseEventKind::ScrollUp => self.canvas.scroll_by(0, -3),
            MouseEventKind::ScrollRight => self.canvas.scroll_by(4, 0),
            MouseEventKind::ScrollLeft => self.canvas.scroll_by(-4, 0),
            MouseEventKind::Down(MouseButton::Left) => {
                self.press = match hit {
                    Some(Hit::Card(deal, _)) => Some(Press {
                        deal,
                        dragging: false,
                    }),
                    _ => None,
                };
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some(press) = self.press.as_mut() else { return };
                if !press.dragging {
                    press.dragging = self.board.begin_drag(press.deal);
                    if press.dragging {
                        self.mode = Mode::Grab;
                    }
                }
                if press.dragging {
                    let over = match hit {
                        Some(Hit::Card(_, stage)) | Some(Hit::Column(stage)) => Some(stage),
                        _ => None,
                    };
                    self.board.drag_hover(over);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(press) = self.press.take() else { return };
                if press.dragging {
                    if let Some(change) = self.board.release_drag() {
                        self.message = Some(format!("Moved #{} to {}.", change.deal, change.to));
                    }
                    self.mode = Mode::Browse;
                } else if self.board.selection().is_active() {
                    self.board.toggle_selected(press.deal);
                } else {
                    self.follow(press.deal);
                    self.board.expand(press.deal, now, &mut self.canvas);
                }
            }
            _ => {}
        }
        self.clamp_cursor();
    }

    // ── Actions ──

    fn grab(&mut self) {
        let Some(deal) = self.cursor_deal() else { return };
        if self.board.begin_drag(deal) {
            self.mode = Mode::Grab;
        } else {
            self.message = Some("Close the detail panel to move cards.".into());
        }
    }

    /// Put the cursor on `deal` wherever it now sits.
    fn follow(&mut self, deal: DealId) {
        for (col, (_, ids)) in self.columns().iter().enumerate() {
            if let Some(row) = ids.iter().position(|id| *id == deal) {
                self.cursor = (col, row);
                return;
            }
        }
    }

    fn open_prompt(&mut self, kind: PromptKind, buffer: String) {
        self.prompt = Some(Prompt { kind, buffer });
        self.mode = Mode::Input;
    }

    fn submit(&mut self, prompt: Prompt) {
        let text = prompt.buffer.trim().to_string();
        let optional = (!text.is_empty()).then(|| text.clone());
        match prompt.kind {
            PromptKind::Search => {
                let mut state = self.board.filter_state().clone();
                state.search = text;
                self.board.set_filter(state);
            }
            PromptKind::Note => {
                self.board
                    .with_detail(|panel, store| panel.add_detail(store, AddDetail::Note { message: text }));
            }
            PromptKind::ItemTitle => {
                self.board.with_detail(|panel, store| {
                    panel.add_detail(
                        store,
                        AddDetail::ActionItem {
                            title: text,
                            assigned_to: None,
                            due_date: None,
                            priority: 3,
                        },
                    )
                });
            }
            PromptKind::Assign(id) => {
                self.board
                    .with_detail(|panel, store| panel.set_assignee(store, id, optional));
            }
            PromptKind::Due(id) => {
                if let Some(date) = &optional {
                    if !is_iso_date(date) {
                        self.message = Some(format!("Not a date: {date}"));
                        return;
                    }
                }
                self.board
                    .with_detail(|panel, store| panel.set_due_date(store, id, optional));
            }
            PromptKind::BulkMove => match text.parse::<Stage>() {
                Ok(stage) => {
                    let moved = self.board.bulk_move(stage);
                    self.message = Some(format!("Moved {moved} deals to {stage}."));
                }
                Err(e) => self.message = Some(e),
            },
        }
    }

    /// Advance one facet through the values present on the board.
    fn step_facet(&mut self, facet: Facet) {
        let catalogue = self.board.catalogue();
        let mut state = self.board.filter_state().clone();
        let (name, offered, chosen) = match facet {
            Facet::Region => ("Region", &catalogue.regions, &mut state.regions),
            Facet::Owner => ("Owner", &catalogue.owners, &mut state.owners),
            Facet::Handoff => ("Handoff", &catalogue.handoff, &mut state.handoff),
        };
        *chosen = filter::step_facet(offered, chosen);
        let shown = chosen.first().cloned().unwrap_or_else(|| "all".into());
        self.message = Some(format!("{name}: {shown}"));
        self.board.set_filter(state);
    }

    fn cycle_status(&mut self) {
        let Some(item) = self.selected_item() else { return };
        let next = match item.status {
            ActionStatus::Open => ActionStatus::InProgress,
            ActionStatus::InProgress => ActionStatus::Completed,
            ActionStatus::Completed | ActionStatus::Cancelled => ActionStatus::Open,
        };
        self.set_status(next);
    }

    fn set_status(&mut self, status: ActionStatus) {
        let Some(id) = self.selected_item().map(|i| i.id) else { return };
        self.board
            .with_detail(|panel, store| panel.set_status(store, id, status));
    }

    fn delete_item(&mut self) {
        let Some(id) = self.selected_item().map(|i| i.id) else { return };
        self.board
            .with_detail(|panel, store| panel.delete_item(store, id));
    }

    /// Status-bar text: the newest board notice, else the app's own message.
    pub fn status_message(&self) -> Option<&str> {
        self.board.notice().or(self.message.as_deref())
    }

    pub fn phase(&self) -> Phase {
        self.board.phase()
    }
}

fn is_iso_date(s: &str) -> bool {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(s, &format).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use dealboard_core::config::BoardConfig;
    use dealboard_core::contracts::AuditLog;
    use dealboard_core::memory::{MemoryPrefs, MemoryStore, Op};
    use dealboard_core::Deal;
    use time::macros::datetime;

    fn deal(id: u64, stage: Stage) -> Deal {
        Deal {
            id,
            name: format!("Deal {id}"),
            project: None,
            lead_name: None,
            customer: "Acme".into(),
            region: "North".into(),
            owner: "u1".into(),
            probability: 50,
            contract_value: 1000.0,
            currency: "EUR".into(),
            expected_close: None,
            priority: 3,
            handoff_status: None,
            stage,
            updated_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    fn app() -> App<MemoryStore> {
        app_with(vec![
            deal(1, Stage::Discussions),
            deal(2, Stage::Discussions),
            deal(3, Stage::Rfq),
        ])
    }

    fn app_with(deals: Vec<Deal>) -> App<MemoryStore> {
        let store = MemoryStore::with_deals(deals);
        let config = BoardConfig {
            transition_ms: 0,
            switch_yield_ms: 0,
            ..Default::default()
        };
        App::new(Board::new(store, Box::new(MemoryPrefs::new()), config))
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode, now: Instant) {
        app.handle_key_at(KeyEvent::new(code, KeyModifiers::empty()), now);
    }

    fn type_text(app: &mut App<MemoryStore>, text: &str, now: Instant) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), now);
        }
    }

    fn expand_cursor(app: &mut App<MemoryStore>) -> Instant {
        let now = Instant::now();
        press(app, KeyCode::Enter, now);
        app.tick(now);
        now
    }

    #[test]
    fn owner_key_steps_through_board_owners() {
        let mut other = deal(3, Stage::Rfq);
        other.owner = "u2".into();
        let mut app = app_with(vec![deal(1, Stage::Discussions), other]);
        let now = Instant::now();

        press(&mut app, KeyCode::Char('O'), now);
        assert_eq!(app.board.filter_state().owners, ["u1".to_string()].into());
        assert_eq!(app.board.outcome().filtered.len(), 1);
        assert_eq!(app.message.as_deref(), Some("Owner: u1"));

        press(&mut app, KeyCode::Char('O'), now);
        assert_eq!(app.board.outcome().filtered[0].id, 3);

        press(&mut app, KeyCode::Char('O'), now);
        assert!(app.board.filter_state().is_empty());
        assert_eq!(app.message.as_deref(), Some("Owner: all"));
    }

    #[test]
    fn quit_on_q() {
        let mut app = app();
        press(&mut app, KeyCode::Char('q'), Instant::now());
        assert!(app.should_quit);
    }

    #[test]
    fn cursor_moves_and_clamps() {
        let mut app = app();
        let now = Instant::now();
        assert_eq!(app.cursor_deal(), Some(1));
        press(&mut app, KeyCode::Char('j'), now);
        assert_eq!(app.cursor_deal(), Some(2));
        press(&mut app, KeyCode::Char('j'), now);
        assert_eq!(app.cursor_deal(), Some(2));
        press(&mut app, KeyCode::Right, now);
        assert_eq!(app.cursor.0, 1);
        assert_eq!(app.cursor_deal(), None);
        for _ in 0..10 {
            press(&mut app, KeyCode::Right, now);
        }
        assert_eq!(app.cursor.0, app.columns().len() - 1);
    }

    #[test]
    fn enter_expands_and_esc_closes() {
        let mut app = app();
        let now = expand_cursor(&mut app);
        assert_eq!(app.phase(), Phase::Expanded);
        assert!(app.board.detail().is_some());
        press(&mut app, KeyCode::Esc, now);
        app.tick(now);
        assert_eq!(app.phase(), Phase::Idle);
        assert!(app.board.detail().is_none());
    }

    #[test]
    fn keyboard_drag_moves_deal() {
        let mut app = app();
        let now = Instant::now();
        press(&mut app, KeyCode::Char('m'), now);
        assert_eq!(app.mode, Mode::Grab);
        press(&mut app, KeyCode::Char('l'), now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.mode, Mode::Browse);
        let moved = app.board.store().deals().into_iter().find(|d| d.id == 1).unwrap();
        assert_eq!(moved.stage, Stage::Qualified);
    }

    #[test]
    fn grab_refused_while_expanded() {
        let mut app = app();
        let now = expand_cursor(&mut app);
        press(&mut app, KeyCode::Char('m'), now);
        assert_eq!(app.mode, Mode::Browse);
        assert!(app.message.is_some());
        press(&mut app, KeyCode::Char('v'), now);
        assert!(!app.board.selection().is_active());
    }

    #[test]
    fn failed_drop_notice_clears_on_next_key() {
        let mut app = app();
        let now = Instant::now();
        app.board.store().fail_next(Op::UpdateStage, 1);
        press(&mut app, KeyCode::Char('m'), now);
        press(&mut app, KeyCode::Char('l'), now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.status_message(), Some("Could not move deal 1 to Qualified."));

        press(&mut app, KeyCode::Char('j'), now);
        assert_eq!(app.status_message(), None);
    }

    #[test]
    fn multi_select_bulk_move() {
        let mut app = app();
        let now = Instant::now();
        press(&mut app, KeyCode::Char('v'), now);
        press(&mut app, KeyCode::Char(' '), now);
        press(&mut app, KeyCode::Char('j'), now);
        press(&mut app, KeyCode::Char(' '), now);
        press(&mut app, KeyCode::Char('b'), now);
        assert_eq!(app.mode, Mode::Input);
        type_text(&mut app, "offered", now);
        press(&mut app, KeyCode::Enter, now);
        let deals = app.board.store().deals();
        assert!(deals
            .iter()
            .filter(|d| d.id != 3)
            .all(|d| d.stage == Stage::Offered));
        assert!(!app.board.selection().is_active());
    }

    #[test]
    fn search_prompt_sets_filter() {
        let mut app = app();
        let now = Instant::now();
        press(&mut app, KeyCode::Char('/'), now);
        type_text(&mut app, "deal 3", now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.board.filter_state().search, "deal 3");
        assert_eq!(app.board.outcome().filtered.len(), 1);
        press(&mut app, KeyCode::Char('c'), now);
        assert!(app.board.filter_state().is_empty());
    }

    #[test]
    fn note_and_item_from_detail() {
        let mut app = app();
        let now = expand_cursor(&mut app);
        press(&mut app, KeyCode::Char('n'), now);
        type_text(&mut app, "Called buyer", now);
        press(&mut app, KeyCode::Enter, now);
        let rows = app.board.store().list_audit_log("deal", 1).unwrap();
        assert_eq!(rows.len(), 1);

        press(&mut app, KeyCode::Char('a'), now);
        type_text(&mut app, "Send drawings", now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.detail_items().len(), 1);

        press(&mut app, KeyCode::Tab, now);
        assert_eq!(app.focus, Focus::Detail);
        press(&mut app, KeyCode::Char('s'), now);
        press(&mut app, KeyCode::Char('s'), now);
        assert_eq!(app.detail_items()[0].status, ActionStatus::Completed);
        let timeline = app.board.detail().unwrap().timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[1].message, "Send drawings → Completed");
    }

    #[test]
    fn due_prompt_rejects_bad_date() {
        let mut app = app();
        let now = expand_cursor(&mut app);
        press(&mut app, KeyCode::Char('a'), now);
        type_text(&mut app, "Quote", now);
        press(&mut app, KeyCode::Enter, now);
        press(&mut app, KeyCode::Char('D'), now);
        type_text(&mut app, "soon", now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.message.as_deref(), Some("Not a date: soon"));
        assert!(app.detail_items()[0].due_date.is_none());
    }
}
