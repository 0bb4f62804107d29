//! The deal board: owns every piece of board state and runs the effects the
//! expansion machine asks for.
//!
//! The host drives it with three calls: [`Board::dispatch`] for user
//! requests, [`Board::tick`] when wall-clock time passes, and
//! [`Board::frame_painted`] after each completed paint.

use std::time::{Duration, Instant};

use crate::config::BoardConfig;
use crate::contracts::{DisplayNameCache, FilterPrefs, RecordStore, StoreResult};
use crate::detail::DetailPanel;
use crate::dragdrop::{DragDropController, StageChange};
use crate::expansion::{Action, AlignPass, Effect, Expansion, ExpansionMachine, Phase, TimerPurpose, TimerToken};
use crate::filter::{self, FacetCatalogue, FilterOutcome, FilterState};
use crate::grid::{GridLayoutPlanner, GridPlan};
use crate::scroll::{ScrollContainer, ScrollCoordinator};
use crate::select::Selection;
use crate::settle::LayoutSettleBarrier;
use crate::timeline::TimelineEntry;
use crate::types::{Deal, DealId, RecordRef, Stage};

/// An alignment pass waiting on the settle barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AlignRequest {
    deal: DealId,
    stage: Stage,
    pass: AlignPass,
}

pub struct Board<S: RecordStore> {
    store: S,
    prefs: Box<dyn FilterPrefs>,
    config: BoardConfig,
    deals: Vec<Deal>,
    filter: FilterState,
    outcome: FilterOutcome,
    catalogue: FacetCatalogue,
    planner: GridLayoutPlanner,
    machine: ExpansionMachine,
    scroll: ScrollCoordinator,
    barrier: LayoutSettleBarrier<AlignRequest>,
    timers: Vec<(Instant, TimerToken)>,
    drag: DragDropController,
    selection: Selection,
    detail: Option<DetailPanel>,
    names: DisplayNameCache,
    notice: Option<String>,
}

impl<S: RecordStore> Board<S> {
    /// Build the board and load deals plus the persisted filter.
    pub fn new(store: S, prefs: Box<dyn FilterPrefs>, config: BoardConfig) -> Self {
        let filter = match prefs.load() {
            Ok(saved) => saved.unwrap_or_default().normalized(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load saved filters");
                FilterState::default()
            }
        };
        let mut board = Self {
            store,
            prefs,
            planner: GridLayoutPlanner::new(config.clone()),
            machine: ExpansionMachine::new(config.transition(), config.switch_yield()),
            scroll: ScrollCoordinator::new(config.scroll_margin),
            barrier: LayoutSettleBarrier::new(config.settle_frames),
            config,
            deals: Vec::new(),
            filter,
            outcome: FilterOutcome::default(),
            catalogue: FacetCatalogue::default(),
            timers: Vec::new(),
            drag: DragDropController::new(),
            selection: Selection::default(),
            detail: None,
            names: DisplayNameCache::new(),
            notice: None,
        };
        board.reload();
        board
    }

    // ── Accessors ──

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn deal(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn outcome(&self) -> &FilterOutcome {
        &self.outcome
    }

    pub fn visible_stages(&self) -> &[Stage] {
        &self.outcome.visible_stages
    }

    pub fn catalogue(&self) -> &FacetCatalogue {
        &self.catalogue
    }

    pub fn expansion(&self) -> &Expansion {
        self.machine.state()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    /// Column plan for the current stages and expansion.
    pub fn plan(&mut self) -> &GridPlan {
        self.planner.plan(&self.outcome.visible_stages, self.machine.state())
    }

    pub fn detail(&self) -> Option<&DetailPanel> {
        self.detail.as_ref()
    }

    pub fn drag(&self) -> &DragDropController {
        &self.drag
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn spacer_height(&self) -> u32 {
        self.scroll.spacer_height()
    }

    /// Latest notice from the board or the detail panel.
    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_deref()
            .or_else(|| self.detail.as_ref().and_then(|d| d.notice()))
    }

    /// Dismiss the board notice and the panel notice, returning the one
    /// that was shown.
    pub fn take_notice(&mut self) -> Option<String> {
        let panel = self.detail.as_mut().and_then(|d| d.take_notice());
        self.notice.take().or(panel)
    }

    // ── Data ──

    /// Re-query deals. A failed query shows an empty board.
    pub fn reload(&mut self) {
        self.deals = match self.store.list_deals() {
            Ok(deals) => deals,
            Err(e) => {
                tracing::warn!(error = %e, "deal fetch failed, showing empty board");
                self.notice = Some("Could not load deals.".to_string());
                Vec::new()
            }
        };
        self.catalogue = FacetCatalogue::from_deals(&self.deals);
        self.selection.retain_existing(&self.deals);
        self.refilter();
    }

    /// Replace the filter, persist it (last write wins), and re-filter.
    pub fn set_filter(&mut self, state: FilterState) {
        self.filter = state.normalized();
        if let Err(e) = self.prefs.save(&self.filter) {
            tracing::warn!(error = %e, "could not save filters");
        }
        self.refilter();
    }

    fn refilter(&mut self) {
        self.outcome = filter::filter(&self.deals, &self.filter);
    }

    // ── Expansion ──

    /// Run one expansion action and carry out its effects.
    pub fn dispatch(&mut self, action: Action, now: Instant, container: &mut dyn ScrollContainer) {
        let outcome = &self.outcome;
        let effects = self.machine.dispatch(action, |id| outcome.stage_of(id));
        for effect in effects {
            self.apply(effect, now, container);
        }
        // Gestures are only live while nothing is expanded.
        self.drag.set_enabled(self.machine.is_idle());
    }

    pub fn expand(&mut self, deal: DealId, now: Instant, container: &mut dyn ScrollContainer) {
        self.dispatch(Action::Expand(deal), now, container);
    }

    pub fn close(&mut self, now: Instant, container: &mut dyn ScrollContainer) {
        self.dispatch(Action::Close, now, container);
    }

    fn apply(&mut self, effect: Effect, now: Instant, container: &mut dyn ScrollContainer) {
        match effect {
            Effect::CancelDrag => self.drag.cancel(),
            Effect::ClearSelection => self.selection.exit(),
            Effect::SnapshotScroll => self.scroll.on_expand_begin(container),
            Effect::OpenDetail(deal) => {
                let mut panel = DetailPanel::open(RecordRef::deal(deal));
                panel.refresh(&self.store);
                self.detail = Some(panel);
            }
            Effect::Align { deal, stage, pass } => {
                self.barrier.arm(AlignRequest { deal, stage, pass });
            }
            Effect::StartTimer { token, after } => self.timers.push((now + after, token)),
            Effect::CloseDetail => {
                self.detail = None;
                self.barrier.clear();
            }
            Effect::RestoreScroll => self.scroll.on_collapse_complete(container),
        }
    }

    /// Fire every timer due at `now`, earliest first.
    pub fn tick(&mut self, now: Instant, container: &mut dyn ScrollContainer) {
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, (at, _))| *at <= now)
                .min_by_key(|(_, (at, _))| *at)
                .map(|(i, _)| i);
            let Some(i) = due else { break };
            let (_, token) = self.timers.remove(i);
            self.dispatch(Action::TimerElapsed(token), now, container);
        }
    }

    /// Earliest pending timer, for the host's poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|(at, _)| *at).min()
    }

    /// Fraction of the running transition that has elapsed, `None` when no
    /// transition is running.
    pub fn transition_progress(&self, now: Instant) -> Option<f32> {
        let purpose = match self.machine.phase() {
            Phase::Expanding => TimerPurpose::Settle,
            Phase::Collapsing => TimerPurpose::Collapse,
            Phase::Idle | Phase::Expanded => return None,
        };
        let total = self.machine.transition();
        let (deadline, _) = self
            .timers
            .iter()
            .rev()
            .find(|(_, token)| token.purpose == purpose)?;
        if total.is_zero() {
            return Some(1.0);
        }
        let remaining = deadline.saturating_duration_since(now);
        Some(1.0 - remaining.as_secs_f32() / total.as_secs_f32())
    }

    /// Report a completed paint; runs alignment passes whose layout has settled.
    pub fn frame_painted(&mut self, container: &mut dyn ScrollContainer) {
        for request in self.barrier.frame_painted() {
            let current = self.machine.state();
            let live = current.active() == Some((request.deal, request.stage))
                && current.phase() != Phase::Collapsing;
            if !live {
                continue;
            }
            tracing::debug!(deal = request.deal, pass = ?request.pass, "align released");
            self.scroll
                .on_layout_settled(container, request.deal, request.stage);
        }
    }

    /// True while an alignment pass waits for painted frames.
    pub fn has_pending_layout(&self) -> bool {
        !self.barrier.is_empty()
    }

    /// The viewport changed size: pending alignments wait for a new settle.
    pub fn viewport_resized(&mut self) {
        self.barrier.invalidate();
    }

    // ── Stage changes ──

    /// Persist a stage change and re-query the board.
    pub fn move_deal(&mut self, deal: DealId, to: Stage) -> StoreResult<()> {
        let from = self.deal(deal).map(|d| d.stage);
        let result = self.store.update_deal_stage(deal, to);
        match &result {
            Ok(()) => tracing::info!(deal, ?from, to = %to, "stage changed"),
            Err(e) => {
                tracing::warn!(deal, to = %to, error = %e, "stage change failed");
                self.notice = Some(format!("Could not move deal {deal} to {to}."));
            }
        }
        self.reload();
        result
    }

    /// Pick up a card for dragging. Refused unless the board is idle.
    pub fn begin_drag(&mut self, deal: DealId) -> bool {
        if !self.machine.is_idle() {
            return false;
        }
        match self.outcome.stage_of(deal) {
            Some(stage) => self.drag.begin(deal, stage),
            None => false,
        }
    }

    pub fn drag_hover(&mut self, stage: Option<Stage>) {
        self.drag.hover(stage);
    }

    /// Keyboard drag: step the hover target across visible columns.
    pub fn drag_step(&mut self, forward: bool) {
        self.drag.hover_step(&self.outcome.visible_stages, forward);
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Drop the dragged card; persists the resulting stage change, if any.
    pub fn release_drag(&mut self) -> Option<StageChange> {
        let change = self.drag.release()?;
        self.move_deal(change.deal, change.to).ok()?;
        Some(change)
    }

    // ── Multi-select ──

    /// Enter multi-select mode. Refused unless the board is idle.
    pub fn enter_multi_select(&mut self) -> bool {
        if !self.machine.is_idle() {
            return false;
        }
        self.selection.enter();
        true
    }

    pub fn exit_multi_select(&mut self) {
        self.selection.exit();
    }

    pub fn toggle_selected(&mut self, deal: DealId) {
        if self.machine.is_idle() {
            self.selection.toggle(deal);
        }
    }

    /// Move every selected deal to `to`. Each move stands alone; returns
    /// how many went through.
    pub fn bulk_move(&mut self, to: Stage) -> usize {
        if !self.machine.is_idle() {
            return 0;
        }
        let changes = self.selection.bulk_move(&self.deals, to);
        let total = changes.len();
        let mut moved = 0;
        for change in changes {
            match self.store.update_deal_stage(change.deal, change.to) {
                Ok(()) => moved += 1,
                Err(e) => tracing::warn!(deal = change.deal, error = %e, "bulk move failed"),
            }
        }
        if moved < total {
            self.notice = Some(format!("Moved {moved} of {total} deals to {to}."));
        }
        tracing::info!(moved, total, to = %to, "bulk stage move");
        self.selection.exit();
        self.reload();
        moved
    }

    // ── Detail panel ──

    /// Run a detail-panel operation against the store.
    pub fn with_detail<R>(&mut self, f: impl FnOnce(&mut DetailPanel, &S) -> R) -> Option<R> {
        let panel = self.detail.as_mut()?;
        Some(f(panel, &self.store))
    }

    /// Timeline of the open panel with each entry's author resolved.
    pub fn attributed_timeline(&self) -> Vec<(String, &TimelineEntry)> {
        let Some(panel) = &self.detail else {
            return Vec::new();
        };
        panel
            .timeline()
            .iter()
            .map(|e| (self.names.name(&self.store, e.user_id.as_deref()), e))
            .collect()
    }

    /// Resolve a user id through the board's name cache.
    pub fn display_name(&self, user_id: Option<&str>) -> String {
        self.names.name(&self.store, user_id)
    }

    /// Fire the timers due `d` after `now`; returns that later instant.
    pub fn advance(&mut self, now: Instant, d: Duration, container: &mut dyn ScrollContainer) -> Instant {
        let later = now + d;
        self.tick(later, container);
        later
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::AddDetail;
    use crate::filter::tests::deal;
    use crate::memory::{MemoryPrefs, MemoryStore, Op};
    use crate::scroll::tests::{canvas, FakeCanvas};
    use crate::scroll::ScrollOffset;
    use crate::types::ActionStatus;

    const D: Duration = Duration::from_millis(300);
    const YIELD: Duration = Duration::from_millis(30);

    fn board() -> Board<MemoryStore> {
        let store = MemoryStore::with_deals(vec![
            deal(1, Stage::Lead),
            deal(2, Stage::Rfq),
            deal(3, Stage::Won),
        ]);
        Board::new(store, Box::new(MemoryPrefs::new()), BoardConfig::default())
    }

    fn paint(b: &mut Board<MemoryStore>, c: &mut FakeCanvas, frames: usize) {
        for _ in 0..frames {
            b.frame_painted(c);
        }
    }

    #[test]
    fn expand_then_collapse_restores_scroll() {
        let mut b = board();
        let mut c = canvas();
        let before = c.offset;
        let t0 = Instant::now();

        b.expand(2, t0, &mut c);
        assert_eq!(b.phase(), Phase::Expanding);
        paint(&mut b, &mut c, 2);
        assert!(c.scrolls.is_empty(), "aligned before the layout settled");
        paint(&mut b, &mut c, 1);
        assert_eq!(c.offset, ScrollOffset::new(10, 88));

        let t1 = b.advance(t0, D, &mut c);
        assert_eq!(b.phase(), Phase::Expanded);
        paint(&mut b, &mut c, 3);
        assert_eq!(c.scrolls.len(), 2, "correction pass runs after the transition");

        b.close(t1, &mut c);
        assert_eq!(b.phase(), Phase::Collapsing);
        b.advance(t1, D, &mut c);
        assert_eq!(b.phase(), Phase::Idle);
        assert_eq!(c.offset, before);
        assert!(b.detail().is_none());
    }

    #[test]
    fn expanding_inserts_detail_column_after_stage() {
        let mut b = board();
        let mut c = canvas();
        b.expand(1, Instant::now(), &mut c);
        let plan = b.plan();
        // Lead is the first visible column, so the detail column is second.
        assert_eq!(plan.detail_index(), Some(1));
    }

    #[test]
    fn switching_deals_reopens_after_collapse() {
        let mut b = board();
        let mut c = canvas();
        let before = c.offset;
        let t0 = Instant::now();
        b.expand(1, t0, &mut c);
        let t = b.advance(t0, D, &mut c);
        b.expand(3, t, &mut c);
        assert_eq!(b.expansion().pending(), Some(3));
        let t = b.advance(t, D, &mut c);
        assert_eq!(b.phase(), Phase::Idle);
        let t = b.advance(t, YIELD, &mut c);
        assert_eq!(b.phase(), Phase::Expanding);
        assert_eq!(b.expansion().deal(), Some(3));
        assert_eq!(b.detail().map(|d| d.record().id), Some(3));

        let t = b.advance(t, D, &mut c);
        b.close(t, &mut c);
        b.advance(t, D, &mut c);
        assert_eq!(c.offset, before, "switching keeps the first snapshot");
    }

    #[test]
    fn stale_alignment_is_skipped_after_close() {
        let mut b = board();
        let mut c = canvas();
        let t0 = Instant::now();
        b.expand(2, t0, &mut c);
        b.close(t0, &mut c);
        paint(&mut b, &mut c, 3);
        assert!(c.scrolls.is_empty());
    }

    #[test]
    fn resize_restarts_the_settle_count() {
        let mut b = board();
        let mut c = canvas();
        b.expand(2, Instant::now(), &mut c);
        paint(&mut b, &mut c, 2);
        b.viewport_resized();
        paint(&mut b, &mut c, 2);
        assert!(c.scrolls.is_empty());
        paint(&mut b, &mut c, 1);
        assert_eq!(c.scrolls.len(), 1);
    }

    #[test]
    fn gestures_are_disabled_while_expanded() {
        let mut b = board();
        let mut c = canvas();
        assert!(b.enter_multi_select());
        b.toggle_selected(1);
        assert!(b.begin_drag(2));

        let t0 = Instant::now();
        b.expand(2, t0, &mut c);
        assert!(!b.drag().is_dragging());
        assert!(!b.selection().is_active());
        assert!(!b.begin_drag(1));
        assert!(!b.enter_multi_select());

        let t = b.advance(t0, D, &mut c);
        b.close(t, &mut c);
        b.advance(t, D, &mut c);
        assert!(b.begin_drag(1));
    }

    #[test]
    fn drag_release_persists_stage() {
        let mut b = board();
        assert!(b.begin_drag(2));
        b.drag_step(true);
        let change = b.release_drag().unwrap();
        assert_eq!(change.to, Stage::Offered);
        assert_eq!(b.deal(2).map(|d| d.stage), Some(Stage::Offered));
    }

    #[test]
    fn failed_move_raises_notice_and_keeps_stage() {
        let mut b = board();
        b.store().fail_next(Op::UpdateStage, 1);
        assert!(b.move_deal(2, Stage::Won).is_err());
        assert_eq!(b.deal(2).map(|d| d.stage), Some(Stage::Rfq));
        assert!(b.take_notice().is_some());
    }

    #[test]
    fn bulk_move_counts_partial_failures() {
        let mut b = board();
        b.enter_multi_select();
        b.toggle_selected(1);
        b.toggle_selected(2);
        b.store().fail_next(Op::UpdateStage, 1);
        assert_eq!(b.bulk_move(Stage::Won), 1);
        assert_eq!(b.outcome().count(Stage::Won), 2);
        assert!(b.notice().is_some());
        assert!(!b.selection().is_active());
    }

    #[test]
    fn filter_is_persisted_and_restored() {
        let prefs = MemoryPrefs::with(FilterState {
            search: "deal 3".into(),
            ..Default::default()
        });
        let store = MemoryStore::with_deals(vec![deal(1, Stage::Lead), deal(3, Stage::Won)]);
        let mut b = Board::new(store, Box::new(prefs), BoardConfig::default());
        assert_eq!(b.outcome().filtered.len(), 1);
        assert!(!b.visible_stages().contains(&Stage::Lead));

        b.set_filter(FilterState::default());
        assert_eq!(b.outcome().filtered.len(), 2);
        assert!(b.visible_stages().contains(&Stage::Lead));
    }

    #[test]
    fn failed_deal_fetch_shows_empty_board() {
        let store = MemoryStore::with_deals(vec![deal(1, Stage::Lead)]);
        store.fail_next(Op::ListDeals, 1);
        let b = Board::new(store, Box::new(MemoryPrefs::new()), BoardConfig::default());
        assert!(b.deals().is_empty());
        assert!(!b.visible_stages().contains(&Stage::Lead));
        assert!(b.notice().is_some());
    }

    #[test]
    fn timeline_authors_fall_back_to_system() {
        let store = MemoryStore::with_deals(vec![deal(1, Stage::Lead)]).with_actor("u1");
        store.add_user("u1", "Ana Silva");
        let mut b = Board::new(store, Box::new(MemoryPrefs::new()), BoardConfig::default());
        let mut c = canvas();
        b.expand(1, Instant::now(), &mut c);
        b.with_detail(|panel, store| {
            panel.add_detail(store, AddDetail::Note { message: "Kickoff".into() })
        })
        .unwrap()
        .unwrap();
        let rows = b.attributed_timeline();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "Ana Silva");
        assert_eq!(b.display_name(None), "system");
    }

    #[test]
    fn completing_from_board_updates_panel() {
        let mut b = board();
        let mut c = canvas();
        b.expand(2, Instant::now(), &mut c);
        b.with_detail(|panel, store| {
            panel.add_detail(
                store,
                AddDetail::ActionItem {
                    title: "Follow up".into(),
                    assigned_to: None,
                    due_date: None,
                    priority: 2,
                },
            )?;
            let id = panel.items()[0].id;
            panel.set_status(store, id, ActionStatus::Cancelled)
        })
        .unwrap()
        .unwrap();
        let panel = b.detail().unwrap();
        assert_eq!(panel.active_items().count(), 0);
        assert_eq!(
            panel.timeline().last().map(|e| e.message.as_str()),
            Some("Follow up → Cancelled")
        );
    }

    #[test]
    fn progress_tracks_the_transition() {
        let mut b = board();
        let mut c = canvas();
        let t0 = Instant::now();
        assert!(b.transition_progress(t0).is_none());
        b.expand(1, t0, &mut c);
        let half = b.transition_progress(t0 + D / 2).unwrap();
        assert!((half - 0.5).abs() < 0.01);
    }
}
