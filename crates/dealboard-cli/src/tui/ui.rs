use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use dealboard_core::contracts::RecordStore;
use dealboard_core::dragdrop::DragState;
use dealboard_core::expansion::Phase;
use dealboard_core::grid::{PlacedTrack, TrackKind};
use dealboard_core::{Deal, Stage};

use super::app::{App, Focus, Mode};
use super::canvas::HEADER_HEIGHT;
use crate::session::{money, short_time, thousands};

/// Rows the status bar takes at the bottom of the screen.
pub const STATUS_HEIGHT: u16 = 1;

/// Split the screen into board canvas and status bar.
pub fn areas(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(STATUS_HEIGHT)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Rows the detail panel wants for its current content.
pub fn detail_rows<S: RecordStore>(app: &App<S>) -> u32 {
    match app.board.detail() {
        Some(panel) => (panel.items().len() + panel.timeline().len() + 8) as u32,
        None => 0,
    }
}

/// Lay out the canvas for this frame, then draw it.
pub fn draw<S: RecordStore>(f: &mut Frame, app: &mut App<S>, now: Instant) {
    let (board_area, status_area) = areas(f.area());
    let columns = app.columns();
    let rows = detail_rows(app);
    let spacer = app.board.spacer_height();
    let card_height = app.board.config().card_height;
    let plan = app.board.plan().clone();
    let resized = app.canvas.layout(
        &plan,
        &columns,
        (board_area.width, board_area.height),
        card_height,
        rows,
        spacer,
    );
    if resized {
        app.board.viewport_resized();
    }
    render(f, app, board_area, status_area, now);
}

fn render<S: RecordStore>(f: &mut Frame, app: &App<S>, board: Rect, status: Rect, now: Instant) {
    let offset = app.canvas.current();
    for track in app.canvas.tracks() {
        let Some(area) = visible(track, offset.left, board) else {
            continue;
        };
        match track.kind {
            TrackKind::Stage(stage) => render_column(f, app, stage, area),
            TrackKind::Detail => render_detail(f, app, area, now),
        }
    }
    render_status_bar(f, app, status);
    if let Some(prompt) = &app.prompt {
        render_prompt(f, prompt.kind.label(), &prompt.buffer, board);
    }
}

/// Screen rect of a track after horizontal scrolling, clipped to `board`.
fn visible(track: &PlacedTrack, scroll_left: u32, board: Rect) -> Option<Rect> {
    let start = track.x.max(scroll_left);
    let end = (track.x + u32::from(track.width)).min(scroll_left + u32::from(board.width));
    if start >= end {
        return None;
    }
    Some(Rect {
        x: board.x + (start - scroll_left) as u16,
        y: board.y,
        width: (end - start) as u16,
        height: board.height,
    })
}

// ── Columns ──

fn render_column<S: RecordStore>(f: &mut Frame, app: &App<S>, stage: Stage, area: Rect) {
    let outcome = app.board.outcome();
    let hovered = match app.board.drag().state() {
        DragState::Dragging { over, .. } => over == Some(stage),
        DragState::Idle => false,
    };
    let expanded = app.board.expansion().stage() == Some(stage);
    let header_style = if hovered {
        Style::default().fg(Color::Black).bg(Color::Magenta)
    } else if expanded {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    let width = area.width.saturating_sub(1) as usize;
    let totals = outcome.totals(stage);
    let header = vec![
        Line::from(Span::styled(
            truncate_str(&format!(" {} ({})", stage.label(), outcome.count(stage)), width),
            header_style,
        )),
        Line::from(Span::styled(
            truncate_str(&format!(" {}", money(&totals)), width),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let header_area = Rect {
        height: (HEADER_HEIGHT as u16).min(area.height),
        ..area
    };
    f.render_widget(Paragraph::new(header), header_area);

    let scroll_top = app.canvas.current().top;
    let card_height = app.canvas.card_height() as u16;
    let cursor = app.cursor_deal();
    for deal in outcome.column(stage) {
        let Some(top) = app.canvas.card_y(deal.id) else {
            continue;
        };
        if top < scroll_top + HEADER_HEIGHT {
            continue;
        }
        let y = area.y + (top - scroll_top) as u16;
        if y >= area.y + area.height {
            break;
        }
        let rect = Rect {
            x: area.x,
            y,
            width: area.width.saturating_sub(1),
            height: card_height.min(area.y + area.height - y),
        };
        render_card(f, app, deal, rect, cursor == Some(deal.id));
    }
}

fn render_card<S: RecordStore>(f: &mut Frame, app: &App<S>, deal: &Deal, area: Rect, at_cursor: bool) {
    let dragging = matches!(
        app.board.drag().state(),
        DragState::Dragging { deal: d, .. } if d == deal.id
    );
    let selected = app.board.selection().contains(deal.id);
    let expanded = app.board.expansion().deal() == Some(deal.id);

    let border = if dragging {
        Style::default().fg(Color::Magenta)
    } else if expanded {
        Style::default().fg(Color::Cyan)
    } else if at_cursor && app.focus == Focus::Cards {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mark = if selected { "[x] " } else if app.board.selection().is_active() { "[ ] " } else { "" };
    let inner = area.width.saturating_sub(2) as usize;
    let title = truncate_str(&format!("{mark}#{} {}", deal.id, deal.name), inner.saturating_sub(1));
    let block = Block::default()
        .title(format!(" {title}"))
        .borders(Borders::ALL)
        .border_style(border);
    let lines = vec![
        Line::from(truncate_str(&deal.customer, inner)),
        Line::from(Span::styled(
            truncate_str(
                &format!(
                    "{}% P{} {} {}",
                    deal.probability,
                    deal.priority,
                    deal.currency,
                    thousands(deal.contract_value)
                ),
                inner,
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

// ── Detail panel ──

fn render_detail<S: RecordStore>(f: &mut Frame, app: &App<S>, area: Rect, now: Instant) {
    let Some(panel) = app.board.detail() else {
        return;
    };
    let deal = app.board.expansion().deal().and_then(|id| app.board.deal(id));
    let title = match deal {
        Some(d) => format!(" #{} {} · {} ", d.id, d.name, d.customer),
        None => " Detail ".to_string(),
    };

    // Grow in while expanding, shrink out while collapsing.
    let progress = app.board.transition_progress(now).unwrap_or(1.0).clamp(0.0, 1.0);
    let fraction = match app.phase() {
        Phase::Collapsing => 1.0 - progress,
        _ => progress,
    };
    let width = ((f32::from(area.width) * fraction).round() as u16).max(2);

    let top_offset = (HEADER_HEIGHT + app.board.spacer_height())
        .saturating_sub(app.canvas.current().top.min(app.board.spacer_height()));
    let y = area.y + (top_offset as u16).min(area.height.saturating_sub(3));
    let rect = Rect {
        x: area.x,
        y,
        width: width.min(area.width),
        height: area.y + area.height - y,
    };

    let focused = app.focus == Focus::Detail;
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::Blue }));
    f.render_widget(Clear, rect);
    if fraction < 1.0 || panel.is_loading() {
        let msg = if panel.is_loading() { "Loading…" } else { "" };
        f.render_widget(Paragraph::new(msg).block(block), rect);
        return;
    }

    let inner = rect.width.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();
    let items = app.detail_items();
    let active = panel.active_items().count();
    lines.push(section(&format!("Action items ({active} open)")));
    if items.is_empty() {
        lines.push(dim("  none"));
    }
    for (i, item) in items.iter().enumerate() {
        let cursor = focused && i == app.item_cursor;
        let style = if cursor {
            Style::default().add_modifier(Modifier::REVERSED)
        } else if item.status.is_closed() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let who = app.board.display_name(item.assigned_to.as_deref());
        let text = format!(
            " {:<11} {}  ({}, due {})",
            item.status.label(),
            item.title,
            who,
            item.due_date.as_deref().unwrap_or("-")
        );
        lines.push(Line::from(Span::styled(truncate_str(&text, inner), style)));
    }

    lines.push(Line::from(""));
    lines.push(section("Timeline"));
    let timeline = app.board.attributed_timeline();
    if timeline.is_empty() {
        lines.push(dim("  no history yet"));
    }
    for (who, entry) in timeline {
        let text = format!(" {}  {who}: {}", short_time(entry.created_at), entry.message);
        lines.push(Line::from(truncate_str(&text, inner)));
    }

    f.render_widget(Paragraph::new(lines).block(block), rect);
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {title}"),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)))
}

// ── Status bar and prompt ──

fn render_status_bar<S: RecordStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let mode = match app.mode {
        Mode::Browse if app.board.selection().is_active() => "SELECT",
        Mode::Browse => "BOARD",
        Mode::Grab => "MOVE",
        Mode::Input => "INPUT",
    };
    let hints = match app.mode {
        Mode::Grab => "h/l target  enter drop  esc cancel",
        Mode::Input => "enter submit  esc cancel",
        Mode::Browse if app.board.selection().is_active() => "space toggle  b move  esc done",
        Mode::Browse if app.board.detail().is_some() => {
            "tab focus  n note  a item  s status  x cancel  d delete  u assign  D due  esc close"
        }
        Mode::Browse => {
            "enter open  m move  v select  / search  R/O/H facet  c clear  r reload  q quit"
        }
    };
    let mut spans = vec![
        Span::styled(format!(" {mode} "), Style::default().fg(Color::Black).bg(Color::Cyan)),
        Span::raw(format!(" {} ", app.phase().label())),
    ];
    if !app.board.filter_state().is_empty() {
        spans.push(Span::styled(
            format!("filtered {} ", app.board.outcome().filtered.len()),
            Style::default().fg(Color::Yellow),
        ));
    }
    match app.status_message() {
        Some(msg) => spans.push(Span::styled(msg.to_string(), Style::default().fg(Color::Red))),
        None => spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray))),
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_prompt(f: &mut Frame, label: &str, buffer: &str, board: Rect) {
    let width = board.width.min(60);
    let rect = Rect {
        x: board.x + (board.width - width) / 2,
        y: board.y + board.height / 3,
        width,
        height: 3.min(board.height),
    };
    let block = Block::default()
        .title(format!(" {label} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(Clear, rect);
    f.render_widget(Paragraph::new(format!("{buffer}_")).block(block), rect);
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() && max_chars > 1 {
        let kept: String = truncated.chars().take(max_chars - 1).collect();
        format!("{kept}…")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate_str("Harbour crane", 20), "Harbour crane");
        assert_eq!(truncate_str("Harbour crane", 8), "Harbour…");
        assert_eq!(truncate_str("Harbour crane", 8).chars().count(), 8);
    }

    #[test]
    fn visible_clips_scrolled_tracks() {
        let board = Rect::new(0, 0, 50, 20);
        let track = PlacedTrack {
            kind: TrackKind::Stage(Stage::Rfq),
            x: 40,
            width: 22,
        };
        assert_eq!(visible(&track, 0, board), Some(Rect::new(40, 0, 10, 20)));
        assert_eq!(visible(&track, 30, board), Some(Rect::new(10, 0, 22, 20)));
        assert_eq!(visible(&track, 70, board), None);
    }

    #[test]
    fn areas_reserve_status_bar() {
        let (board, status) = areas(Rect::new(0, 0, 100, 30));
        assert_eq!(board.height, 29);
        assert_eq!(status.y, 29);
    }
}
