//! Virtual board surface behind the terminal viewport.
//!
//! Tracks are laid out on a canvas that may be wider and taller than the
//! screen; the viewport shows a window of it at `offset`. Scrolling towards a
//! target is eased over several frames.

use std::collections::HashMap;

use dealboard_core::grid::{GridPlan, PlacedTrack, TrackKind};
use dealboard_core::scroll::{ScrollContainer, ScrollOffset};
use dealboard_core::{DealId, Stage};

/// Rows of the sticky stage header (label line and totals line).
pub const HEADER_HEIGHT: u32 = 2;

/// What sits under a screen cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    Card(DealId, Stage),
    Column(Stage),
    Detail,
}

#[derive(Debug, Default)]
pub struct Canvas {
    viewport_width: u32,
    viewport_height: u32,
    content_width: u32,
    content_height: u32,
    card_height: u32,
    tracks: Vec<PlacedTrack>,
    cards: HashMap<DealId, (Stage, u32)>,
    offset: ScrollOffset,
    target: Option<ScrollOffset>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute geometry for this frame. `columns` lists the card ids of
    /// each visible stage in display order; `detail_rows` is the height the
    /// detail panel wants below the header.
    pub fn layout(
        &mut self,
        plan: &GridPlan,
        columns: &[(Stage, Vec<DealId>)],
        viewport: (u16, u16),
        card_height: u16,
        detail_rows: u32,
        spacer: u32,
    ) -> bool {
        let (width, height) = (u32::from(viewport.0), u32::from(viewport.1));
        let resized = (width, height) != (self.viewport_width, self.viewport_height)
            && self.viewport_width != 0;
        self.viewport_width = width;
        self.viewport_height = height;
        self.card_height = u32::from(card_height);

        self.tracks = plan.place(width.max(plan.min_width()));
        self.content_width = self.tracks.iter().map(|t| u32::from(t.width)).sum();

        self.cards.clear();
        let mut tallest = 0u32;
        for (stage, ids) in columns {
            for (row, id) in ids.iter().enumerate() {
                let top = HEADER_HEIGHT + row as u32 * self.card_height;
                self.cards.insert(*id, (*stage, top));
            }
            tallest = tallest.max(ids.len() as u32 * self.card_height);
        }
        if plan.has_detail() {
            tallest = tallest.max(spacer + detail_rows);
        }
        self.content_height = HEADER_HEIGHT + tallest;

        let max = self.max();
        self.offset.top = self.offset.top.min(max.top);
        self.offset.left = self.offset.left.min(max.left);
        resized
    }

    fn max(&self) -> ScrollOffset {
        ScrollOffset {
            top: self.content_height.saturating_sub(self.viewport_height),
            left: self.content_width.saturating_sub(self.viewport_width),
        }
    }

    pub fn current(&self) -> ScrollOffset {
        self.offset
    }

    pub fn tracks(&self) -> &[PlacedTrack] {
        &self.tracks
    }

    pub fn card_height(&self) -> u32 {
        self.card_height
    }

    pub fn is_animating(&self) -> bool {
        self.target.is_some()
    }

    /// Advance the eased scroll by one frame: half the remaining distance,
    /// at least one cell.
    pub fn step(&mut self) {
        let Some(target) = self.target else { return };
        self.offset.top = approach(self.offset.top, target.top);
        self.offset.left = approach(self.offset.left, target.left);
        if self.offset == target {
            self.target = None;
        }
    }

    /// Immediate scroll from wheel or keys. Cancels any eased scroll.
    pub fn scroll_by(&mut self, dx: i32, dy: i32) {
        let max = self.max();
        self.target = None;
        self.offset.left = shift(self.offset.left, dx, max.left);
        self.offset.top = shift(self.offset.top, dy, max.top);
    }

    /// Map a viewport cell to what is drawn there.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<Hit> {
        let cx = u32::from(x) + self.offset.left;
        let track = self
            .tracks
            .iter()
            .find(|t| cx >= t.x && cx < t.x + u32::from(t.width))?;
        let stage = match track.kind {
            TrackKind::Detail => return Some(Hit::Detail),
            TrackKind::Stage(stage) => stage,
        };
        let y = u32::from(y);
        if y < HEADER_HEIGHT {
            return Some(Hit::Column(stage));
        }
        let cy = y + self.offset.top;
        let card = self.cards.iter().find(|(_, (s, top))| {
            *s == stage && cy >= *top && cy < *top + self.card_height
        });
        Some(match card {
            Some((id, _)) => Hit::Card(*id, stage),
            None => Hit::Column(stage),
        })
    }

    /// Canvas top of a card, if it is laid out.
    pub fn card_y(&self, deal: DealId) -> Option<u32> {
        self.cards.get(&deal).map(|(_, top)| *top)
    }
}

fn approach(from: u32, to: u32) -> u32 {
    if from == to {
        return from;
    }
    let gap = from.abs_diff(to);
    let step = gap.div_ceil(2).max(1);
    if from < to {
        from + step
    } else {
        from - step
    }
}

fn shift(value: u32, by: i32, max: u32) -> u32 {
    let moved = i64::from(value) + i64::from(by);
    moved.clamp(0, i64::from(max)) as u32
}

impl ScrollContainer for Canvas {
    fn offset(&self) -> Option<ScrollOffset> {
        (self.viewport_width > 0).then_some(self.offset)
    }

    fn max_offset(&self) -> Option<ScrollOffset> {
        (self.viewport_width > 0).then(|| self.max())
    }

    fn header_height(&self) -> Option<u32> {
        Some(HEADER_HEIGHT)
    }

    fn stage_left(&self, stage: Stage) -> Option<u32> {
        self.tracks
            .iter()
            .find(|t| t.kind == TrackKind::Stage(stage))
            .map(|t| t.x)
    }

    fn card_top(&self, deal: DealId, stage: Stage) -> Option<u32> {
        self.cards
            .get(&deal)
            .filter(|(s, _)| *s == stage)
            .map(|(_, top)| *top)
    }

    fn smooth_scroll_to(&mut self, target: ScrollOffset) {
        let max = self.max();
        let target = ScrollOffset {
            top: target.top.min(max.top),
            left: target.left.min(max.left),
        };
        self.target = (target != self.offset).then_some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealboard_core::config::BoardConfig;
    use dealboard_core::grid::plan_columns;

    fn laid_out(active: Option<Stage>, viewport: (u16, u16)) -> Canvas {
        let stages = [Stage::Discussions, Stage::Qualified, Stage::Rfq, Stage::Offered, Stage::Won];
        let plan = plan_columns(&stages, active, &BoardConfig::default());
        let columns = vec![
            (Stage::Discussions, vec![]),
            (Stage::Qualified, vec![1, 2]),
            (Stage::Rfq, (10..20).collect()),
            (Stage::Offered, vec![]),
            (Stage::Won, vec![3]),
        ];
        let mut canvas = Canvas::new();
        canvas.layout(&plan, &columns, viewport, 4, 30, 0);
        canvas
    }

    #[test]
    fn cards_stack_below_header() {
        let canvas = laid_out(None, (200, 20));
        assert_eq!(canvas.card_top(1, Stage::Qualified), Some(2));
        assert_eq!(canvas.card_top(2, Stage::Qualified), Some(6));
        assert_eq!(canvas.card_top(2, Stage::Rfq), None);
        assert_eq!(canvas.max_offset().unwrap().top, 2 + 40 - 20);
        assert_eq!(canvas.max_offset().unwrap().left, 0);
    }

    #[test]
    fn narrow_viewport_scrolls_horizontally() {
        let canvas = laid_out(Some(Stage::Rfq), (80, 20));
        let max = canvas.max_offset().unwrap();
        assert!(max.left > 0);
        let detail = canvas
            .tracks()
            .iter()
            .find(|t| t.kind == TrackKind::Detail)
            .unwrap();
        assert_eq!(detail.x, canvas.stage_left(Stage::Offered).unwrap() - u32::from(detail.width));
    }

    #[test]
    fn smooth_scroll_eases_to_clamped_target() {
        let mut canvas = laid_out(None, (200, 20));
        canvas.smooth_scroll_to(ScrollOffset::new(500, 0));
        assert!(canvas.is_animating());
        let mut frames = 0;
        while canvas.is_animating() {
            canvas.step();
            frames += 1;
            assert!(frames < 20);
        }
        assert_eq!(canvas.current(), ScrollOffset::new(22, 0));
        assert!(frames > 1);
    }

    #[test]
    fn hit_test_maps_cells() {
        let canvas = laid_out(None, (200, 20));
        let qualified = canvas.stage_left(Stage::Qualified).unwrap() as u16;
        assert_eq!(canvas.hit_test(qualified, 0), Some(Hit::Column(Stage::Qualified)));
        assert_eq!(canvas.hit_test(qualified + 1, 3), Some(Hit::Card(1, Stage::Qualified)));
        assert_eq!(canvas.hit_test(qualified + 1, 7), Some(Hit::Card(2, Stage::Qualified)));
        assert_eq!(canvas.hit_test(qualified + 1, 15), Some(Hit::Column(Stage::Qualified)));
    }

    #[test]
    fn wheel_scroll_clamps_and_cancels_easing() {
        let mut canvas = laid_out(None, (200, 20));
        canvas.smooth_scroll_to(ScrollOffset::new(10, 0));
        canvas.scroll_by(0, -5);
        assert!(!canvas.is_animating());
        assert_eq!(canvas.current().top, 0);
        canvas.scroll_by(0, 100);
        assert_eq!(canvas.current().top, 22);
    }
}
