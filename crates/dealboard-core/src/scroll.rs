//! Scroll bookkeeping around an expansion: remember where the user was,
//! bring the expanded card into view once layout has settled, and go back
//! on collapse.

use serde::{Deserialize, Serialize};

use crate::types::{DealId, Stage};

/// Scroll position of the board canvas, in cells.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollOffset {
    pub top: u32,
    pub left: u32,
}

impl ScrollOffset {
    pub fn new(top: u32, left: u32) -> Self {
        Self { top, left }
    }
}

/// The scrollable board surface, as seen by the coordinator.
///
/// Every measurement is optional: a missing container or element makes the
/// coordinator skip that step instead of failing.
pub trait ScrollContainer {
    fn offset(&self) -> Option<ScrollOffset>;
    /// Largest reachable offset (content size minus viewport size).
    fn max_offset(&self) -> Option<ScrollOffset>;
    /// Height of the sticky stage-header row.
    fn header_height(&self) -> Option<u32>;
    /// Canvas x of a stage column.
    fn stage_left(&self, stage: Stage) -> Option<u32>;
    /// Canvas y of a card's top edge (the header row included).
    fn card_top(&self, deal: DealId, stage: Stage) -> Option<u32>;
    /// Start an eased scroll towards `target`.
    fn smooth_scroll_to(&mut self, target: ScrollOffset);
}

/// Sole owner of the board's scroll offset during an expansion.
#[derive(Debug, Default)]
pub struct ScrollCoordinator {
    margin: u32,
    saved: Option<ScrollOffset>,
    spacer: u32,
}

impl ScrollCoordinator {
    pub fn new(margin: u32) -> Self {
        Self {
            margin,
            saved: None,
            spacer: 0,
        }
    }

    /// Vertical offset of the expanded card within its column, used to push
    /// the detail panel down so it lines up with the card.
    pub fn spacer_height(&self) -> u32 {
        self.spacer
    }

    pub fn on_expand_begin(&mut self, container: &dyn ScrollContainer) {
        self.saved = container.offset();
    }

    /// Align the viewport on the expanded card. Call only after the layout
    /// settle barrier released. Returns the target, or `None` when the
    /// container or the targets could not be measured.
    pub fn on_layout_settled(
        &mut self,
        container: &mut dyn ScrollContainer,
        deal: DealId,
        stage: Stage,
    ) -> Option<ScrollOffset> {
        let target = self.measure(container, deal, stage)?;
        container.smooth_scroll_to(target);
        Some(target)
    }

    fn measure(
        &mut self,
        container: &dyn ScrollContainer,
        deal: DealId,
        stage: Stage,
    ) -> Option<ScrollOffset> {
        let max = container.max_offset()?;
        let header = container.header_height()?;
        let left = container.stage_left(stage)?;
        let card_top = container.card_top(deal, stage)?;

        self.spacer = card_top.saturating_sub(header);

        let target = ScrollOffset {
            left: left.saturating_sub(self.margin).min(max.left),
            top: card_top
                .saturating_sub(header)
                .saturating_sub(self.margin)
                .min(max.top),
        };
        tracing::debug!(deal, %stage, ?target, spacer = self.spacer, "layout settled");
        Some(target)
    }

    pub fn on_collapse_complete(&mut self, container: &mut dyn ScrollContainer) {
        self.spacer = 0;
        if let Some(saved) = self.saved.take() {
            if container.max_offset().is_some() {
                container.smooth_scroll_to(saved);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Canvas with instant scrolling and configurable geometry.
    #[derive(Default)]
    pub(crate) struct FakeCanvas {
        pub offset: ScrollOffset,
        pub max: ScrollOffset,
        pub header: u32,
        pub stage_x: HashMap<Stage, u32>,
        pub card_y: HashMap<DealId, u32>,
        pub detached: bool,
        pub scrolls: Vec<ScrollOffset>,
    }

    impl ScrollContainer for FakeCanvas {
        fn offset(&self) -> Option<ScrollOffset> {
            (!self.detached).then_some(self.offset)
        }
        fn max_offset(&self) -> Option<ScrollOffset> {
            (!self.detached).then_some(self.max)
        }
        fn header_height(&self) -> Option<u32> {
            (!self.detached).then_some(self.header)
        }
        fn stage_left(&self, stage: Stage) -> Option<u32> {
            self.stage_x.get(&stage).copied()
        }
        fn card_top(&self, deal: DealId, _stage: Stage) -> Option<u32> {
            self.card_y.get(&deal).copied()
        }
        fn smooth_scroll_to(&mut self, target: ScrollOffset) {
            self.offset = target;
            self.scrolls.push(target);
        }
    }

    pub(crate) fn canvas() -> FakeCanvas {
        FakeCanvas {
            offset: ScrollOffset::new(5, 40),
            max: ScrollOffset::new(30, 200),
            header: 2,
            stage_x: [(Stage::Lead, 0), (Stage::Rfq, 90), (Stage::Won, 300)].into(),
            card_y: [(1, 2), (2, 14), (3, 50)].into(),
            ..Default::default()
        }
    }

    #[test]
    fn settled_alignment_targets_stage_and_card() {
        let mut c = canvas();
        let mut sc = ScrollCoordinator::new(2);
        sc.on_expand_begin(&c);
        let target = sc.on_layout_settled(&mut c, 2, Stage::Rfq).unwrap();
        assert_eq!(target, ScrollOffset::new(10, 88));
        assert_eq!(sc.spacer_height(), 12);
        assert_eq!(c.offset, target);
    }

    #[test]
    fn targets_are_clamped() {
        let mut c = canvas();
        let mut sc = ScrollCoordinator::new(2);
        // Near the origin: clamp at zero.
        let t = sc.on_layout_settled(&mut c, 1, Stage::Lead).unwrap();
        assert_eq!(t, ScrollOffset::new(0, 0));
        assert_eq!(sc.spacer_height(), 0);
        // Far right/bottom: clamp at max.
        let t = sc.on_layout_settled(&mut c, 3, Stage::Won).unwrap();
        assert_eq!(t, ScrollOffset::new(30, 200));
    }

    #[test]
    fn expand_then_collapse_round_trips() {
        let mut c = canvas();
        let before = c.offset;
        let mut sc = ScrollCoordinator::new(2);
        sc.on_expand_begin(&c);
        sc.on_layout_settled(&mut c, 2, Stage::Rfq);
        assert_ne!(c.offset, before);
        sc.on_collapse_complete(&mut c);
        assert_eq!(c.offset, before);
        assert_eq!(sc.spacer_height(), 0);
        assert!(sc.saved.is_none());
    }

    #[test]
    fn missing_targets_are_noops() {
        let mut c = canvas();
        let mut sc = ScrollCoordinator::new(2);
        assert!(sc.on_layout_settled(&mut c, 2, Stage::Lost).is_none());
        assert!(sc.on_layout_settled(&mut c, 42, Stage::Rfq).is_none());
        assert!(c.scrolls.is_empty());

        c.detached = true;
        sc.on_expand_begin(&c);
        assert!(sc.saved.is_none());
        sc.on_collapse_complete(&mut c);
        assert!(c.scrolls.is_empty());
    }
}
