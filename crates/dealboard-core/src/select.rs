//! Multi-select mode for bulk stage moves.

use std::collections::BTreeSet;

use crate::dragdrop::StageChange;
use crate::types::{Deal, DealId, Stage};

#[derive(Debug, Default)]
pub struct Selection {
    active: bool,
    ids: BTreeSet<DealId>,
}

impl Selection {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn ids(&self) -> &BTreeSet<DealId> {
        &self.ids
    }

    pub fn contains(&self, deal: DealId) -> bool {
        self.ids.contains(&deal)
    }

    pub fn enter(&mut self) {
        self.active = true;
    }

    /// Leave multi-select mode and forget the selection.
    pub fn exit(&mut self) {
        self.active = false;
        self.ids.clear();
    }

    /// Toggle `deal`; ignored outside multi-select mode.
    pub fn toggle(&mut self, deal: DealId) {
        if !self.active {
            return;
        }
        if !self.ids.remove(&deal) {
            self.ids.insert(deal);
        }
    }

    /// Forget ids no longer on the board.
    pub fn retain_existing(&mut self, deals: &[Deal]) {
        self.ids.retain(|id| deals.iter().any(|d| d.id == *id));
    }

    /// One stage change per selected deal not already in `to`.
    pub fn bulk_move(&self, deals: &[Deal], to: Stage) -> Vec<StageChange> {
        deals
            .iter()
            .filter(|d| self.ids.contains(&d.id) && d.stage != to)
            .map(|d| StageChange {
                deal: d.id,
                from: d.stage,
                to,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::deal;

    #[test]
    fn toggle_requires_active_mode() {
        let mut s = Selection::default();
        s.toggle(1);
        assert!(s.ids().is_empty());
        s.enter();
        s.toggle(1);
        s.toggle(2);
        s.toggle(1);
        assert_eq!(s.ids().iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn exit_clears_selection() {
        let mut s = Selection::default();
        s.enter();
        s.toggle(3);
        s.exit();
        assert!(!s.is_active());
        assert!(s.ids().is_empty());
    }

    #[test]
    fn bulk_move_skips_deals_already_there() {
        let deals = vec![deal(1, Stage::Lead), deal(2, Stage::Won), deal(3, Stage::Rfq)];
        let mut s = Selection::default();
        s.enter();
        s.toggle(1);
        s.toggle(2);
        let changes = s.bulk_move(&deals, Stage::Won);
        assert_eq!(
            changes,
            vec![StageChange {
                deal: 1,
                from: Stage::Lead,
                to: Stage::Won
            }]
        );
    }

    #[test]
    fn retain_existing_drops_vanished_ids() {
        let mut s = Selection::default();
        s.enter();
        s.toggle(1);
        s.toggle(9);
        s.retain_existing(&[deal(1, Stage::Lead)]);
        assert!(s.contains(1));
        assert!(!s.contains(9));
    }
}
