//! Pointer drag of a card across stage columns, reduced to a single
//! stage-change intent on drop.

use crate::types::{DealId, Stage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging {
        deal: DealId,
        origin: Stage,
        over: Option<Stage>,
    },
}

/// Move `deal` from one stage to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageChange {
    pub deal: DealId,
    pub from: Stage,
    pub to: Stage,
}

#[derive(Debug)]
pub struct DragDropController {
    state: DragState,
    enabled: bool,
}

impl Default for DragDropController {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
            enabled: true,
        }
    }
}

impl DragDropController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Enable or disable gestures. Disabling drops any drag in flight.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    /// Pick up a card. Refused while disabled or already dragging.
    pub fn begin(&mut self, deal: DealId, origin: Stage) -> bool {
        if !self.enabled || self.is_dragging() {
            return false;
        }
        self.state = DragState::Dragging {
            deal,
            origin,
            over: Some(origin),
        };
        true
    }

    /// The pointer moved over `stage` (`None`: outside every column).
    pub fn hover(&mut self, stage: Option<Stage>) {
        if let DragState::Dragging { over, .. } = &mut self.state {
            *over = stage;
        }
    }

    /// Current hover target, for drop highlighting.
    pub fn hovered(&self) -> Option<Stage> {
        match self.state {
            DragState::Dragging { over, .. } => over,
            DragState::Idle => None,
        }
    }

    /// Step the hover target through `stages` (keyboard dragging).
    pub fn hover_step(&mut self, stages: &[Stage], forward: bool) {
        let DragState::Dragging { origin, over, .. } = self.state else {
            return;
        };
        if stages.is_empty() {
            return;
        }
        let current = over.unwrap_or(origin);
        let idx = stages.iter().position(|s| *s == current).unwrap_or(0);
        let next = if forward {
            (idx + 1).min(stages.len() - 1)
        } else {
            idx.saturating_sub(1)
        };
        self.hover(Some(stages[next]));
    }

    /// Release the card. Yields an intent only for a real stage change.
    pub fn release(&mut self) -> Option<StageChange> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match state {
            DragState::Dragging {
                deal,
                origin,
                over: Some(to),
            } if self.enabled && to != origin => Some(StageChange {
                deal,
                from: origin,
                to,
            }),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
