//! Inline card expansion as a four-phase reducer.
//!
//! The machine never animates or measures anything itself. Each dispatched
//! [`Action`] returns the [`Effect`]s the host must run: scroll snapshots,
//! timers, alignment passes, detail-panel loads. Timers are identified by a
//! [`TimerToken`]; a token from an older generation is ignored, so a late
//! timer can never tear the current transition.

use std::time::Duration;

use crate::types::{DealId, Stage};

// ── State ──

/// Which card is expanded and how far the transition has got. Each phase
/// carries only the fields valid in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expansion {
    Idle,
    Expanding {
        deal: DealId,
        stage: Stage,
        /// Request received mid-transition, applied once `Expanded` is reached.
        queued: Option<Queued>,
    },
    Expanded {
        deal: DealId,
        stage: Stage,
    },
    Collapsing {
        deal: DealId,
        stage: Stage,
        /// Deal to expand once the collapse finishes (switch-deal case).
        pending: Option<DealId>,
    },
}

/// A request deferred until an in-flight expand completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Queued {
    Toggle,
    Switch(DealId),
}

/// Phase tag of [`Expansion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Expanding,
    Expanded,
    Collapsing,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Expanding => "expanding",
            Phase::Expanded => "expanded",
            Phase::Collapsing => "collapsing",
        }
    }
}

impl Expansion {
    pub fn phase(&self) -> Phase {
        match self {
            Expansion::Idle => Phase::Idle,
            Expansion::Expanding { .. } => Phase::Expanding,
            Expansion::Expanded { .. } => Phase::Expanded,
            Expansion::Collapsing { .. } => Phase::Collapsing,
        }
    }

    /// The expanded `(deal, stage)` pair; `None` exactly when idle.
    pub fn active(&self) -> Option<(DealId, Stage)> {
        match self {
            Expansion::Idle => None,
            Expansion::Expanding { deal, stage, .. }
            | Expansion::Expanded { deal, stage }
            | Expansion::Collapsing { deal, stage, .. } => Some((*deal, *stage)),
        }
    }

    pub fn deal(&self) -> Option<DealId> {
        self.active().map(|(deal, _)| deal)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.active().map(|(_, stage)| stage)
    }

    pub fn pending(&self) -> Option<DealId> {
        match self {
            Expansion::Collapsing { pending, .. } => *pending,
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Expansion::Idle)
    }
}

// ── Actions and effects ──

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPurpose {
    /// Expanding → Expanded.
    Settle,
    /// Collapsing → Idle.
    Collapse,
    /// Re-expand a deal queued behind a collapse.
    Reopen(DealId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerToken {
    generation: u64,
    pub purpose: TimerPurpose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Card clicked / Enter pressed on a card.
    Expand(DealId),
    /// Escape key or explicit close button.
    Close,
    TimerElapsed(TimerToken),
}

/// Which alignment pass a scroll request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignPass {
    /// Right after the expand request.
    Initial,
    /// After the transition, when intermediate reflow may have shifted offsets.
    Correction,
}

/// Work the host must perform after a dispatch, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Drop any in-flight drag gesture.
    CancelDrag,
    /// Leave multi-select mode and clear the selection.
    ClearSelection,
    /// Remember the current scroll offset.
    SnapshotScroll,
    /// Load action items and timeline for this deal.
    OpenDetail(DealId),
    /// Wait for the layout to settle, then scroll the expanded card into view.
    Align {
        deal: DealId,
        stage: Stage,
        pass: AlignPass,
    },
    StartTimer {
        token: TimerToken,
        after: Duration,
    },
    /// Drop the detail panel.
    CloseDetail,
    /// Scroll back to the remembered offset.
    RestoreScroll,
}

// ── Machine ──

pub struct ExpansionMachine {
    state: Expansion,
    generation: u64,
    /// Deal waiting on a `Reopen` timer while the machine is idle.
    reopening: Option<DealId>,
    transition: Duration,
    switch_yield: Duration,
}

impl ExpansionMachine {
    pub fn new(transition: Duration, switch_yield: Duration) -> Self {
        Self {
            state: Expansion::Idle,
            generation: 0,
            reopening: None,
            transition,
            switch_yield,
        }
    }

    pub fn state(&self) -> &Expansion {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    /// Idle with no queued re-expand: nothing left to fire.
    pub fn is_quiescent(&self) -> bool {
        self.state.is_idle() && self.reopening.is_none()
    }

    pub fn transition(&self) -> Duration {
        self.transition
    }

    /// Apply one action. `stage_of` looks up the current stage of a deal;
    /// deals it cannot find are never expanded.
    pub fn dispatch(
        &mut self,
        action: Action,
        stage_of: impl Fn(DealId) -> Option<Stage>,
    ) -> Vec<Effect> {
        let before = self.state.phase();
        let effects = match action {
            Action::Expand(deal) => self.on_expand(deal, &stage_of),
            Action::Close => self.on_close(),
            Action::TimerElapsed(token) => self.on_timer(token, &stage_of),
        };
        let after = self.state.phase();
        if before != after {
            tracing::debug!(
                from = before.label(),
                to = after.label(),
                deal = ?self.state.deal(),
                "expansion transition"
            );
        }
        effects
    }

    fn on_expand(&mut self, deal: DealId, stage_of: &dyn Fn(DealId) -> Option<Stage>) -> Vec<Effect> {
        match self.state.clone() {
            Expansion::Idle => {
                // A fresh request overrides a queued re-expand.
                let keep_snapshot = self.reopening.take().is_some();
                match stage_of(deal) {
                    Some(stage) => self.enter_expanding(deal, stage, !keep_snapshot),
                    None if keep_snapshot => {
                        self.generation += 1;
                        vec![Effect::RestoreScroll]
                    }
                    None => Vec::new(),
                }
            }
            Expansion::Expanding {
                deal: current,
                stage,
                ..
            } => {
                let queued = if deal == current {
                    Queued::Toggle
                } else {
                    Queued::Switch(deal)
                };
                self.state = Expansion::Expanding {
                    deal: current,
                    stage,
                    queued: Some(queued),
                };
                Vec::new()
            }
            Expansion::Expanded {
                deal: current,
                stage,
            } => {
                let pending = (deal != current).then_some(deal);
                self.enter_collapsing(current, stage, pending)
            }
            Expansion::Collapsing {
                deal: current,
                stage,
                ..
            } => {
                // Latest request wins; the in-flight collapse is not interrupted.
                self.state = Expansion::Collapsing {
                    deal: current,
                    stage,
                    pending: Some(deal),
                };
                Vec::new()
            }
        }
    }

    fn on_close(&mut self) -> Vec<Effect> {
        match self.state.clone() {
            Expansion::Idle => {
                if self.reopening.take().is_some() {
                    self.generation += 1;
                    vec![Effect::RestoreScroll]
                } else {
                    Vec::new()
                }
            }
            Expansion::Expanding { deal, stage, .. } | Expansion::Expanded { deal, stage } => {
                self.enter_collapsing(deal, stage, None)
            }
            Expansion::Collapsing { deal, stage, .. } => {
                self.state = Expansion::Collapsing {
                    deal,
                    stage,
                    pending: None,
                };
                Vec::new()
            }
        }
    }

    fn on_timer(
        &mut self,
        token: TimerToken,
        stage_of: &dyn Fn(DealId) -> Option<Stage>,
    ) -> Vec<Effect> {
        if token.generation != self.generation {
            return Vec::new();
        }
        match (self.state.clone(), token.purpose) {
            (
                Expansion::Expanding {
                    deal,
                    stage,
                    queued,
                },
                TimerPurpose::Settle,
            ) => {
                self.state = Expansion::Expanded { deal, stage };
                let mut effects = vec![Effect::Align {
                    deal,
                    stage,
                    pass: AlignPass::Correction,
                }];
                match queued {
                    Some(Queued::Toggle) => {
                        effects.extend(self.enter_collapsing(deal, stage, None));
                    }
                    Some(Queued::Switch(next)) => {
                        effects.extend(self.enter_collapsing(deal, stage, Some(next)));
                    }
                    None => {}
                }
                effects
            }
            (Expansion::Collapsing { pending, .. }, TimerPurpose::Collapse) => {
                self.state = Expansion::Idle;
                let mut effects = vec![Effect::CloseDetail];
                match pending {
                    Some(next) => {
                        // Keep the first snapshot: the switched-to deal
                        // restores to where the user was before the first expand.
                        self.reopening = Some(next);
                        effects.push(Effect::StartTimer {
                            token: self.token(TimerPurpose::Reopen(next)),
                            after: self.switch_yield,
                        });
                    }
                    None => effects.push(Effect::RestoreScroll),
                }
                effects
            }
            (Expansion::Idle, TimerPurpose::Reopen(next)) if self.reopening == Some(next) => {
                self.reopening = None;
                match stage_of(next) {
                    Some(stage) => self.enter_expanding(next, stage, false),
                    None => vec![Effect::RestoreScroll],
                }
            }
            _ => Vec::new(),
        }
    }

    fn enter_expanding(&mut self, deal: DealId, stage: Stage, snapshot: bool) -> Vec<Effect> {
        self.generation += 1;
        self.state = Expansion::Expanding {
            deal,
            stage,
            queued: None,
        };
        let mut effects = vec![Effect::CancelDrag, Effect::ClearSelection];
        if snapshot {
            effects.push(Effect::SnapshotScroll);
        }
        effects.push(Effect::OpenDetail(deal));
        effects.push(Effect::Align {
            deal,
            stage,
            pass: AlignPass::Initial,
        });
        effects.push(Effect::StartTimer {
            token: self.token(TimerPurpose::Settle),
            after: self.transition,
        });
        effects
    }

    fn enter_collapsing(
        &mut self,
        deal: DealId,
        stage: Stage,
        pending: Option<DealId>,
    ) -> Vec<Effect> {
        self.generation += 1;
        self.state = Expansion::Collapsing {
            deal,
            stage,
            pending,
        };
        vec![Effect::StartTimer {
            token: self.token(TimerPurpose::Collapse),
            after: self.transition,
        }]
    }

    fn token(&self, purpose: TimerPurpose) -> TimerToken {
        TimerToken {
            generation: self.generation,
            purpose,
        }
    }
}

impl Default for ExpansionMachine {
    fn default() -> Self {
        Self::new(Duration::from_millis(300), Duration::from_millis(30))
    }
}
