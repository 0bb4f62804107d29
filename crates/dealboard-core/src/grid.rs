//! Board column template: one track per visible stage, plus a wide detail
//! track right after the expanded stage.

use crate::config::BoardConfig;
use crate::expansion::Expansion;
use crate::types::Stage;

/// How a track claims horizontal space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackWidth {
    /// At least `min` cells, plus `weight` shares of the leftover width.
    Flex { min: u16, weight: u16 },
    /// Exactly this many cells.
    Fixed(u16),
}

impl TrackWidth {
    fn min(self) -> u16 {
        match self {
            TrackWidth::Flex { min, .. } => min,
            TrackWidth::Fixed(w) => w,
        }
    }

    fn weight(self) -> u16 {
        match self {
            TrackWidth::Flex { weight, .. } => weight,
            TrackWidth::Fixed(_) => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Stage(Stage),
    Detail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Track {
    pub kind: TrackKind,
    pub width: TrackWidth,
}

/// A track placed on the board canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedTrack {
    pub kind: TrackKind,
    pub x: u32,
    pub width: u16,
}

/// Ordered column template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridPlan {
    pub tracks: Vec<Track>,
}

impl GridPlan {
    pub fn has_detail(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Detail)
    }

    /// Index of the detail track, if any.
    pub fn detail_index(&self) -> Option<usize> {
        self.tracks.iter().position(|t| t.kind == TrackKind::Detail)
    }

    /// Sum of track minimums: the narrowest canvas that fits the plan.
    pub fn min_width(&self) -> u32 {
        self.tracks.iter().map(|t| u32::from(t.width.min())).sum()
    }

    /// Lay the tracks out on a canvas at least `available` cells wide.
    /// Leftover width is shared by weight; rounding remainders go to the
    /// leftmost flexible tracks so the canvas width is exact.
    pub fn place(&self, available: u32) -> Vec<PlacedTrack> {
        let min_total = self.min_width();
        let spare = available.saturating_sub(min_total);
        let total_weight: u32 = self.tracks.iter().map(|t| u32::from(t.width.weight())).sum();

        let mut widths: Vec<u32> = self
            .tracks
            .iter()
            .map(|t| {
                let share = if total_weight == 0 {
                    0
                } else {
                    spare * u32::from(t.width.weight()) / total_weight
                };
                u32::from(t.width.min()) + share
            })
            .collect();

        if total_weight > 0 {
            let used: u32 = widths.iter().sum();
            let mut remainder = (min_total + spare).saturating_sub(used);
            for (w, t) in widths.iter_mut().zip(&self.tracks) {
                if remainder == 0 {
                    break;
                }
                if t.width.weight() > 0 {
                    *w += 1;
                    remainder -= 1;
                }
            }
        }

        let mut x = 0u32;
        self.tracks
            .iter()
            .zip(widths)
            .map(|(t, w)| {
                let placed = PlacedTrack {
                    kind: t.kind,
                    x,
                    width: u16::try_from(w).unwrap_or(u16::MAX),
                };
                x += w;
                placed
            })
            .collect()
    }

    /// CSS-like rendering of the template, for logs and `--json` output.
    pub fn template(&self) -> String {
        self.tracks
            .iter()
            .map(|t| match t.width {
                TrackWidth::Flex { min, weight } => format!("minmax({min}, {weight}fr)"),
                TrackWidth::Fixed(w) => format!("{w}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the column template for `stages` given the active expanded stage.
///
/// If the active stage is not among the visible stages (it was filtered
/// away), the detail track is appended at the end.
pub fn plan_columns(stages: &[Stage], active: Option<Stage>, config: &BoardConfig) -> GridPlan {
    let flex = TrackWidth::Flex {
        min: config.stage_min_width,
        weight: 1,
    };
    let detail = Track {
        kind: TrackKind::Detail,
        width: TrackWidth::Flex {
            min: config.detail_min_width,
            weight: config.detail_weight,
        },
    };

    let mut tracks = Vec::with_capacity(stages.len() + 1);
    for &stage in stages {
        if Some(stage) == active {
            tracks.push(Track {
                kind: TrackKind::Stage(stage),
                width: TrackWidth::Fixed(config.expanded_stage_width),
            });
            tracks.push(detail);
        } else {
            tracks.push(Track {
                kind: TrackKind::Stage(stage),
                width: flex,
            });
        }
    }
    if active.is_some() && !tracks.contains(&detail) {
        tracks.push(detail);
    }
    GridPlan { tracks }
}

/// Memoizes [`plan_columns`] on (visible stages, active stage).
pub struct GridLayoutPlanner {
    config: BoardConfig,
    cached: Option<(Vec<Stage>, Option<Stage>, GridPlan)>,
    computations: usize,
}

impl GridLayoutPlanner {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            cached: None,
            computations: 0,
        }
    }

    pub fn plan(&mut self, stages: &[Stage], expansion: &Expansion) -> &GridPlan {
        let active = expansion.stage();
        let hit = matches!(&self.cached, Some((s, a, _)) if s.as_slice() == stages && *a == active);
        if !hit {
            self.cached = None;
        }
        let (_, _, plan) = self.cached.get_or_insert_with(|| {
            let plan = plan_columns(stages, active, &self.config);
            tracing::debug!(template = %plan.template(), "grid plan recomputed");
            self.computations += 1;
            (stages.to_vec(), active, plan)
        });
        plan
    }

    /// How many times the plan was actually recomputed.
    pub fn computations(&self) -> usize {
        self.computations
    }
}
