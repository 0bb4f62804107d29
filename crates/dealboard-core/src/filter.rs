//! Stage filter engine: deals + filter state → filtered deals and the stage
//! columns to show.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Deal, Stage};

// ── Filter state ──

/// Inclusive probability window. Always normalized so `lo <= hi <= 100`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbabilityRange {
    lo: u8,
    hi: u8,
}

impl ProbabilityRange {
    pub const FULL: ProbabilityRange = ProbabilityRange { lo: 0, hi: 100 };

    /// Clamp both ends to 100 and swap them if given out of order.
    pub fn new(lo: u8, hi: u8) -> Self {
        let lo = lo.min(100);
        let hi = hi.min(100);
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    pub fn lo(self) -> u8 {
        self.lo
    }

    pub fn hi(self) -> u8 {
        self.hi
    }

    pub fn contains(self, probability: u8) -> bool {
        (self.lo..=self.hi).contains(&probability)
    }

    pub fn is_full(self) -> bool {
        self == Self::FULL
    }
}

impl Default for ProbabilityRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Everything the board filters on. Persisted per user between sessions.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    #[serde(default)]
    pub search: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub stages: BTreeSet<Stage>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub regions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub owners: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub priorities: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub probabilities: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub handoff: BTreeSet<String>,
    #[serde(default)]
    pub probability_range: ProbabilityRange,
}

impl FilterState {
    /// Re-establish the range invariant after deserializing from an
    /// untrusted source.
    pub fn normalized(mut self) -> Self {
        self.probability_range =
            ProbabilityRange::new(self.probability_range.lo, self.probability_range.hi);
        self
    }

    /// True when no facet constrains the board.
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.stages.is_empty()
            && self.regions.is_empty()
            && self.owners.is_empty()
            && self.priorities.is_empty()
            && self.probabilities.is_empty()
            && self.handoff.is_empty()
            && self.probability_range.is_full()
    }

    /// Does `deal` satisfy every facet?
    pub fn matches(&self, deal: &Deal) -> bool {
        matches_search(deal, &self.search)
            && facet_allows(&self.stages, &deal.stage)
            && facet_allows(&self.regions, &deal.region)
            && facet_allows(&self.owners, &deal.owner)
            && facet_allows(&self.priorities, &deal.priority)
            && facet_allows(&self.probabilities, &deal.probability)
            && (self.handoff.is_empty()
                || deal
                    .handoff_status
                    .as_ref()
                    .is_some_and(|h| self.handoff.contains(h)))
            && self.probability_range.contains(deal.probability)
    }
}

fn facet_allows<T: Ord>(facet: &BTreeSet<T>, value: &T) -> bool {
    facet.is_empty() || facet.contains(value)
}

fn matches_search(deal: &Deal, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    let hit = |s: &str| s.to_lowercase().contains(&needle);
    hit(&deal.name)
        || deal.project.as_deref().is_some_and(hit)
        || deal.lead_name.as_deref().is_some_and(hit)
        || hit(&deal.customer)
        || hit(&deal.region)
}

// ── Engine ──

/// Result of one filter pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutcome {
    /// Matching deals, in input order.
    pub filtered: Vec<Deal>,
    /// Stage columns to render, in canonical order.
    pub visible_stages: Vec<Stage>,
}

impl FilterOutcome {
    /// Deals in one column: priority first (1 is highest), then most recently
    /// modified.
    pub fn column(&self, stage: Stage) -> Vec<&Deal> {
        let mut cards: Vec<&Deal> = self.filtered.iter().filter(|d| d.stage == stage).collect();
        cards.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        cards
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.filtered.iter().filter(|d| d.stage == stage).count()
    }

    /// Summed contract value per currency for one column.
    pub fn totals(&self, stage: Stage) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for deal in self.filtered.iter().filter(|d| d.stage == stage) {
            *totals.entry(deal.currency.clone()).or_insert(0.0) += deal.contract_value;
        }
        totals
    }

    /// Stage of a filtered deal, if it is on the board.
    pub fn stage_of(&self, id: u64) -> Option<Stage> {
        self.filtered.iter().find(|d| d.id == id).map(|d| d.stage)
    }
}

/// Filter `deals` and derive the visible stage columns.
///
/// Non-terminal stages are always shown; the funnel-edge stages (first,
/// Lost, Dropped) only while at least one filtered deal sits in them.
pub fn filter(deals: &[Deal], state: &FilterState) -> FilterOutcome {
    let filtered: Vec<Deal> = deals.iter().filter(|d| state.matches(d)).cloned().collect();
    let visible_stages = visible_stages(&filtered);
    FilterOutcome {
        filtered,
        visible_stages,
    }
}

pub fn visible_stages(filtered: &[Deal]) -> Vec<Stage> {
    let occupied: BTreeSet<Stage> = filtered.iter().map(|d| d.stage).collect();
    Stage::ALL
        .into_iter()
        .filter(|s| !s.is_terminal() || occupied.contains(s))
        .collect()
}

// ── Facet catalogue ──

/// Distinct values offered by each multi-select facet, taken from the
/// unfiltered deal list.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FacetCatalogue {
    pub regions: BTreeSet<String>,
    pub owners: BTreeSet<String>,
    pub priorities: BTreeSet<u8>,
    pub probabilities: BTreeSet<u8>,
    pub handoff: BTreeSet<String>,
}

impl FacetCatalogue {
    pub fn from_deals(deals: &[Deal]) -> Self {
        let mut cat = Self::default();
        for deal in deals {
            if !deal.region.is_empty() {
                cat.regions.insert(deal.region.clone());
            }
            if !deal.owner.is_empty() {
                cat.owners.insert(deal.owner.clone());
            }
            cat.priorities.insert(deal.priority);
            cat.probabilities.insert(deal.probability);
            if let Some(h) = &deal.handoff_status {
                cat.handoff.insert(h.clone());
            }
        }
        cat
    }
}

/// Single-value stepping through a facet: nothing selected picks the first
/// offered value, one selection advances to the next, and the last value
/// (or a multi-value selection) clears the facet.
pub fn step_facet<T: Ord + Clone>(offered: &BTreeSet<T>, chosen: &BTreeSet<T>) -> BTreeSet<T> {
    let next = match chosen.len() {
        0 => offered.iter().next(),
        1 => chosen
            .first()
            .and_then(|current| offered.range(current..).find(|v| *v != current)),
        _ => None,
    };
    next.cloned().into_iter().collect()
}
