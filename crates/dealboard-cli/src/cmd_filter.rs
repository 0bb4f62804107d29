use clap::{Args, Subcommand};
use std::path::Path;

use dealboard_core::contracts::{DealSource, FilterPrefs};
use dealboard_core::filter::{FacetCatalogue, FilterState, ProbabilityRange};
use dealboard_core::Stage;
use dealboard_store::JsonFilterPrefs;

use crate::session::Session;

// ── CLI Schema ──

/// Facet flags shared by `deals` and `filter set`.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Free-text search over name, project, lead, customer and region
    #[arg(long)]
    pub search: Option<String>,
    /// Stage to include (repeatable)
    #[arg(long = "stage")]
    pub stages: Vec<String>,
    /// Region to include (repeatable)
    #[arg(long = "region")]
    pub regions: Vec<String>,
    /// Owner to include (repeatable)
    #[arg(long = "owner")]
    pub owners: Vec<String>,
    /// Priority to include (repeatable)
    #[arg(long = "priority")]
    pub priorities: Vec<u8>,
    /// Exact probability to include (repeatable)
    #[arg(long = "probability")]
    pub probabilities: Vec<u8>,
    /// Handoff status to include (repeatable)
    #[arg(long = "handoff")]
    pub handoff: Vec<String>,
    /// Lower bound of the probability window
    #[arg(long)]
    pub min_prob: Option<u8>,
    /// Upper bound of the probability window
    #[arg(long)]
    pub max_prob: Option<u8>,
}

impl FilterArgs {
    pub fn is_empty(&self) -> bool {
        self.search.is_none()
            && self.stages.is_empty()
            && self.regions.is_empty()
            && self.owners.is_empty()
            && self.priorities.is_empty()
            && self.probabilities.is_empty()
            && self.handoff.is_empty()
            && self.min_prob.is_none()
            && self.max_prob.is_none()
    }

    /// Overlay the given flags on `base`. A facet named on the command line
    /// replaces that facet; untouched facets keep their saved values.
    pub fn merge_into(&self, mut base: FilterState) -> anyhow::Result<FilterState> {
        if let Some(search) = &self.search {
            base.search = search.clone();
        }
        if !self.stages.is_empty() {
            base.stages = self
                .stages
                .iter()
                .map(|s| s.parse::<Stage>().map_err(|e| anyhow::anyhow!(e)))
                .collect::<anyhow::Result<_>>()?;
        }
        if !self.regions.is_empty() {
            base.regions = self.regions.iter().cloned().collect();
        }
        if !self.owners.is_empty() {
            base.owners = self.owners.iter().cloned().collect();
        }
        if !self.priorities.is_empty() {
            base.priorities = self.priorities.iter().copied().collect();
        }
        if !self.probabilities.is_empty() {
            base.probabilities = self.probabilities.iter().copied().collect();
        }
        if !self.handoff.is_empty() {
            base.handoff = self.handoff.iter().cloned().collect();
        }
        if self.min_prob.is_some() || self.max_prob.is_some() {
            let lo = self.min_prob.unwrap_or(base.probability_range.lo());
            let hi = self.max_prob.unwrap_or(base.probability_range.hi());
            base.probability_range = ProbabilityRange::new(lo, hi);
        }
        Ok(base.normalized())
    }
}

#[derive(Subcommand)]
pub enum FilterCmd {
    /// Show the saved filter and the values each facet offers
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update the saved filter
    Set(FilterArgs),
    /// Forget the saved filter
    Clear,
}

// ── Dispatch ──

pub fn run(cmd: FilterCmd, repo_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    let prefs = JsonFilterPrefs::for_project(repo_root);
    run_with(cmd, &session, &prefs)
}

fn run_with(cmd: FilterCmd, session: &Session, prefs: &JsonFilterPrefs) -> anyhow::Result<()> {
    match cmd {
        FilterCmd::Show { json } => show(session, prefs, json),
        FilterCmd::Set(args) => set(prefs, &args),
        FilterCmd::Clear => {
            prefs.clear()?;
            println!("Cleared saved filter");
            Ok(())
        }
    }
}

// ── Command Implementations ──

fn show(session: &Session, prefs: &JsonFilterPrefs, json: bool) -> anyhow::Result<()> {
    let state = prefs.load()?.unwrap_or_default();
    let catalogue = FacetCatalogue::from_deals(&session.store.list_deals()?);
    if json {
        let out = serde_json::json!({ "filter": state, "facets": catalogue });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", describe(&state));
    println!();
    println!("Available facets:");
    println!("  regions:       {}", join(&catalogue.regions));
    println!("  owners:        {}", join(&catalogue.owners));
    println!("  priorities:    {}", join(&catalogue.priorities));
    println!("  probabilities: {}", join(&catalogue.probabilities));
    println!("  handoff:       {}", join(&catalogue.handoff));
    Ok(())
}

fn set(prefs: &JsonFilterPrefs, args: &FilterArgs) -> anyhow::Result<()> {
    if args.is_empty() {
        anyhow::bail!("no filter flags given; use `dealboard filter clear` to reset");
    }
    let current = prefs.load()?.unwrap_or_default();
    let next = args.merge_into(current)?;
    prefs.save(&next)?;
    println!("{}", describe(&next));
    Ok(())
}

/// One-line-per-facet summary of the active constraints.
pub fn describe(state: &FilterState) -> String {
    if state.is_empty() {
        return "Filter: (none)".to_string();
    }
    let mut lines = vec!["Filter:".to_string()];
    if !state.search.trim().is_empty() {
        lines.push(format!("  search:      \"{}\"", state.search.trim()));
    }
    let facets: [(&str, String, bool); 6] = [
        ("stages", join(&state.stages), state.stages.is_empty()),
        ("regions", join(&state.regions), state.regions.is_empty()),
        ("owners", join(&state.owners), state.owners.is_empty()),
        ("priorities", join(&state.priorities), state.priorities.is_empty()),
        ("probability", join(&state.probabilities), state.probabilities.is_empty()),
        ("handoff", join(&state.handoff), state.handoff.is_empty()),
    ];
    for (name, values, empty) in facets {
        if !empty {
            lines.push(format!("  {name:<12} {values}"));
        }
    }
    if !state.probability_range.is_full() {
        lines.push(format!(
            "  {:<12} {}-{}%",
            "range",
            state.probability_range.lo(),
            state.probability_range.hi()
        ));
    }
    lines.join("\n")
}

fn join<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    let parts: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}
