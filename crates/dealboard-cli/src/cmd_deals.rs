use std::path::Path;

use dealboard_core::contracts::{DealSource, FilterPrefs};
use dealboard_core::filter::{self, FilterOutcome, FilterState};
use dealboard_store::JsonFilterPrefs;

use crate::cmd_filter::{self, FilterArgs};
use crate::session::{money, Session};

/// `dealboard deals [--json] [--ad-hoc] [facet flags]`
pub fn execute(repo_root: &Path, args: &FilterArgs, ad_hoc: bool, json: bool) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    let base = if ad_hoc {
        FilterState::default()
    } else {
        match JsonFilterPrefs::for_project(repo_root).load() {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load saved filters");
                FilterState::default()
            }
        }
    };
    let state = args.merge_into(base)?;
    let deals = session.store.list_deals()?;
    let outcome = filter::filter(&deals, &state);

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&outcome, &state))?);
    } else {
        print!("{}", render(&outcome, &state));
    }
    Ok(())
}

fn to_json(outcome: &FilterOutcome, state: &FilterState) -> serde_json::Value {
    let columns: Vec<serde_json::Value> = outcome
        .visible_stages
        .iter()
        .map(|stage| {
            serde_json::json!({
                "stage": stage,
                "label": stage.label(),
                "count": outcome.count(*stage),
                "totals": outcome.totals(*stage),
                "deals": outcome.column(*stage),
            })
        })
        .collect();
    serde_json::json!({ "filter": state, "columns": columns })
}

/// Column-per-section text rendering of the filtered board.
fn render(outcome: &FilterOutcome, state: &FilterState) -> String {
    let mut out = String::new();
    if !state.is_empty() {
        out.push_str(&cmd_filter::describe(state));
        out.push_str("\n\n");
    }
    for stage in &outcome.visible_stages {
        let count = outcome.count(*stage);
        let totals = outcome.totals(*stage);
        let total_text = if totals.is_empty() {
            String::new()
        } else {
            format!("  {}", money(&totals))
        };
        out.push_str(&format!("== {} ({count}){total_text}\n", stage.label()));
        for deal in outcome.column(*stage) {
            out.push_str(&format!(
                "  #{:<4} {:<32} {:<20} {:>3}%  P{}\n",
                deal.id, deal.name, deal.customer, deal.probability, deal.priority
            ));
        }
    }
    if outcome.filtered.is_empty() {
        out.push_str("(no deals match)\n");
    }
    out
}
