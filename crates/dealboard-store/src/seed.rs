//! Demo board used by `dealboard init --demo`.

use std::collections::BTreeMap;

use time::{Duration, OffsetDateTime};

use dealboard_core::contracts::{ActionItemPatch, ActionItemSource, AuditLog, NewActionItem};
use dealboard_core::timeline;
use dealboard_core::{resource, ActionStatus, Deal, Stage};

use crate::FileStore;

struct Seed {
    name: &'static str,
    customer: &'static str,
    region: &'static str,
    owner: &'static str,
    stage: Stage,
    probability: u8,
    value: f64,
    currency: &'static str,
    priority: u8,
    age_days: i64,
}

const SEEDS: &[Seed] = &[
    Seed { name: "Harbour crane retrofit", customer: "Nordhavn Port", region: "North", owner: "u1", stage: Stage::Lead, probability: 10, value: 120_000.0, currency: "EUR", priority: 3, age_days: 2 },
    Seed { name: "Cold store expansion", customer: "Fjord Foods", region: "North", owner: "u2", stage: Stage::Discussions, probability: 25, value: 340_000.0, currency: "EUR", priority: 2, age_days: 5 },
    Seed { name: "Pump station upgrade", customer: "Riverbend Water", region: "South", owner: "u1", stage: Stage::Qualified, probability: 40, value: 85_000.0, currency: "EUR", priority: 1, age_days: 1 },
    Seed { name: "Conveyor line B", customer: "Atlas Mining", region: "West", owner: "u3", stage: Stage::Qualified, probability: 45, value: 210_000.0, currency: "USD", priority: 3, age_days: 9 },
    Seed { name: "Boiler replacement", customer: "Mercy Hospital", region: "South", owner: "u2", stage: Stage::Rfq, probability: 55, value: 460_000.0, currency: "EUR", priority: 1, age_days: 3 },
    Seed { name: "Warehouse automation", customer: "Parcel Hub", region: "East", owner: "u3", stage: Stage::Rfq, probability: 50, value: 1_250_000.0, currency: "USD", priority: 2, age_days: 12 },
    Seed { name: "Chiller service contract", customer: "Data Vault", region: "East", owner: "u1", stage: Stage::Offered, probability: 70, value: 64_000.0, currency: "EUR", priority: 2, age_days: 4 },
    Seed { name: "Turbine overhaul", customer: "Windfarm Kestrel", region: "North", owner: "u2", stage: Stage::Won, probability: 100, value: 890_000.0, currency: "EUR", priority: 1, age_days: 20 },
    Seed { name: "Dock lighting", customer: "Nordhavn Port", region: "North", owner: "u3", stage: Stage::Lost, probability: 0, value: 32_000.0, currency: "EUR", priority: 4, age_days: 30 },
];

/// Write demo deals, users, action items and history into `store`.
pub fn seed_demo(store: &FileStore) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    let deals: Vec<Deal> = SEEDS
        .iter()
        .enumerate()
        .map(|(i, s)| Deal {
            id: i as u64 + 1,
            name: s.name.to_string(),
            project: Some(format!("P-{:04}", 1200 + i)),
            lead_name: None,
            customer: s.customer.to_string(),
            region: s.region.to_string(),
            owner: s.owner.to_string(),
            probability: s.probability,
            contract_value: s.value,
            currency: s.currency.to_string(),
            expected_close: None,
            priority: s.priority,
            handoff_status: (s.stage == Stage::Won).then(|| "pending".to_string()),
            stage: s.stage,
            updated_at: now - Duration::days(s.age_days),
        })
        .collect();
    store.put_deals(&deals)?;

    let users = BTreeMap::from([
        ("u1".to_string(), "Ana Silva".to_string()),
        ("u2".to_string(), "Ben Okafor".to_string()),
        ("u3".to_string(), "Chen Wei".to_string()),
    ]);
    store.put_users(&users)?;

    // One worked example: a note, a finished task, and an open task.
    let deal = 5;
    store.append_audit_log(
        resource::DEAL,
        deal,
        "note",
        timeline::manual_entry_details("Site walk-through with facilities team"),
    )?;
    let done = store.create_action_item(NewActionItem {
        module_type: resource::DEAL.to_string(),
        module_id: deal,
        title: "Send RFQ pack".to_string(),
        assigned_to: Some("u2".to_string()),
        due_date: None,
        priority: 1,
    })?;
    store.update_action_item(done.id, ActionItemPatch::status(ActionStatus::Completed))?;
    if let Some(details) =
        timeline::status_change_details(&done, ActionStatus::Open, ActionStatus::Completed)
    {
        store.append_audit_log(resource::DEAL, deal, "update", details)?;
    }
    store.create_action_item(NewActionItem {
        module_type: resource::DEAL.to_string(),
        module_id: deal,
        title: "Clarify flue requirements".to_string(),
        assigned_to: Some("u1".to_string()),
        due_date: Some((now + Duration::days(7)).date().to_string()),
        priority: 2,
    })?;
    tracing::info!(deals = deals.len(), "demo board seeded");
    Ok(())
}
