use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Deal identity.
pub type DealId = u64;

/// Action item identity.
pub type ActionItemId = u64;

/// Audit-log row identity.
pub type AuditRowId = u64;

/// Resource type names used by the audit log and action-item links.
pub mod resource {
    pub const DEAL: &str = "deal";
    pub const ACTION_ITEM: &str = "action_item";
}

// ── Stage ──

/// A fixed step of the deal pipeline, in canonical board order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lead,
    Discussions,
    Qualified,
    Rfq,
    Offered,
    Won,
    Lost,
    Dropped,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Lead,
        Stage::Discussions,
        Stage::Qualified,
        Stage::Rfq,
        Stage::Offered,
        Stage::Won,
        Stage::Lost,
        Stage::Dropped,
    ];

    /// Entry point of the funnel.
    pub const FIRST: Stage = Stage::Lead;

    /// Funnel-edge stages that are only shown while populated.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Lead | Stage::Lost | Stage::Dropped)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Lead => "Lead",
            Stage::Discussions => "Discussions",
            Stage::Qualified => "Qualified",
            Stage::Rfq => "RFQ",
            Stage::Offered => "Offered",
            Stage::Won => "Won",
            Stage::Lost => "Lost",
            Stage::Dropped => "Dropped",
        }
    }

    /// Position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| {
                stage.label().eq_ignore_ascii_case(wanted)
                    || format!("{stage:?}").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown stage: {wanted}"))
    }
}

// ── Deal ──

/// A pipeline deal, as returned by the persistence collaborator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Deal {
    pub id: DealId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub owner: String,
    /// Win probability, 0-100.
    #[serde(default)]
    pub probability: u8,
    #[serde(default)]
    pub contract_value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// ISO date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close: Option<String>,
    /// 1 (highest) to 5.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_status: Option<String>,
    pub stage: Stage,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_priority() -> u8 {
    3
}

// ── Action items ──

/// Lifecycle of an action item.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ActionStatus {
    /// Open or in progress: shown in the live list.
    pub fn is_active(self) -> bool {
        matches!(self, ActionStatus::Open | ActionStatus::InProgress)
    }

    /// Completed or cancelled: folded into the timeline.
    pub fn is_closed(self) -> bool {
        !self.is_active()
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionStatus::Open => "Open",
            ActionStatus::InProgress => "In Progress",
            ActionStatus::Completed => "Completed",
            ActionStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "open" => Ok(Self::Open),
            "inprogress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown action item status: {}", s.trim())),
        }
    }
}

/// A live task linked to a record (deal, lead, contact).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActionItem {
    pub id: ActionItemId,
    pub module_type: String,
    pub module_id: u64,
    pub title: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// ISO date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ── Audit log ──

/// One row of the external audit log.
///
/// `details` is an open payload; known keys are `message`, `manual_entry`,
/// `action_item_title`, and `field_changes` (`{field: {old, new}}`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditRow {
    pub id: AuditRowId,
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Well-known audit `details` keys.
pub mod detail_key {
    pub const MESSAGE: &str = "message";
    pub const MANUAL_ENTRY: &str = "manual_entry";
    pub const ACTION_ITEM_TITLE: &str = "action_item_title";
    pub const ACTION_ITEM_ID: &str = "action_item_id";
    pub const FIELD_CHANGES: &str = "field_changes";
}

/// Names a single record: resource type plus id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub resource_type: String,
    pub id: u64,
}

impl RecordRef {
    pub fn new(resource_type: impl Into<String>, id: u64) -> Self {
        Self {
            resource_type: resource_type.into(),
            id,
        }
    }

    pub fn deal(id: DealId) -> Self {
        Self::new(resource::DEAL, id)
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_canonical() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::FIRST, Stage::ALL[0]);
        assert_eq!(Stage::Won.index(), 5);
    }

    #[test]
    fn terminal_stages() {
        let terminal: Vec<Stage> = Stage::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Stage::Lead, Stage::Lost, Stage::Dropped]);
    }

    #[test]
    fn stage_parses_labels_and_variants() {
        assert_eq!("rfq".parse::<Stage>().unwrap(), Stage::Rfq);
        assert_eq!("RFQ".parse::<Stage>().unwrap(), Stage::Rfq);
        assert_eq!(" won ".parse::<Stage>().unwrap(), Stage::Won);
        assert!("closed".parse::<Stage>().is_err());
    }

    #[test]
    fn action_status_parse_variants() {
        assert_eq!(
            "in_progress".parse::<ActionStatus>().unwrap(),
            ActionStatus::InProgress
        );
        assert_eq!(
            "In Progress".parse::<ActionStatus>().unwrap(),
            ActionStatus::InProgress
        );
        assert_eq!(
            "canceled".parse::<ActionStatus>().unwrap(),
            ActionStatus::Cancelled
        );
        assert!("blocked".parse::<ActionStatus>().is_err());
    }

    #[test]
    fn action_status_partition() {
        assert!(ActionStatus::Open.is_active());
        assert!(ActionStatus::InProgress.is_active());
        assert!(ActionStatus::Completed.is_closed());
        assert!(ActionStatus::Cancelled.is_closed());
    }

    #[test]
    fn deal_serde_minimal() {
        let json = r#"{"id":1,"name":"Pump retrofit","stage":"rfq","updated_at":"2026-01-05T10:00:00Z"}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.stage, Stage::Rfq);
        assert_eq!(deal.priority, 3);
        assert_eq!(deal.currency, "EUR");
        assert!(deal.project.is_none());
    }

    #[test]
    fn audit_row_keeps_detail_key_order() {
        let json = r#"{"id":1,"action":"update","details":{"field_changes":{"zeta":{"old":1,"new":2},"alpha":{"old":3,"new":4}}},"created_at":"2026-01-05T10:00:00Z"}"#;
        let row: AuditRow = serde_json::from_str(json).unwrap();
        let changes = row.details["field_changes"].as_object().unwrap();
        let keys: Vec<&String> = changes.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn record_ref_display() {
        assert_eq!(RecordRef::deal(7).to_string(), "deal#7");
    }
}
