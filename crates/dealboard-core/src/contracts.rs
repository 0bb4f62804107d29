//! Narrow contracts the board consumes from the persistence layer.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::filter::FilterState;
use crate::types::{ActionItem, ActionItemId, ActionStatus, AuditRow, Deal, DealId, Stage};

pub type StoreResult<T> = Result<T, StoreError>;

// ── Records ──

pub trait DealSource {
    fn list_deals(&self) -> StoreResult<Vec<Deal>>;
    fn update_deal_stage(&self, deal: DealId, stage: Stage) -> StoreResult<()>;
}

pub trait AuditLog {
    /// Rows for one record, in insertion order.
    fn list_audit_log(&self, resource_type: &str, resource_id: u64) -> StoreResult<Vec<AuditRow>>;

    fn append_audit_log(
        &self,
        resource_type: &str,
        resource_id: u64,
        action: &str,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<AuditRow>;
}

pub trait ActionItemSource {
    fn list_action_items(&self, module_type: &str, module_id: u64) -> StoreResult<Vec<ActionItem>>;
    fn create_action_item(&self, item: NewActionItem) -> StoreResult<ActionItem>;
    fn update_action_item(&self, id: ActionItemId, patch: ActionItemPatch) -> StoreResult<ActionItem>;
    fn delete_action_item(&self, id: ActionItemId) -> StoreResult<()>;
}

pub trait DisplayNames {
    /// Human-readable name for a user id. Unknown ids map to something
    /// printable, never an error.
    fn resolve_display_name(&self, user_id: &str) -> String;
}

/// Everything the board needs from the persistence collaborator.
pub trait RecordStore: DealSource + AuditLog + ActionItemSource + DisplayNames {}

impl<T: DealSource + AuditLog + ActionItemSource + DisplayNames> RecordStore for T {}

/// Load/save interface for the persisted filter state.
pub trait FilterPrefs {
    fn load(&self) -> StoreResult<Option<FilterState>>;
    fn save(&self, state: &FilterState) -> StoreResult<()>;
}

// ── Payloads ──

/// Create payload for an action item.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewActionItem {
    pub module_type: String,
    pub module_id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    3
}

/// Partial update. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ActionItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ActionItemPatch {
    pub fn status(status: ActionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn assignee(user: Option<String>) -> Self {
        Self {
            assigned_to: Some(user),
            ..Default::default()
        }
    }

    pub fn due_date(date: Option<String>) -> Self {
        Self {
            due_date: Some(date),
            ..Default::default()
        }
    }

    /// Apply to a local copy (used for optimistic updates and by stores).
    pub fn apply(&self, item: &mut ActionItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(assignee) = &self.assigned_to {
            item.assigned_to = assignee.clone();
        }
        if let Some(due) = &self.due_date {
            item.due_date = due.clone();
        }
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
    }

    /// Field-level changes this patch makes to `item`, as an audit
    /// `field_changes` object (`{field: {old, new}}`), in field order.
    pub fn field_changes(&self, item: &ActionItem) -> serde_json::Map<String, serde_json::Value> {
        let mut changes = serde_json::Map::new();
        let mut record = |field: &str, old: serde_json::Value, new: serde_json::Value| {
            if old != new {
                changes.insert(field.to_string(), serde_json::json!({ "old": old, "new": new }));
            }
        };
        if let Some(status) = self.status {
            record(
                "status",
                serde_json::json!(item.status.label()),
                serde_json::json!(status.label()),
            );
        }
        if let Some(assignee) = &self.assigned_to {
            record(
                "assigned_to",
                serde_json::json!(item.assigned_to),
                serde_json::json!(assignee),
            );
        }
        if let Some(due) = &self.due_date {
            record(
                "due_date",
                serde_json::json!(item.due_date),
                serde_json::json!(due),
            );
        }
        if let Some(title) = &self.title {
            record("title", serde_json::json!(item.title), serde_json::json!(title));
        }
        changes
    }
}

// ── Display-name cache ──

/// Memoizes `resolve_display_name`. Entries are never invalidated.
#[derive(Default)]
pub struct DisplayNameCache {
    names: RefCell<HashMap<String, String>>,
}

impl DisplayNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name for an optional user; `system` when no user is recorded.
    pub fn name(&self, names: &dyn DisplayNames, user_id: Option<&str>) -> String {
        let Some(user_id) = user_id else {
            return "system".to_string();
        };
        if let Some(hit) = self.names.borrow().get(user_id) {
            return hit.clone();
        }
        let resolved = names.resolve_display_name(user_id);
        self.names
            .borrow_mut()
            .insert(user_id.to_string(), resolved.clone());
        resolved
    }
}
