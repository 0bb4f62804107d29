//! Merged record history: manual log entries plus action-item status events,
//! oldest first.
//!
//! Each audit source goes through an adapter that normalizes its rows into
//! [`TimelineEntry`]; the merge itself only dedupes and sorts.

use std::collections::HashSet;

use serde::Serialize;
use time::OffsetDateTime;

use crate::contracts::{AuditLog, StoreResult};
use crate::types::{detail_key, ActionItem, ActionStatus, AuditRow, AuditRowId, RecordRef};

/// Where a timeline entry came from.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    /// Free-text note written by a user.
    Manual,
    /// Produced by an action-item change.
    ActionItem { title: String },
}

/// One rendered line of the merged history. Never mutated; re-fetched.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TimelineEntry {
    pub id: AuditRowId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Action item the entry is about, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_record_id: Option<u64>,
    pub source: EntrySource,
}

// ── Adapters ──

fn is_manual(row: &AuditRow) -> bool {
    row.details
        .get(detail_key::MANUAL_ENTRY)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn action_item_title(row: &AuditRow) -> Option<&str> {
    row.details
        .get(detail_key::ACTION_ITEM_TITLE)
        .and_then(|v| v.as_str())
}

fn message_of(row: &AuditRow) -> Option<&str> {
    row.details.get(detail_key::MESSAGE).and_then(|v| v.as_str())
}

/// Does this row belong on the timeline at all?
pub fn is_timeline_worthy(row: &AuditRow) -> bool {
    is_manual(row) || action_item_title(row).is_some()
}

/// Normalize one audit row. Rows that are neither manual entries nor
/// action-item events yield `None`.
pub fn normalize(row: &AuditRow) -> Option<TimelineEntry> {
    let (message, source) = if is_manual(row) {
        let message = message_of(row).unwrap_or_default().to_string();
        (message, EntrySource::Manual)
    } else {
        let title = action_item_title(row)?;
        (
            action_item_message(title, row),
            EntrySource::ActionItem {
                title: title.to_string(),
            },
        )
    };
    Some(TimelineEntry {
        id: row.id,
        message,
        user_id: row.user_id.clone(),
        created_at: row.created_at,
        source_record_id: row
            .details
            .get(detail_key::ACTION_ITEM_ID)
            .and_then(|v| v.as_u64()),
        source,
    })
}

/// `"<title> → <new status>"` for a status change, otherwise a summary of
/// the first changed field (insertion order), otherwise the stored message.
fn action_item_message(title: &str, row: &AuditRow) -> String {
    let changes = row
        .details
        .get(detail_key::FIELD_CHANGES)
        .and_then(|v| v.as_object());

    if let Some(changes) = changes {
        if let Some(new) = changes.get("status").and_then(|c| c.get("new")) {
            return format!("{title} → {}", value_text(new));
        }
        if let Some((field, change)) = changes.iter().next() {
            let old = change.get("old").map(value_text).unwrap_or_default();
            let new = change.get("new").map(value_text).unwrap_or_default();
            let mut summary = format!("{title}: {field} {old} → {new}");
            if changes.len() > 1 {
                summary.push_str(&format!(" (+{} more)", changes.len() - 1));
            }
            return summary;
        }
    }
    match message_of(row) {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => format!("{title} updated"),
    }
}

fn value_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "∅".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Merge ──

/// Merge both sources into one ascending feed.
///
/// Every timeline-worthy row appears exactly once (a row id seen in both
/// sources is kept from the first). The sort is stable, so equal timestamps
/// keep source-query order: record rows before action-item rows.
pub fn merge(audit_rows: &[AuditRow], action_item_rows: &[AuditRow]) -> Vec<TimelineEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<TimelineEntry> = audit_rows
        .iter()
        .chain(action_item_rows)
        .filter(|row| seen.insert(row.id))
        .filter_map(normalize)
        .collect();
    entries.sort_by_key(|e| e.created_at);
    entries
}

/// Fetch the timeline for `record`. Manual notes and item closures both
/// live in the record's own log, so one query covers the whole feed. A
/// failing query yields an empty feed.
pub fn load<S>(store: &S, record: &RecordRef) -> Vec<TimelineEntry>
where
    S: AuditLog + ?Sized,
{
    let rows = degrade(
        "audit log",
        store.list_audit_log(&record.resource_type, record.id),
    );
    merge(&rows, &[])
}

fn degrade<T>(what: &str, result: StoreResult<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(source = what, error = %e, "fetch failed, showing empty");
        Vec::new()
    })
}

// ── Status-change side effect ──

/// Audit payload for an item moving to `status`, or `None` when the
/// transition is not logged (only Completed/Cancelled are).
pub fn status_change_details(
    item: &ActionItem,
    old: ActionStatus,
    status: ActionStatus,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    if !status.is_closed() || old == status {
        return None;
    }
    let mut details = serde_json::Map::new();
    details.insert(
        detail_key::MESSAGE.into(),
        format!("{} → {}", item.title, status.label()).into(),
    );
    details.insert(detail_key::ACTION_ITEM_TITLE.into(), item.title.clone().into());
    details.insert(detail_key::ACTION_ITEM_ID.into(), item.id.into());
    details.insert(
        detail_key::FIELD_CHANGES.into(),
        serde_json::json!({ "status": { "old": old.label(), "new": status.label() } }),
    );
    Some(details)
}

/// Audit payload for a manual note.
pub fn manual_entry_details(message: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut details = serde_json::Map::new();
    details.insert(detail_key::MESSAGE.into(), message.into());
    details.insert(detail_key::MANUAL_ENTRY.into(), true.into());
    details
}
