//! Record store backed by the files under `.dealboard/`.
//!
//! Deals, action items and users are pretty JSON documents replaced
//! atomically; the audit log is append-only JSONL. Every write holds the
//! exclusive `LOCK`.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use dealboard_core::contracts::{
    ActionItemPatch, ActionItemSource, AuditLog, DealSource, DisplayNames, NewActionItem,
    StoreResult,
};
use dealboard_core::error::StoreError;
use dealboard_core::{resource, ActionItem, ActionItemId, ActionStatus, AuditRow, Deal, DealId, Stage};

use crate::paths::BoardPaths;

/// On-disk shape of `action_items.json`.
#[derive(Serialize, Deserialize, Default)]
struct ActionItemsFile {
    #[serde(default)]
    next_id: ActionItemId,
    #[serde(default)]
    items: Vec<ActionItem>,
}

/// One line of `audit.jsonl`: the row plus the record it belongs to.
#[derive(Serialize, Deserialize)]
struct AuditLine {
    resource_type: String,
    resource_id: u64,
    #[serde(flatten)]
    row: AuditRow,
}

pub struct FileStore {
    paths: BoardPaths,
    actor: Option<String>,
}

impl FileStore {
    /// Open an existing board. Fails if `.dealboard/` does not exist.
    pub fn open(repo_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let paths = BoardPaths::discover(repo_root);
        if !paths.is_initialized() {
            anyhow::bail!(
                "no deal board here ({}/.dealboard not found). Run `dealboard init` first.",
                paths.root.display()
            );
        }
        Ok(Self { paths, actor: None })
    }

    /// Create `.dealboard/` and empty documents. Existing data is kept.
    pub fn init(repo_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let paths = BoardPaths::discover(repo_root);
        paths.ensure_layout()?;
        let store = Self { paths, actor: None };
        if !store.paths.deals_json.exists() {
            store.write_doc(&store.paths.deals_json, &Vec::<Deal>::new())?;
        }
        if !store.paths.action_items_json.exists() {
            store.write_doc(&store.paths.action_items_json, &ActionItemsFile::default())?;
        }
        if !store.paths.users_json.exists() {
            store.write_doc(&store.paths.users_json, &BTreeMap::<String, String>::new())?;
        }
        Ok(store)
    }

    /// User id recorded on audit rows written through this store.
    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn paths(&self) -> &BoardPaths {
        &self.paths
    }

    /// Replace the whole deal list.
    pub fn put_deals(&self, deals: &[Deal]) -> StoreResult<()> {
        let _lock = self.lock()?;
        self.write_doc(&self.paths.deals_json, &deals)
            .map_err(unavailable)
    }

    /// Replace the user directory (`id → display name`).
    pub fn put_users(&self, users: &BTreeMap<String, String>) -> StoreResult<()> {
        let _lock = self.lock()?;
        self.write_doc(&self.paths.users_json, users)
            .map_err(unavailable)
    }

    // ── Internals ──

    fn lock(&self) -> StoreResult<crate::WriteLock> {
        crate::WriteLock::acquire(&self.paths.lock_file).map_err(unavailable)
    }

    fn read_doc<T: DeserializeOwned + Default>(&self, path: &Path) -> StoreResult<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(path).map_err(unavailable)?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))
    }

    fn write_doc<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        crate::replace_file(path, json.as_bytes())
    }

    fn read_audit(&self) -> StoreResult<Vec<AuditLine>> {
        if !self.paths.audit_jsonl.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.paths.audit_jsonl).map_err(unavailable)?;
        let reader = std::io::BufReader::new(file);
        let mut lines = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(unavailable)?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: AuditLine = serde_json::from_str(&line).map_err(|e| {
                StoreError::Corrupt(format!("audit.jsonl line {}: {e}", n + 1))
            })?;
            lines.push(parsed);
        }
        Ok(lines)
    }

    /// Append one row. The caller holds the lock.
    fn push_audit(
        &self,
        resource_type: &str,
        resource_id: u64,
        action: &str,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<AuditRow> {
        let next_id = self
            .read_audit()?
            .last()
            .map(|l| l.row.id + 1)
            .unwrap_or(1);
        let line = AuditLine {
            resource_type: resource_type.to_string(),
            resource_id,
            row: AuditRow {
                id: next_id,
                action: action.to_string(),
                details,
                created_at: OffsetDateTime::now_utc(),
                user_id: self.actor.clone(),
            },
        };
        let json = serde_json::to_string(&line).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.audit_jsonl)
            .map_err(unavailable)?;
        writeln!(file, "{json}").map_err(unavailable)?;
        Ok(line.row)
    }

    /// Audit an update whose document is already replaced. The change
    /// stands even when the row cannot be written.
    fn log_committed(
        &self,
        resource_type: &str,
        resource_id: u64,
        details: serde_json::Map<String, serde_json::Value>,
    ) {
        if let Err(e) = self.push_audit(resource_type, resource_id, "update", details) {
            tracing::warn!(resource_type, resource_id, error = %e, "update stored without audit row");
        }
    }

    fn read_items(&self) -> StoreResult<ActionItemsFile> {
        self.read_doc(&self.paths.action_items_json)
    }

    fn write_items(&self, file: &ActionItemsFile) -> StoreResult<()> {
        self.write_doc(&self.paths.action_items_json, file)
            .map_err(unavailable)
    }
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl DealSource for FileStore {
    fn list_deals(&self) -> StoreResult<Vec<Deal>> {
        self.read_doc(&self.paths.deals_json)
    }

    fn update_deal_stage(&self, deal: DealId, stage: Stage) -> StoreResult<()> {
        let _lock = self.lock()?;
        let mut deals: Vec<Deal> = self.read_doc(&self.paths.deals_json)?;
        let target = deals
            .iter_mut()
            .find(|d| d.id == deal)
            .ok_or_else(|| StoreError::not_found("deal", deal))?;
        let old = target.stage;
        if old == stage {
            return Ok(());
        }
        target.stage = stage;
        target.updated_at = OffsetDateTime::now_utc();
        self.write_doc(&self.paths.deals_json, &deals)
            .map_err(unavailable)?;

        let mut details = serde_json::Map::new();
        details.insert(
            "field_changes".into(),
            serde_json::json!({ "stage": { "old": old.label(), "new": stage.label() } }),
        );
        self.log_committed(resource::DEAL, deal, details);
        Ok(())
    }
}

impl AuditLog for FileStore {
    fn list_audit_log(&self, resource_type: &str, resource_id: u64) -> StoreResult<Vec<AuditRow>> {
        Ok(self
            .read_audit()?
            .into_iter()
            .filter(|l| l.resource_type == resource_type && l.resource_id == resource_id)
            .map(|l| l.row)
            .collect())
    }

    fn append_audit_log(
        &self,
        resource_type: &str,
        resource_id: u64,
        action: &str,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<AuditRow> {
        let _lock = self.lock()?;
        self.push_audit(resource_type, resource_id, action, details)
    }
}

impl ActionItemSource for FileStore {
    fn list_action_items(&self, module_type: &str, module_id: u64) -> StoreResult<Vec<ActionItem>> {
        Ok(self
            .read_items()?
            .items
            .into_iter()
            .filter(|i| i.module_type == module_type && i.module_id == module_id)
            .collect())
    }

    fn create_action_item(&self, item: NewActionItem) -> StoreResult<ActionItem> {
        let _lock = self.lock()?;
        let mut file = self.read_items()?;
        let next = file
            .next_id
            .max(file.items.iter().map(|i| i.id).max().unwrap_or(0))
            + 1;
        let created = ActionItem {
            id: next,
            module_type: item.module_type,
            module_id: item.module_id,
            title: item.title,
            status: ActionStatus::Open,
            assigned_to: item.assigned_to,
            due_date: item.due_date,
            priority: item.priority,
            created_at: OffsetDateTime::now_utc(),
        };
        file.next_id = next;
        file.items.push(created.clone());
        self.write_items(&file)?;
        Ok(created)
    }

    fn update_action_item(&self, id: ActionItemId, patch: ActionItemPatch) -> StoreResult<ActionItem> {
        let _lock = self.lock()?;
        let mut file = self.read_items()?;
        let item = file
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::not_found("action item", id))?;
        let changes = patch.field_changes(item);
        patch.apply(item);
        let updated = item.clone();
        self.write_items(&file)?;
        if !changes.is_empty() {
            let mut details = serde_json::Map::new();
            details.insert("field_changes".into(), serde_json::Value::Object(changes));
            self.log_committed(resource::ACTION_ITEM, id, details);
        }
        Ok(updated)
    }

    fn delete_action_item(&self, id: ActionItemId) -> StoreResult<()> {
        let _lock = self.lock()?;
        let mut file = self.read_items()?;
        let before = file.items.len();
        file.items.retain(|i| i.id != id);
        if file.items.len() == before {
            return Err(StoreError::not_found("action item", id));
        }
        self.write_items(&file)
    }
}

impl DisplayNames for FileStore {
    fn resolve_display_name(&self, user_id: &str) -> String {
        match self.read_doc::<BTreeMap<String, String>>(&self.paths.users_json) {
            Ok(users) => users
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| user_id.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read users");
                user_id.to_string()
            }
        }
    }
}
