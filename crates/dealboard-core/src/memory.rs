//! In-process record store. Backs the board in tests and in `--demo`
//! sessions that should not touch disk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::contracts::{
    ActionItemPatch, ActionItemSource, AuditLog, DealSource, DisplayNames, FilterPrefs,
    NewActionItem, StoreResult,
};
use crate::error::StoreError;
use crate::filter::FilterState;
use crate::types::{resource, ActionItem, ActionItemId, ActionStatus, AuditRow, Deal, DealId, Stage};

/// Operations that can be made to fail on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    ListDeals,
    UpdateStage,
    ListAudit,
    AppendAudit,
    ListItems,
    CreateItem,
    UpdateItem,
    DeleteItem,
}

#[derive(Default)]
struct Inner {
    deals: Vec<Deal>,
    items: Vec<ActionItem>,
    audit: Vec<(String, u64, AuditRow)>,
    users: HashMap<String, String>,
    next_item: ActionItemId,
    next_row: u64,
    failing: HashMap<Op, usize>,
    clock: Option<OffsetDateTime>,
}

impl Inner {
    fn check(&mut self, op: Op) -> StoreResult<()> {
        if let Some(left) = self.failing.get_mut(&op) {
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Unavailable(format!("injected failure: {op:?}")));
            }
        }
        Ok(())
    }

    fn now(&mut self) -> OffsetDateTime {
        match &mut self.clock {
            Some(t) => {
                *t += time::Duration::seconds(1);
                *t
            }
            None => OffsetDateTime::now_utc(),
        }
    }

    fn push_row(
        &mut self,
        resource_type: &str,
        resource_id: u64,
        action: &str,
        details: serde_json::Map<String, serde_json::Value>,
        user_id: Option<String>,
    ) -> AuditRow {
        self.next_row += 1;
        let row = AuditRow {
            id: self.next_row,
            action: action.to_string(),
            details,
            created_at: self.now(),
            user_id,
        };
        self.audit
            .push((resource_type.to_string(), resource_id, row.clone()));
        row
    }
}

/// Thread-safe in-memory implementation of every record contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    actor: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deals(deals: Vec<Deal>) -> Self {
        let store = Self::new();
        store.lock().deals = deals;
        store
    }

    /// User id stamped on audit rows this store writes.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Use a deterministic clock starting at `start`, ticking one second per
    /// write.
    pub fn with_clock(self, start: OffsetDateTime) -> Self {
        self.lock().clock = Some(start);
        self
    }

    pub fn add_user(&self, id: impl Into<String>, name: impl Into<String>) {
        self.lock().users.insert(id.into(), name.into());
    }

    /// Make the next `times` calls of `op` fail with `Unavailable`.
    pub fn fail_next(&self, op: Op, times: usize) {
        self.lock().failing.insert(op, times);
    }

    /// Snapshot of every stored item, regardless of owner.
    pub fn items(&self) -> Vec<ActionItem> {
        self.lock().items.clone()
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.lock().deals.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-write.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DealSource for MemoryStore {
    fn list_deals(&self) -> StoreResult<Vec<Deal>> {
        let mut inner = self.lock();
        inner.check(Op::ListDeals)?;
        Ok(inner.deals.clone())
    }

    fn update_deal_stage(&self, deal: DealId, stage: Stage) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check(Op::UpdateStage)?;
        let now = inner.now();
        let target = inner
            .deals
            .iter_mut()
            .find(|d| d.id == deal)
            .ok_or_else(|| StoreError::not_found("deal", deal))?;
        let old = target.stage;
        target.stage = stage;
        target.updated_at = now;
        let mut details = serde_json::Map::new();
        details.insert(
            "field_changes".into(),
            serde_json::json!({ "stage": { "old": old.label(), "new": stage.label() } }),
        );
        inner.push_row(resource::DEAL, deal, "update", details, self.actor.clone());
        Ok(())
    }
}

impl AuditLog for MemoryStore {
    fn list_audit_log(&self, resource_type: &str, resource_id: u64) -> StoreResult<Vec<AuditRow>> {
        let mut inner = self.lock();
        inner.check(Op::ListAudit)?;
        Ok(inner
            .audit
            .iter()
            .filter(|(t, id, _)| t == resource_type && *id == resource_id)
            .map(|(_, _, row)| row.clone())
            .collect())
    }

    fn append_audit_log(
        &self,
        resource_type: &str,
        resource_id: u64,
        action: &str,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<AuditRow> {
        let mut inner = self.lock();
        inner.check(Op::AppendAudit)?;
        Ok(inner.push_row(resource_type, resource_id, action, details, self.actor.clone()))
    }
}

impl ActionItemSource for MemoryStore {
    fn list_action_items(&self, module_type: &str, module_id: u64) -> StoreResult<Vec<ActionItem>> {
        let mut inner = self.lock();
        inner.check(Op::ListItems)?;
        Ok(inner
            .items
            .iter()
            .filter(|i| i.module_type == module_type && i.module_id == module_id)
            .cloned()
            .collect())
    }

    fn create_action_item(&self, item: NewActionItem) -> StoreResult<ActionItem> {
        let mut inner = self.lock();
        inner.check(Op::CreateItem)?;
        inner.next_item += 1;
        let created = ActionItem {
            id: inner.next_item,
            module_type: item.module_type,
            module_id: item.module_id,
            title: item.title,
            status: ActionStatus::Open,
            assigned_to: item.assigned_to,
            due_date: item.due_date,
            priority: item.priority,
            created_at: inner.now(),
        };
        inner.items.push(created.clone());
        Ok(created)
    }

    fn update_action_item(&self, id: ActionItemId, patch: ActionItemPatch) -> StoreResult<ActionItem> {
        let mut inner = self.lock();
        inner.check(Op::UpdateItem)?;
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::not_found("action item", id))?;
        let changes = patch.field_changes(item);
        patch.apply(item);
        let updated = item.clone();
        if !changes.is_empty() {
            // Generic change row on the item's own log, without a title.
            let mut details = serde_json::Map::new();
            details.insert("field_changes".into(), serde_json::Value::Object(changes));
            inner.push_row(resource::ACTION_ITEM, id, "update", details, self.actor.clone());
        }
        Ok(updated)
    }

    fn delete_action_item(&self, id: ActionItemId) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check(Op::DeleteItem)?;
        let before = inner.items.len();
        inner.items.retain(|i| i.id != id);
        if inner.items.len() == before {
            return Err(StoreError::not_found("action item", id));
        }
        Ok(())
    }
}

impl DisplayNames for MemoryStore {
    fn resolve_display_name(&self, user_id: &str) -> String {
        self.lock()
            .users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    }
}

/// Filter preferences that live only as long as the process.
#[derive(Default)]
pub struct MemoryPrefs {
    saved: RefCell<Option<FilterState>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(state: FilterState) -> Self {
        Self {
            saved: RefCell::new(Some(state)),
        }
    }

    pub fn saved(&self) -> Option<FilterState> {
        self.saved.borrow().clone()
    }
}

impl FilterPrefs for MemoryPrefs {
    fn load(&self) -> StoreResult<Option<FilterState>> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&self, state: &FilterState) -> StoreResult<()> {
        *self.saved.borrow_mut() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::deal;

    fn new_item(title: &str) -> NewActionItem {
        NewActionItem {
            module_type: "deal".into(),
            module_id: 1,
            title: title.into(),
            assigned_to: None,
            due_date: None,
            priority: 3,
        }
    }

    #[test]
    fn injected_failures_are_counted() {
        let store = MemoryStore::with_deals(vec![deal(1, Stage::Lead)]);
        store.fail_next(Op::ListDeals, 1);
        assert!(store.list_deals().is_err());
        assert_eq!(store.list_deals().unwrap().len(), 1);
    }

    #[test]
    fn stage_update_writes_deal_audit_row() {
        let store = MemoryStore::with_deals(vec![deal(1, Stage::Lead)]).with_actor("u1");
        store.update_deal_stage(1, Stage::Rfq).unwrap();
        assert_eq!(store.deals()[0].stage, Stage::Rfq);
        let rows = store.list_audit_log("deal", 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].details["field_changes"]["stage"]["new"], "RFQ");
        assert_eq!(rows[0].user_id.as_deref(), Some("u1"));
        assert!(matches!(
            store.update_deal_stage(9, Stage::Won),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn item_lifecycle() {
        let store = MemoryStore::new();
        let a = store.create_action_item(new_item("Call")).unwrap();
        let b = store.create_action_item(new_item("Quote")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ActionStatus::Open);

        let updated = store
            .update_action_item(a.id, ActionItemPatch::status(ActionStatus::InProgress))
            .unwrap();
        assert_eq!(updated.status, ActionStatus::InProgress);
        assert_eq!(store.list_audit_log("action_item", a.id).unwrap().len(), 1);

        store.delete_action_item(b.id).unwrap();
        assert_eq!(store.list_action_items("deal", 1).unwrap().len(), 1);
        assert!(store.delete_action_item(b.id).is_err());
    }

    #[test]
    fn noop_update_writes_nothing() {
        let store = MemoryStore::new();
        let a = store.create_action_item(new_item("Call")).unwrap();
        store
            .update_action_item(a.id, ActionItemPatch::status(ActionStatus::Open))
            .unwrap();
        assert!(store.list_audit_log("action_item", a.id).unwrap().is_empty());
    }

    #[test]
    fn display_names_fall_back_to_id() {
        let store = MemoryStore::new();
        store.add_user("u1", "Ana Silva");
        assert_eq!(store.resolve_display_name("u1"), "Ana Silva");
        assert_eq!(store.resolve_display_name("u9"), "u9");
    }
}
