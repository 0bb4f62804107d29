//! Detail panel for the expanded record: live action items, merged
//! timeline, and the mutations behind them.
//!
//! Mutations are optimistic. The local list changes first, then the store is
//! called; on failure the pre-mutation list is restored, a notice is raised,
//! and the panel re-queries.

use crate::contracts::{ActionItemPatch, NewActionItem, RecordStore, StoreResult};
use crate::timeline::{self, TimelineEntry};
use crate::types::{ActionItem, ActionItemId, ActionStatus, RecordRef};

/// Generic notice shown when a write did not go through.
pub const MUTATION_FAILED: &str = "Could not save the change; showing the latest stored data.";

/// One fetch of both panel queries, tagged with the record it was made for.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailSnapshot {
    pub record: RecordRef,
    /// `None` when the action-item query failed.
    pub items: Option<Vec<ActionItem>>,
    pub timeline: Vec<TimelineEntry>,
}

impl DetailSnapshot {
    /// Query the store for `record`.
    pub fn fetch<S>(store: &S, record: &RecordRef) -> Self
    where
        S: RecordStore + ?Sized,
    {
        let items = match store.list_action_items(&record.resource_type, record.id) {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::warn!(%record, error = %e, "action item fetch failed");
                None
            }
        };
        let timeline = timeline::load(store, record);
        Self {
            record: record.clone(),
            items,
            timeline,
        }
    }
}

/// What the "add detail" form creates, chosen by its type selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddDetail {
    Note {
        message: String,
    },
    ActionItem {
        title: String,
        assigned_to: Option<String>,
        due_date: Option<String>,
        priority: u8,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

#[derive(Debug)]
pub struct DetailPanel {
    record: RecordRef,
    state: LoadState,
    items: Vec<ActionItem>,
    timeline: Vec<TimelineEntry>,
    notice: Option<String>,
}

impl DetailPanel {
    /// An empty panel waiting for its first snapshot.
    pub fn open(record: RecordRef) -> Self {
        Self {
            record,
            state: LoadState::Loading,
            items: Vec::new(),
            timeline: Vec::new(),
            notice: None,
        }
    }

    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn items(&self) -> &[ActionItem] {
        &self.items
    }

    /// Open and in-progress items, in stored order.
    pub fn active_items(&self) -> impl Iterator<Item = &ActionItem> {
        self.items.iter().filter(|i| i.status.is_active())
    }

    /// Completed and cancelled items; the panel folds these into the timeline.
    pub fn closed_items(&self) -> impl Iterator<Item = &ActionItem> {
        self.items.iter().filter(|i| i.status.is_closed())
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Install a fetch result. Results for another record are dropped.
    /// A failed item query keeps the list currently shown.
    pub fn accept(&mut self, snapshot: DetailSnapshot) -> bool {
        if snapshot.record != self.record {
            tracing::debug!(
                fetched = %snapshot.record,
                showing = %self.record,
                "dropping stale detail fetch"
            );
            return false;
        }
        if let Some(items) = snapshot.items {
            self.items = items;
        }
        self.timeline = snapshot.timeline;
        self.state = LoadState::Ready;
        true
    }

    /// Re-query both sources and install the result.
    pub fn refresh<S: RecordStore + ?Sized>(&mut self, store: &S) {
        let snapshot = DetailSnapshot::fetch(store, &self.record);
        self.accept(snapshot);
    }

    /// Change an item's status. Moving to Completed or Cancelled also
    /// appends a status row to the record's own audit log.
    pub fn set_status<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: ActionItemId,
        status: ActionStatus,
    ) -> StoreResult<()> {
        let old = self.items.iter().find(|i| i.id == id).map(|i| i.status);
        let updated = self.mutate(store, id, ActionItemPatch::status(status))?;
        if let Some(details) =
            old.and_then(|old| timeline::status_change_details(&updated, old, status))
        {
            if let Err(e) = store.append_audit_log(
                &self.record.resource_type,
                self.record.id,
                "update",
                details,
            ) {
                tracing::warn!(record = %self.record, error = %e, "status row not logged");
                self.notice = Some(MUTATION_FAILED.to_string());
            }
        }
        self.refresh(store);
        Ok(())
    }

    pub fn set_assignee<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: ActionItemId,
        user: Option<String>,
    ) -> StoreResult<()> {
        self.mutate(store, id, ActionItemPatch::assignee(user))?;
        self.refresh(store);
        Ok(())
    }

    pub fn set_due_date<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: ActionItemId,
        date: Option<String>,
    ) -> StoreResult<()> {
        self.mutate(store, id, ActionItemPatch::due_date(date))?;
        self.refresh(store);
        Ok(())
    }

    pub fn delete_item<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: ActionItemId,
    ) -> StoreResult<()> {
        let before = self.items.clone();
        self.items.retain(|i| i.id != id);
        if let Err(e) = store.delete_action_item(id) {
            self.roll_back(store, before, &e);
            return Err(e);
        }
        self.refresh(store);
        Ok(())
    }

    /// Add a manual timeline entry or a new action item. Blank text is ignored.
    pub fn add_detail<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        detail: AddDetail,
    ) -> StoreResult<()> {
        let result = match detail {
            AddDetail::Note { message } => {
                let message = message.trim();
                if message.is_empty() {
                    return Ok(());
                }
                store
                    .append_audit_log(
                        &self.record.resource_type,
                        self.record.id,
                        "note",
                        timeline::manual_entry_details(message),
                    )
                    .map(|_| ())
            }
            AddDetail::ActionItem {
                title,
                assigned_to,
                due_date,
                priority,
            } => {
                let title = title.trim();
                if title.is_empty() {
                    return Ok(());
                }
                store
                    .create_action_item(NewActionItem {
                        module_type: self.record.resource_type.clone(),
                        module_id: self.record.id,
                        title: title.to_string(),
                        assigned_to,
                        due_date,
                        priority: priority.clamp(1, 5),
                    })
                    .map(|_| ())
            }
        };
        if let Err(e) = &result {
            tracing::warn!(record = %self.record, error = %e, "add detail failed");
            self.notice = Some(MUTATION_FAILED.to_string());
        }
        self.refresh(store);
        result
    }

    /// Optimistic update of one item followed by the store call.
    fn mutate<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: ActionItemId,
        patch: ActionItemPatch,
    ) -> StoreResult<ActionItem> {
        let before = self.items.clone();
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            patch.apply(item);
        }
        match store.update_action_item(id, patch) {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.roll_back(store, before, &e);
                Err(e)
            }
        }
    }

    fn roll_back<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        before: Vec<ActionItem>,
        error: &crate::error::StoreError,
    ) {
        tracing::warn!(record = %self.record, %error, "mutation failed, rolling back");
        self.items = before;
        self.notice = Some(MUTATION_FAILED.to_string());
        self.refresh(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ActionItemSource, AuditLog};
    use crate::filter::tests::deal;
    use crate::memory::{MemoryStore, Op};
    use crate::types::Stage;
    use time::macros::datetime;

    fn store() -> MemoryStore {
        MemoryStore::with_deals(vec![deal(1, Stage::Rfq), deal(2, Stage::Won)])
            .with_actor("u1")
            .with_clock(datetime!(2026-03-01 09:00 UTC))
    }

    fn add_item(panel: &mut DetailPanel, s: &MemoryStore, title: &str) -> ActionItemId {
        panel
            .add_detail(
                s,
                AddDetail::ActionItem {
                    title: title.into(),
                    assigned_to: None,
                    due_date: None,
                    priority: 3,
                },
            )
            .unwrap();
        panel.items().iter().find(|i| i.title == title).unwrap().id
    }

    fn messages(panel: &DetailPanel) -> Vec<&str> {
        panel.timeline().iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn completing_an_item_moves_it_into_the_timeline() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        panel.refresh(&s);
        assert!(!panel.is_loading());
        panel
            .add_detail(&s, AddDetail::Note { message: "Called customer".into() })
            .unwrap();
        let id = add_item(&mut panel, &s, "Follow up");
        assert_eq!(panel.active_items().count(), 1);

        panel.set_status(&s, id, ActionStatus::Completed).unwrap();
        assert_eq!(panel.active_items().count(), 0);
        assert_eq!(panel.closed_items().count(), 1);
        assert_eq!(messages(&panel), vec!["Called customer", "Follow up → Completed"]);
        assert!(panel.notice().is_none());
    }

    #[test]
    fn in_progress_is_not_logged() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        let id = add_item(&mut panel, &s, "Quote");
        panel.set_status(&s, id, ActionStatus::InProgress).unwrap();
        assert!(panel.timeline().is_empty());
        assert!(s.list_audit_log("deal", 1).unwrap().is_empty());
    }

    #[test]
    fn failed_update_rolls_back_and_raises_notice() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        let id = add_item(&mut panel, &s, "Quote");
        s.fail_next(Op::UpdateItem, 1);
        assert!(panel.set_status(&s, id, ActionStatus::Completed).is_err());
        assert_eq!(panel.items()[0].status, ActionStatus::Open);
        assert_eq!(panel.take_notice().as_deref(), Some(MUTATION_FAILED));
        assert!(panel.timeline().is_empty());
    }

    #[test]
    fn failed_refetch_keeps_rolled_back_list() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        let id = add_item(&mut panel, &s, "Quote");
        s.fail_next(Op::DeleteItem, 1);
        s.fail_next(Op::ListItems, 1);
        assert!(panel.delete_item(&s, id).is_err());
        assert_eq!(panel.items().len(), 1);
        assert_eq!(panel.items()[0].id, id);
    }

    #[test]
    fn delete_and_reassign() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        let a = add_item(&mut panel, &s, "Call");
        let b = add_item(&mut panel, &s, "Visit");
        panel.set_assignee(&s, a, Some("u2".into())).unwrap();
        panel.set_due_date(&s, a, Some("2026-04-01".into())).unwrap();
        panel.delete_item(&s, b).unwrap();
        assert_eq!(panel.items().len(), 1);
        assert_eq!(panel.items()[0].assigned_to.as_deref(), Some("u2"));
        assert_eq!(panel.items()[0].due_date.as_deref(), Some("2026-04-01"));
        // Untitled item-log rows stay off the timeline.
        assert!(panel.timeline().is_empty());
    }

    #[test]
    fn stale_snapshot_is_dropped() {
        let s = store();
        s.create_action_item(NewActionItem {
            module_type: "deal".into(),
            module_id: 2,
            title: "Other".into(),
            assigned_to: None,
            due_date: None,
            priority: 3,
        })
        .unwrap();
        let stale = DetailSnapshot::fetch(&s, &RecordRef::deal(2));
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        assert!(!panel.accept(stale));
        assert!(panel.is_loading());
        assert!(panel.items().is_empty());
    }

    #[test]
    fn fetch_failures_degrade_to_empty() {
        let s = store();
        s.fail_next(Op::ListItems, 1);
        s.fail_next(Op::ListAudit, 1);
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        panel.refresh(&s);
        assert!(!panel.is_loading());
        assert!(panel.items().is_empty());
        assert!(panel.timeline().is_empty());
    }

    #[test]
    fn blank_details_are_ignored() {
        let s = store();
        let mut panel = DetailPanel::open(RecordRef::deal(1));
        panel
            .add_detail(&s, AddDetail::Note { message: "   ".into() })
            .unwrap();
        assert!(s.list_audit_log("deal", 1).unwrap().is_empty());
    }
}
