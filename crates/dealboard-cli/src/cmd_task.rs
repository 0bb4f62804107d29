use clap::Subcommand;
use std::path::Path;

use dealboard_core::contracts::DisplayNameCache;
use dealboard_core::detail::{AddDetail, DetailPanel};
use dealboard_core::{ActionItemId, ActionStatus, DealId};

use crate::session::Session;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum TaskCmd {
    /// Add an action item to a deal
    Add {
        /// Deal id
        deal: u64,
        /// Item title
        title: String,
        /// Assignee user id
        #[arg(long)]
        assign: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Priority, 1 (highest) to 5
        #[arg(long, default_value_t = 3)]
        priority: u8,
    },
    /// Change an item's status (open, in-progress, completed, cancelled)
    Status {
        deal: u64,
        item: u64,
        status: String,
    },
    /// Reassign an item; omit the user to unassign
    Assign {
        deal: u64,
        item: u64,
        user: Option<String>,
    },
    /// Set an item's due date; omit the date to clear it
    Due {
        deal: u64,
        item: u64,
        date: Option<String>,
    },
    /// Delete an item
    Delete { deal: u64, item: u64 },
    /// List a deal's action items, closed ones included
    List { deal: u64 },
}

// ── Dispatch ──

pub fn run(cmd: TaskCmd, repo_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    match cmd {
        TaskCmd::Add {
            deal,
            title,
            assign,
            due,
            priority,
        } => {
            let due = due.map(|d| validate_date(&d)).transpose()?;
            let mut panel = session.panel(deal)?;
            if title.trim().is_empty() {
                anyhow::bail!("item title is empty");
            }
            panel.add_detail(
                &session.store,
                AddDetail::ActionItem {
                    title: title.clone(),
                    assigned_to: assign,
                    due_date: due,
                    priority,
                },
            )?;
            println!("Added \"{}\" to deal {deal}", title.trim());
            Ok(())
        }
        TaskCmd::Status { deal, item, status } => {
            let status: ActionStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let mut panel = item_panel(&session, deal, item)?;
            panel.set_status(&session.store, item, status)?;
            println!("Item {item} → {status}");
            Ok(())
        }
        TaskCmd::Assign { deal, item, user } => {
            let mut panel = item_panel(&session, deal, item)?;
            panel.set_assignee(&session.store, item, user.clone())?;
            match user {
                Some(user) => println!("Item {item} assigned to {user}"),
                None => println!("Item {item} unassigned"),
            }
            Ok(())
        }
        TaskCmd::Due { deal, item, date } => {
            let date = date.map(|d| validate_date(&d)).transpose()?;
            let mut panel = item_panel(&session, deal, item)?;
            panel.set_due_date(&session.store, item, date.clone())?;
            println!("Item {item} due {}", date.as_deref().unwrap_or("(none)"));
            Ok(())
        }
        TaskCmd::Delete { deal, item } => {
            let mut panel = item_panel(&session, deal, item)?;
            panel.delete_item(&session.store, item)?;
            println!("Deleted item {item}");
            Ok(())
        }
        TaskCmd::List { deal } => {
            let panel = session.panel(deal)?;
            print!("{}", render_items(&panel, &session));
            Ok(())
        }
    }
}

/// A panel for `deal`, after checking that `item` belongs to it.
fn item_panel(session: &Session, deal: DealId, item: ActionItemId) -> anyhow::Result<DetailPanel> {
    let panel = session.panel(deal)?;
    if !panel.items().iter().any(|i| i.id == item) {
        anyhow::bail!("deal {deal} has no action item {item}");
    }
    Ok(panel)
}

fn validate_date(s: &str) -> anyhow::Result<String> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    let date = time::Date::parse(s.trim(), &format)
        .map_err(|e| anyhow::anyhow!("invalid date {s:?} (want YYYY-MM-DD): {e}"))?;
    Ok(date.to_string())
}

fn render_items(panel: &DetailPanel, session: &Session) -> String {
    if panel.items().is_empty() {
        return "No action items\n".to_string();
    }
    let names = DisplayNameCache::new();
    let mut out = String::new();
    for item in panel.active_items().chain(panel.closed_items()) {
        out.push_str(&format!(
            "[{}] P{} {:<36} {:<12} {:<12} due {}\n",
            item.id,
            item.priority,
            item.title,
            item.status,
            names.name(&session.store, item.assigned_to.as_deref()),
            item.due_date.as_deref().unwrap_or("-"),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealboard_core::contracts::{ActionItemSource, AuditLog};
    use dealboard_store::{seed, FileStore};

    fn seeded() -> (tempfile::TempDir, FileStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::init(tmp.path()).unwrap();
        seed::seed_demo(&store).unwrap();
        (tmp, store)
    }

    #[test]
    fn validate_date_normalizes_and_rejects() {
        assert_eq!(validate_date("2026-03-09").unwrap(), "2026-03-09");
        assert!(validate_date("09/03/2026").is_err());
        assert!(validate_date("2026-02-30").is_err());
    }

    #[test]
    fn add_then_complete_logs_status_row() {
        let (tmp, store) = seeded();
        run(
            TaskCmd::Add {
                deal: 2,
                title: "Book site visit".into(),
                assign: Some("u3".into()),
                due: Some("2026-11-02".into()),
                priority: 9,
            },
            tmp.path(),
        )
        .unwrap();
        let items = store.list_action_items("deal", 2).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, 5);
        let id = items[0].id;

        run(
            TaskCmd::Status {
                deal: 2,
                item: id,
                status: "done".into(),
            },
            tmp.path(),
        )
        .unwrap();
        let rows = store.list_audit_log("deal", 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].details["action_item_title"], "Book site visit");
    }

    #[test]
    fn item_must_belong_to_deal() {
        let (tmp, store) = seeded();
        let foreign = store.list_action_items("deal", 5).unwrap()[0].id;
        let err = run(TaskCmd::Delete { deal: 1, item: foreign }, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no action item"));
        assert_eq!(store.list_action_items("deal", 5).unwrap().len(), 2);
    }

    #[test]
    fn assign_due_and_delete() {
        let (tmp, store) = seeded();
        let open = store
            .list_action_items("deal", 5)
            .unwrap()
            .into_iter()
            .find(|i| i.status.is_active())
            .unwrap();
        run(TaskCmd::Assign { deal: 5, item: open.id, user: None }, tmp.path()).unwrap();
        run(TaskCmd::Due { deal: 5, item: open.id, date: None }, tmp.path()).unwrap();
        let after = store
            .list_action_items("deal", 5)
            .unwrap()
            .into_iter()
            .find(|i| i.id == open.id)
            .unwrap();
        assert!(after.assigned_to.is_none());
        assert!(after.due_date.is_none());

        run(TaskCmd::Delete { deal: 5, item: open.id }, tmp.path()).unwrap();
        assert_eq!(store.list_action_items("deal", 5).unwrap().len(), 1);
    }
}
