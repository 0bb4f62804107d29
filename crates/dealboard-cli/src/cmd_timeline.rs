use std::path::Path;

use dealboard_core::contracts::{DisplayNameCache, DisplayNames};
use dealboard_core::detail::DetailPanel;
use dealboard_core::timeline::TimelineEntry;

use crate::session::{short_time, Session};

/// `dealboard timeline <deal> [--json]`
pub fn execute(repo_root: &Path, deal: u64, json: bool) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    let record = session.deal(deal)?;
    let panel = session.panel(deal)?;
    let names = DisplayNameCache::new();

    if json {
        let value = serde_json::json!({
            "deal": record,
            "action_items": panel.active_items().collect::<Vec<_>>(),
            "timeline": attributed_json(&panel, &names, &session.store)?,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("#{} {} ({}, {})", record.id, record.name, record.customer, record.stage);
    println!();
    let active: Vec<_> = panel.active_items().collect();
    if active.is_empty() {
        println!("Open action items: none");
    } else {
        println!("Open action items:");
        for item in active {
            println!(
                "  [{}] {:<36} {:<12} {:<10} due {}",
                item.id,
                item.title,
                item.status,
                names.name(&session.store, item.assigned_to.as_deref()),
                item.due_date.as_deref().unwrap_or("-"),
            );
        }
    }
    println!();
    print!("{}", render_timeline(panel.timeline(), &names, &session.store));
    Ok(())
}

fn attributed_json(
    panel: &DetailPanel,
    names: &DisplayNameCache,
    store: &dyn DisplayNames,
) -> anyhow::Result<Vec<serde_json::Value>> {
    panel
        .timeline()
        .iter()
        .map(|entry| {
            let mut value = serde_json::to_value(entry)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "by".to_string(),
                    serde_json::json!(names.name(store, entry.user_id.as_deref())),
                );
            }
            Ok::<_, anyhow::Error>(value)
        })
        .collect()
}

/// `time  by  message`, oldest first.
fn render_timeline(entries: &[TimelineEntry], names: &DisplayNameCache, store: &dyn DisplayNames) -> String {
    if entries.is_empty() {
        return "Timeline: empty\n".to_string();
    }
    let mut out = String::from("Timeline:\n");
    for entry in entries {
        out.push_str(&format!(
            "  {}  {:<14} {}\n",
            short_time(entry.created_at),
            names.name(store, entry.user_id.as_deref()),
            entry.message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealboard_core::RecordRef;
    use dealboard_store::{seed, FileStore};

    #[test]
    fn demo_timeline_is_attributed_and_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::init(tmp.path()).unwrap();
        seed::seed_demo(&store).unwrap();

        let mut panel = DetailPanel::open(RecordRef::deal(5));
        panel.refresh(&store);
        let names = DisplayNameCache::new();
        let text = render_timeline(panel.timeline(), &names, &store);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timeline:");
        assert!(lines[1].ends_with("Site walk-through with facilities team"));
        assert!(lines[2].ends_with("Send RFQ pack → Completed"));

        let json = attributed_json(&panel, &names, &store).unwrap();
        assert_eq!(json.len(), 2);
        assert!(json[0]["by"].is_string());
        assert_eq!(json[1]["source"]["kind"], "action_item");

        execute(tmp.path(), 5, false).unwrap();
        execute(tmp.path(), 5, true).unwrap();
        assert!(execute(tmp.path(), 42, false).is_err());
    }
}
