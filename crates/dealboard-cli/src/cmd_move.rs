use dealboard_core::contracts::DealSource;
use dealboard_core::Stage;
use std::path::Path;

use crate::session::Session;

/// `dealboard move <deal> <stage>`
pub fn execute(repo_root: &Path, deal: u64, stage: &str) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    let to: Stage = stage.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let current = session.deal(deal)?;
    if current.stage == to {
        println!("Deal {deal} is already in {to}");
        return Ok(());
    }
    session.store.update_deal_stage(deal, to)?;
    tracing::info!(deal, from = %current.stage, to = %to, "stage changed");
    println!("Moved \"{}\" {} → {}", current.name, current.stage, to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealboard_store::{seed, FileStore};

    #[test]
    fn move_updates_stage_and_rejects_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::init(tmp.path()).unwrap();
        seed::seed_demo(&store).unwrap();

        execute(tmp.path(), 1, "qualified").unwrap();
        let deal = store.list_deals().unwrap().into_iter().find(|d| d.id == 1).unwrap();
        assert_eq!(deal.stage, Stage::Qualified);

        assert!(execute(tmp.path(), 1, "closed").is_err());
        assert!(execute(tmp.path(), 999, "won").is_err());
    }
}
