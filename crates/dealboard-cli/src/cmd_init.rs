use dealboard_core::contracts::DealSource;
use dealboard_store::{seed, BoardPaths, FileStore};
use std::path::Path;

pub fn execute(repo_root: &Path, demo: bool) -> anyhow::Result<()> {
    let paths = BoardPaths::discover(repo_root);
    let existed = paths.is_initialized();
    let store = FileStore::init(repo_root)?;

    if demo {
        if !store.list_deals()?.is_empty() {
            anyhow::bail!(
                "{} already has deals; refusing to overwrite with demo data",
                paths.board_dir.display()
            );
        }
        seed::seed_demo(&store)?;
        println!("Seeded demo board at {}", paths.board_dir.display());
        return Ok(());
    }

    if existed {
        println!("Already initialized at {}", paths.board_dir.display());
    } else {
        println!("Initialized empty deal board at {}", paths.board_dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_demo_refuses_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        execute(tmp.path(), false).unwrap();
        execute(tmp.path(), false).unwrap();
        execute(tmp.path(), true).unwrap();
        assert!(execute(tmp.path(), true).is_err());
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(!store.list_deals().unwrap().is_empty());
    }
}
