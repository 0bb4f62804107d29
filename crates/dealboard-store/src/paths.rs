use std::path::{Path, PathBuf};

use anyhow::Context;

/// Name of the per-repo board directory.
pub const BOARD_DIR: &str = ".dealboard";

/// All well-known paths under `.dealboard/`.
#[derive(Debug, Clone)]
pub struct BoardPaths {
    pub root: PathBuf,
    pub board_dir: PathBuf,
    pub deals_json: PathBuf,
    pub action_items_json: PathBuf,
    pub users_json: PathBuf,
    pub audit_jsonl: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl BoardPaths {
    /// Paths for the board rooted at `root`. Touches no files.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let board_dir = root.join(BOARD_DIR);
        Self {
            deals_json: board_dir.join("deals.json"),
            action_items_json: board_dir.join("action_items.json"),
            users_json: board_dir.join("users.json"),
            audit_jsonl: board_dir.join("audit.jsonl"),
            config_json: board_dir.join("config.json"),
            lock_file: board_dir.join("LOCK"),
            logs_dir: board_dir.join("logs"),
            board_dir,
            root,
        }
    }

    /// Create the board directory tree. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [&self.board_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Whether `dealboard init` has run here.
    pub fn is_initialized(&self) -> bool {
        self.board_dir.is_dir()
    }

    /// Log file of the interactive board.
    pub fn board_log(&self) -> PathBuf {
        self.logs_dir.join("board.log")
    }

    /// Nearest ancestor of `start` (itself included) holding `.dealboard/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(BOARD_DIR).is_dir())
            .map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_file_lives_in_board_dir() {
        let p = BoardPaths::discover("/tmp/repo");
        assert_eq!(p.board_dir, PathBuf::from("/tmp/repo/.dealboard"));
        assert_eq!(p.deals_json, PathBuf::from("/tmp/repo/.dealboard/deals.json"));
        assert_eq!(p.audit_jsonl, PathBuf::from("/tmp/repo/.dealboard/audit.jsonl"));
        assert_eq!(p.lock_file, PathBuf::from("/tmp/repo/.dealboard/LOCK"));
        assert_eq!(
            p.board_log(),
            PathBuf::from("/tmp/repo/.dealboard/logs/board.log")
        );
    }

    #[test]
    fn ensure_layout_and_find_root() {
        let repo = tempfile::tempdir().unwrap();
        let p = BoardPaths::discover(repo.path());
        assert!(!p.is_initialized());
        p.ensure_layout().expect("layout");
        assert!(p.is_initialized());
        assert!(p.logs_dir.is_dir());

        let nested = repo.path().join("proposals").join("2024");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(BoardPaths::find_root(&nested).as_deref(), Some(repo.path()));
        assert_eq!(BoardPaths::find_root(p.board_dir.parent().unwrap()).as_deref(), Some(repo.path()));
    }
}
