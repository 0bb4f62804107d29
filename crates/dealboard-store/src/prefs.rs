//! Per-user filter persistence: `<user data root>/boards/<board key>/filters.json`.

use std::path::{Path, PathBuf};

use dealboard_core::contracts::{FilterPrefs, StoreResult};
use dealboard_core::error::StoreError;
use dealboard_core::filter::FilterState;

pub struct JsonFilterPrefs {
    path: PathBuf,
}

impl JsonFilterPrefs {
    /// Preferences for the board rooted at `repo_root`, kept outside the repo.
    pub fn for_project(repo_root: &Path) -> Self {
        let key = crate::board_key(repo_root);
        Self::at(crate::board_prefs_dir(&key).join("filters.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget the saved filters.
    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl FilterPrefs for JsonFilterPrefs {
    fn load(&self) -> StoreResult<Option<FilterState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let state: FilterState = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))?;
        Ok(Some(state.normalized()))
    }

    fn save(&self, state: &FilterState) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        crate::replace_file(&self.path, json.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("{e:#}")))
    }
}
