pub mod config;
pub mod file_store;
pub mod paths;
pub mod prefs;
pub mod seed;

pub use file_store::FileStore;
pub use paths::BoardPaths;
pub use prefs::JsonFilterPrefs;

use anyhow::Context;
use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const BOARD_KEY_CONTEXT: &str = "dealboard 2024 per-board preference key";

/// Stable key for a board checkout, used to file per-user state away from
/// the repository. Two spellings of the same directory map to the same key.
pub fn board_key(repo_root: &Path) -> String {
    let material = canonical_form(repo_root);
    let digest = blake3::Hash::from(blake3::derive_key(BOARD_KEY_CONTEXT, material.as_bytes()));
    let mut key = digest.to_hex().to_string();
    key.truncate(32);
    key
}

fn canonical_form(path: &Path) -> String {
    let resolved = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => path.to_path_buf(),
    };
    let text = resolved.to_string_lossy().replace('\\', "/");
    if cfg!(windows) {
        text.to_lowercase()
    } else {
        text
    }
}

/// Where per-user dealboard state lives. Prefers the platform data
/// directory and degrades to a dot directory in home, then in cwd.
pub fn user_data_root() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dealboard"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".dealboard-user")))
        .unwrap_or_else(|| PathBuf::from(".dealboard-user"))
}

pub fn board_prefs_dir(key: &str) -> PathBuf {
    user_data_root().join("boards").join(key)
}

/// Replace `path` with `bytes` so readers never observe a torn file. The
/// staging file is created next to the target so the final rename does not
/// cross filesystems.
pub fn replace_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let Some(dir) = path.parent() else {
        anyhow::bail!("cannot replace {}: path has no directory", path.display());
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut staged = tempfile::Builder::new()
        .prefix(".staged-")
        .tempfile_in(dir)
        .with_context(|| format!("failed to stage a write in {}", dir.display()))?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Exclusive advisory lock over the board directory, held across one
/// read-modify-write. Dropping it closes the file and releases the lock.
#[derive(Debug)]
pub struct WriteLock {
    _handle: fs::File,
}

impl WriteLock {
    pub fn acquire(lock_path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let handle = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("failed to open {}", lock_path.display()))?;
        handle
            .lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        Ok(Self { _handle: handle })
    }
}
