//! `dealboard config`: raw key/value access to `.dealboard/config.json`.
//!
//! Values are validated against `BoardConfig` before they are written, so a
//! board never ends up with a setting it would silently ignore on load.

use clap::Subcommand;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

use dealboard_core::config::BoardConfig;
use dealboard_store::config::{load_board_config, parse_value, read_config, write_config};
use dealboard_store::BoardPaths;

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Store a setting (booleans and numbers are parsed, anything else is text)
    Set { key: String, value: String },
    /// Print one stored setting
    Get { key: String },
    /// Print every stored setting
    List,
    /// Print all board settings after defaults are applied
    Effective,
}

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    let paths = BoardPaths::discover(repo_root);
    if !paths.is_initialized() {
        anyhow::bail!("{} is not a deal board. Run `dealboard init` first.", repo_root.display());
    }
    let mut out = std::io::stdout().lock();
    match cmd {
        ConfigCmd::Set { key, value } => set(&paths, &key, &value, &mut out),
        ConfigCmd::Get { key } => get(&paths, &key, &mut out),
        ConfigCmd::List => list(&paths, &mut out),
        ConfigCmd::Effective => {
            let effective = load_board_config(&paths.config_json)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&effective)?)?;
            Ok(())
        }
    }
}

fn set(paths: &BoardPaths, key: &str, raw: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let mut stored = read_config(&paths.config_json)?;
    let previous = stored.insert(key.to_string(), parse_value(raw));

    let (_, rejected) = BoardConfig::from_map(&stored);
    if rejected.iter().any(|k| k == key) {
        anyhow::bail!("`{raw}` is not a valid value for {key}");
    }
    if !is_board_setting(key) {
        tracing::warn!(key, "storing unrecognised config key");
        eprintln!("warning: {key} is not a board setting; stored anyway");
    }

    write_config(&paths.config_json, &stored)?;
    match previous {
        Some(old) => writeln!(out, "{key}: {} -> {raw}", plain(&old))?,
        None => writeln!(out, "{key} = {raw}")?,
    }
    Ok(())
}

fn get(paths: &BoardPaths, key: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let stored = read_config(&paths.config_json)?;
    let shown = stored.get(key).map(plain).unwrap_or_else(|| "(not set)".into());
    writeln!(out, "{shown}")?;
    Ok(())
}

fn list(paths: &BoardPaths, out: &mut impl Write) -> anyhow::Result<()> {
    let stored = read_config(&paths.config_json)?;
    if stored.is_empty() {
        writeln!(out, "(no config set)")?;
    }
    for (key, value) in &stored {
        writeln!(out, "{key} = {}", plain(value))?;
    }
    Ok(())
}

/// `actor` lives beside the board settings but is read by the session.
fn is_board_setting(key: &str) -> bool {
    if key == "actor" {
        return true;
    }
    matches!(
        serde_json::to_value(BoardConfig::default()),
        Ok(Value::Object(fields)) if fields.contains_key(key)
    )
}

fn plain(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}
