//! `.dealboard/config.json`: a flat JSON object of board settings.

use std::path::Path;

use anyhow::Context;

use dealboard_core::config::BoardConfig;

pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Read the config object. Missing file or a non-object document reads as empty.
pub fn read_config(path: &Path) -> anyhow::Result<ConfigMap> {
    if !path.exists() {
        return Ok(ConfigMap::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(match doc {
        serde_json::Value::Object(settings) => settings,
        _ => ConfigMap::new(),
    })
}

pub fn write_config(path: &Path, config: &ConfigMap) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    crate::replace_file(path, json.as_bytes())
}

/// Interpret a command-line value: `true`/`false`, then integers, then
/// floats; anything else stays text.
pub fn parse_value(raw: &str) -> serde_json::Value {
    use serde_json::Value;
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Bool(flag);
    }
    if let Ok(whole) = raw.parse::<i64>() {
        return Value::from(whole);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map_or_else(|| Value::from(raw), Value::from)
}

/// Typed view of the config file. Keys with unusable values keep their
/// default and are logged.
pub fn load_board_config(path: &Path) -> anyhow::Result<BoardConfig> {
    let map = read_config(path)?;
    let (config, rejected) = BoardConfig::from_map(&map);
    for key in rejected {
        tracing::warn!(key = %key, "ignoring invalid config value, using default");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_types() {
        assert_eq!(parse_value("true"), serde_json::Value::Bool(true));
        assert_eq!(parse_value("450"), serde_json::json!(450));
        assert_eq!(parse_value("0.5"), serde_json::json!(0.5));
        assert_eq!(parse_value("u-7"), serde_json::json!("u-7"));
        assert_eq!(parse_value("NaN"), serde_json::json!("NaN"));
    }

    #[test]
    fn write_then_load_typed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        assert_eq!(load_board_config(&path).unwrap(), BoardConfig::default());

        let mut map = ConfigMap::new();
        map.insert("transition_ms".into(), parse_value("150"));
        map.insert("detail_min_width".into(), parse_value("wide"));
        write_config(&path, &map).unwrap();

        let config = load_board_config(&path).unwrap();
        assert_eq!(config.transition_ms, 150);
        assert_eq!(config.detail_min_width, BoardConfig::default().detail_min_width);
        assert_eq!(read_config(&path).unwrap().len(), 2);
    }

    #[test]
    fn non_object_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "[1,2]").unwrap();
        assert!(read_config(&path).unwrap().is_empty());
    }
}
