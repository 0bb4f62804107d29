use std::path::Path;

use dealboard_core::config::BoardConfig;
use dealboard_core::detail::DetailPanel;
use dealboard_core::contracts::DealSource;
use dealboard_core::{Deal, DealId, RecordRef};
use dealboard_store::{config, BoardPaths, FileStore};

/// An opened board directory: the store plus its typed configuration.
pub struct Session {
    pub paths: BoardPaths,
    pub store: FileStore,
    pub config: BoardConfig,
}

impl Session {
    pub fn open(repo_root: &Path) -> anyhow::Result<Self> {
        let paths = BoardPaths::discover(repo_root);
        if !paths.is_initialized() {
            anyhow::bail!("No .dealboard/ directory found. Run `dealboard init` first.");
        }
        let config = config::load_board_config(&paths.config_json)?;
        let store = FileStore::open(repo_root)?.with_actor(config.actor.clone());
        Ok(Self {
            paths,
            store,
            config,
        })
    }

    /// Look up a deal or fail with a user-facing error.
    pub fn deal(&self, id: DealId) -> anyhow::Result<Deal> {
        self.store
            .list_deals()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow::anyhow!("deal {id} not found"))
    }

    /// A loaded detail panel for `deal`.
    pub fn panel(&self, deal: DealId) -> anyhow::Result<DetailPanel> {
        self.deal(deal)?;
        let mut panel = DetailPanel::open(RecordRef::deal(deal));
        panel.refresh(&self.store);
        Ok(panel)
    }
}

/// `2026-03-01 09:15`
pub fn short_time(t: time::OffsetDateTime) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    t.format(&format).unwrap_or_else(|_| t.to_string())
}

/// `EUR 12,500` style summary of per-currency totals.
pub fn money(totals: &std::collections::BTreeMap<String, f64>) -> String {
    totals
        .iter()
        .map(|(currency, value)| format!("{currency} {}", thousands(*value)))
        .collect::<Vec<_>>()
        .join(" + ")
}

pub fn thousands(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if whole < 0 {
        format!("-{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1250000.4), "1,250,000");
        assert_eq!(thousands(-4200.0), "-4,200");
    }

    #[test]
    fn money_joins_currencies() {
        let totals = std::collections::BTreeMap::from([
            ("EUR".to_string(), 1500.0),
            ("USD".to_string(), 20.0),
        ]);
        assert_eq!(money(&totals), "EUR 1,500 + USD 20");
    }

    #[test]
    fn open_requires_init() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Session::open(tmp.path()).is_err());
        FileStore::init(tmp.path()).unwrap();
        assert!(Session::open(tmp.path()).is_ok());
    }
}
