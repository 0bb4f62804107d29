use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Board tuning knobs. Stored as a flat JSON object in `.dealboard/config.json`;
/// every key is optional and unknown keys are ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    /// Duration of the expand/collapse transition.
    pub transition_ms: u64,
    /// Pause between a finished collapse and the queued re-expand.
    pub switch_yield_ms: u64,
    /// Painted frames to wait before measuring layout.
    pub settle_frames: u8,
    /// Gap kept between the viewport edge and the scroll target.
    pub scroll_margin: u32,
    /// Minimum width of a collapsed stage column.
    pub stage_min_width: u16,
    /// Fixed width of the stage column next to an open detail panel.
    pub expanded_stage_width: u16,
    /// Minimum width of the detail panel column.
    pub detail_min_width: u16,
    /// Share of leftover width the detail column takes relative to a stage.
    pub detail_weight: u16,
    /// Rows occupied by one card.
    pub card_height: u16,
    /// User id recorded on audit rows written from this board.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            transition_ms: 300,
            switch_yield_ms: 30,
            settle_frames: 3,
            scroll_margin: 2,
            stage_min_width: 22,
            expanded_stage_width: 28,
            detail_min_width: 60,
            detail_weight: 3,
            card_height: 4,
            actor: None,
        }
    }
}

impl BoardConfig {
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn switch_yield(&self) -> Duration {
        Duration::from_millis(self.switch_yield_ms)
    }

    /// Build from a flat JSON object, keeping the default for any key whose
    /// value has the wrong type. Returns the config and the rejected keys.
    pub fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> (Self, Vec<String>) {
        let mut config = Self::default();
        let mut rejected = Vec::new();
        let base = match serde_json::to_value(&config) {
            Ok(serde_json::Value::Object(base)) => base,
            _ => return (config, rejected),
        };
        for (key, value) in map {
            if !base.contains_key(key) && key != "actor" {
                continue;
            }
            let mut candidate = base.clone();
            candidate.insert(key.clone(), value.clone());
            match serde_json::from_value::<BoardConfig>(serde_json::Value::Object(candidate)) {
                Ok(parsed) => config.apply_key(key, parsed),
                Err(_) => rejected.push(key.clone()),
            }
        }
        (config, rejected)
    }

    fn apply_key(&mut self, key: &str, from: BoardConfig) {
        match key {
            "transition_ms" => self.transition_ms = from.transition_ms,
            "switch_yield_ms" => self.switch_yield_ms = from.switch_yield_ms,
            "settle_frames" => self.settle_frames = from.settle_frames.max(1),
            "scroll_margin" => self.scroll_margin = from.scroll_margin,
            "stage_min_width" => self.stage_min_width = from.stage_min_width.max(8),
            "expanded_stage_width" => {
                self.expanded_stage_width = from.expanded_stage_width.max(8)
            }
            "detail_min_width" => self.detail_min_width = from.detail_min_width.max(20),
            "detail_weight" => self.detail_weight = from.detail_weight.max(1),
            "card_height" => self.card_height = from.card_height.max(3),
            "actor" => self.actor = from.actor,
            _ => {}
        }
    }
}
