//! Board configuration, parsed from the JSON options string the host passes.

use crate::model::Size;
use serde::{Deserialize, Serialize};

/// Tunables of a board instance. Every field has a default, so `{}` and the
/// empty string are both valid configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardConfig {
    /// Quiet period before a burst of canvas changes is persisted.
    pub debounce_ms: u32,
    /// Persist the very first observed change immediately.
    pub leading_write: bool,
    /// Minimum gap between the context menu and every canvas edge.
    pub menu_margin: f32,
    /// Menu size used until the host has measured the real element.
    pub menu_size: Size,
    /// Card size used for clamping until the host has measured a card.
    pub card_size: Size,
    /// Content fragment of a card created from the menu.
    pub default_content: String,
    pub export_file_name: String,
    /// Throttle window of the "restore default layout" control.
    pub reset_guard_ms: u32,
    /// Longest wait for the reset tombstone to be stored before reloading.
    pub reset_flush_ms: u32,
    /// Module script that hosts the persistence worker.
    pub worker_url: String,
    /// Log at debug level.
    pub debug: bool,
    pub store: StoreConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            leading_write: true,
            menu_margin: 4.0,
            menu_size: Size::new(240.0, 160.0),
            card_size: Size::new(260.0, 70.0),
            default_content: String::new(),
            export_file_name: "context.txt".to_string(),
            reset_guard_ms: 100,
            reset_flush_ms: 2000,
            worker_url: "./persist-worker.js".to_string(),
            debug: false,
            store: StoreConfig::default(),
        }
    }
}

impl BoardConfig {
    /// Parse options JSON; an empty or blank string yields the defaults.
    pub fn from_json(options: &str) -> Result<Self, String> {
        if options.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(options).map_err(|e| format!("invalid board options: {e}"))
    }

    /// Like `from_json`, but logs and falls back to defaults on bad input.
    pub fn from_json_or_default(options: &str) -> Self {
        Self::from_json(options).unwrap_or_else(|err| {
            log::warn!("{err}; using defaults");
            Self::default()
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Location of the persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub database_name: String,
    pub version: u32,
    pub store_name: String,
    /// The fixed key of the single record.
    pub record_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_name: "data-view".to_string(),
            version: 1,
            store_name: "data-store".to_string(),
            record_key: "data-view-key".to_string(),
        }
    }
}
