//! Widget configuration with atomic writes and migrations.
//!
//! The adapter is parameterized by the same options a host page passes to
//! the widget constructor (URLs, sizes, z-index, notification toggle). The
//! bridge adds request timeouts and diagnostics sizing. Stored as JSON with:
//! - Atomic writes (write temp, rename)
//! - Corruption fallback (regenerate defaults if parse fails)
//! - Schema versioning with migration support

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::adapter::widget::Direction;
use crate::ipc::RequestTimeouts;

/// Current schema version.
const CURRENT_SCHEMA_VERSION: u32 = 1;

const DEFAULT_PREFIX: &str = "rc-widget";
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MIN_EVENT_BUFFER_ENTRIES: usize = 16;

/// Keys that identify a legacy (v0) file holding bare constructor options.
const LEGACY_ADAPTER_KEYS: &[&str] = &[
    "logoUrl",
    "appUrl",
    "iconUrl",
    "prefix",
    "version",
    "appWidth",
    "appHeight",
    "zIndex",
    "enableNotification",
    "newAdapterUI",
];

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Schema version for migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub adapter: AdapterOptions,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            adapter: AdapterOptions::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl WidgetConfig {
    /// Validate and clamp config values to valid ranges.
    pub fn validate_and_clamp(&mut self) {
        if self.adapter.prefix.trim().is_empty() {
            log::info!("Empty adapter prefix, resetting to '{}'", DEFAULT_PREFIX);
            self.adapter.prefix = default_prefix();
        }

        self.bridge.request_timeout_ms = self
            .bridge
            .request_timeout_ms
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        for (path, timeout_ms) in self.bridge.path_timeouts_ms.iter_mut() {
            let clamped = (*timeout_ms).clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
            if clamped != *timeout_ms {
                log::warn!(
                    "Timeout for '{}' out of range ({} ms), clamped to {} ms",
                    path,
                    timeout_ms,
                    clamped
                );
                *timeout_ms = clamped;
            }
        }

        self.bridge.event_buffer_entries =
            self.bridge.event_buffer_entries.max(MIN_EVENT_BUFFER_ENTRIES);
    }
}

/// Construction options of the floating widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterOptions {
    pub logo_url: Option<String>,
    /// URL of the embedded softphone application.
    pub app_url: Option<String>,
    pub icon_url: Option<String>,
    /// Element id prefix; also used for the frame id.
    pub prefix: String,
    /// Sent along with `rc-adapter-goto-presence`.
    pub version: Option<String>,
    pub app_width: u32,
    pub app_height: u32,
    pub z_index: i32,
    /// Show a desktop notification for incoming calls.
    pub enable_notification: bool,
    /// Docked widget layout.
    #[serde(rename = "newAdapterUI", alias = "newAdapterUi")]
    pub new_adapter_ui: bool,
    pub default_direction: Direction,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            logo_url: None,
            app_url: None,
            icon_url: None,
            prefix: default_prefix(),
            version: None,
            app_width: 300,
            app_height: 500,
            z_index: 999,
            enable_notification: false,
            new_adapter_ui: false,
            default_direction: Direction::Right,
        }
    }
}

impl AdapterOptions {
    /// Check the construction contract.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::Contract(
                "adapter prefix must not be empty".to_string(),
            ));
        }
        if self.app_width == 0 || self.app_height == 0 {
            return Err(ConfigError::Contract(format!(
                "adapter size must be non-zero, got {}x{}",
                self.app_width, self.app_height
            )));
        }
        Ok(())
    }
}

/// Integration bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Default time to wait for a host response.
    pub request_timeout_ms: u64,
    /// Overrides keyed by host path.
    pub path_timeouts_ms: HashMap<String, u64>,
    /// Capacity of the diagnostics event buffer.
    pub event_buffer_entries: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            path_timeouts_ms: HashMap::new(),
            event_buffer_entries: 500,
        }
    }
}

impl BridgeConfig {
    pub fn request_timeouts(&self) -> RequestTimeouts {
        self.path_timeouts_ms.iter().fold(
            RequestTimeouts::new(Duration::from_millis(self.request_timeout_ms)),
            |timeouts, (path, ms)| timeouts.with_path(path.clone(), Duration::from_millis(*ms)),
        )
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist or is corrupted, returns defaults.
/// Corrupted files are backed up for debugging.
pub fn load_config_from_path(path: &Path) -> WidgetConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(value) => {
                let mut config = migrate_config(value);
                config.validate_and_clamp();
                config
            }
            Err(e) => {
                log::error!("Config parse error, using defaults: {}", e);
                let backup = path.with_extension("json.corrupt");
                if let Err(backup_err) = fs::rename(path, &backup) {
                    log::warn!("Failed to backup corrupt config: {}", backup_err);
                }
                WidgetConfig::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("No config file found, using defaults");
            WidgetConfig::default()
        }
        Err(e) => {
            log::error!("Config read error, using defaults: {}", e);
            WidgetConfig::default()
        }
    }
}

/// Save configuration atomically.
///
/// Writes to a temp file first, then renames to the final path.
pub fn save_config_to_path(config: &WidgetConfig, path: &Path) -> Result<(), ConfigError> {
    let temp = path.with_extension("json.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(&temp, &json)?;
    fs::rename(&temp, path)?;

    Ok(())
}

/// Migrate configuration from older schema versions.
fn migrate_config(mut config: Value) -> WidgetConfig {
    let version = config["schemaVersion"].as_u64().unwrap_or(0) as u32;

    // Migration v0 → v1: bare constructor options move under `adapter`.
    if version < 1 {
        if let Value::Object(map) = &mut config {
            if !map.contains_key("adapter") {
                let mut adapter = serde_json::Map::new();
                for key in LEGACY_ADAPTER_KEYS {
                    if let Some(value) = map.remove(*key) {
                        adapter.insert((*key).to_string(), value);
                    }
                }
                if !adapter.is_empty() {
                    map.insert("adapter".to_string(), Value::Object(adapter));
                    log::info!("Migrated config v0 → v1: moved constructor options under adapter");
                }
            }
            map.insert("schemaVersion".to_string(), serde_json::json!(1));
        }
    }

    serde_json::from_value(config).unwrap_or_else(|e| {
        log::error!("Config migration failed, using defaults: {}", e);
        WidgetConfig::default()
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid construction parameters: {0}")]
    Contract(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = WidgetConfig::default();
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(config.adapter.prefix, "rc-widget");
        assert_eq!(config.adapter.app_width, 300);
        assert_eq!(config.adapter.app_height, 500);
        assert_eq!(config.adapter.z_index, 999);
        assert!(!config.adapter.enable_notification);
        assert!(!config.adapter.new_adapter_ui);
        assert_eq!(config.adapter.default_direction, Direction::Right);
        assert_eq!(config.bridge.request_timeout_ms, 30_000);
        assert!(config.bridge.path_timeouts_ms.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut config = WidgetConfig::default();
        config.adapter.app_url = Some("https://example.com/app.html".to_string());
        config.adapter.enable_notification = true;
        config.adapter.new_adapter_ui = true;
        config
            .bridge
            .path_timeouts_ms
            .insert("/contacts".to_string(), 60_000);

        save_config_to_path(&config, &config_path).unwrap();
        assert!(config_path.exists());
        assert!(!config_path.with_extension("json.tmp").exists());

        let loaded = load_config_from_path(&config_path);
        assert_eq!(loaded.adapter, config.adapter);
        assert_eq!(loaded.bridge, config.bridge);
    }

    #[test]
    fn test_corrupt_json_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "{ invalid json }").unwrap();

        let config = load_config_from_path(&config_path);
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);

        let backup_path = config_path.with_extension("json.corrupt");
        assert!(backup_path.exists());
        assert!(!config_path.exists());
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config_from_path(&temp_dir.path().join("absent.json"));
        assert_eq!(config.adapter, AdapterOptions::default());
    }

    #[test]
    fn test_migration_from_bare_constructor_options() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"appUrl": "https://example.com/app", "zIndex": 5000, "newAdapterUI": true}"#,
        )
        .unwrap();

        let config = load_config_from_path(&config_path);
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.adapter.app_url.as_deref(), Some("https://example.com/app"));
        assert_eq!(config.adapter.z_index, 5000);
        assert!(config.adapter.new_adapter_ui);
        assert_eq!(config.adapter.prefix, "rc-widget");
    }

    #[test]
    fn test_validate_and_clamp() {
        let mut config = WidgetConfig::default();
        config.adapter.prefix = "  ".to_string();
        config.bridge.request_timeout_ms = 1;
        config
            .bridge
            .path_timeouts_ms
            .insert("/log".to_string(), u64::MAX);
        config.bridge.event_buffer_entries = 0;

        config.validate_and_clamp();

        assert_eq!(config.adapter.prefix, "rc-widget");
        assert_eq!(config.bridge.request_timeout_ms, MIN_TIMEOUT_MS);
        assert_eq!(config.bridge.path_timeouts_ms["/log"], MAX_TIMEOUT_MS);
        assert_eq!(config.bridge.event_buffer_entries, MIN_EVENT_BUFFER_ENTRIES);
    }

    #[test]
    fn test_adapter_contract_validation() {
        assert!(AdapterOptions::default().validate().is_ok());

        let options = AdapterOptions {
            prefix: String::new(),
            ..AdapterOptions::default()
        };
        assert!(matches!(options.validate(), Err(ConfigError::Contract(_))));

        let options = AdapterOptions {
            app_height: 0,
            ..AdapterOptions::default()
        };
        assert!(matches!(options.validate(), Err(ConfigError::Contract(_))));
    }

    #[test]
    fn test_request_timeouts_from_bridge_config() {
        let mut bridge = BridgeConfig::default();
        bridge.path_timeouts_ms.insert("/contacts".to_string(), 45_000);

        let timeouts = bridge.request_timeouts();
        assert_eq!(timeouts.get("/contacts"), Duration::from_secs(45));
        assert_eq!(timeouts.get("/other"), Duration::from_secs(30));
    }

    #[test]
    fn test_config_serialization_uses_camel_case() {
        let value = serde_json::to_value(WidgetConfig::default()).unwrap();
        assert!(value.get("schemaVersion").is_some());
        assert!(value["adapter"].get("appWidth").is_some());
        assert!(value["adapter"].get("newAdapterUI").is_some());
        assert!(value["bridge"].get("requestTimeoutMs").is_some());
    }
}
