//! Configuration file for hwinstant.
//!
//! One TOML file holds global defaults and every config entry. Loading
//! layers serialized defaults, the file and `HWINSTANT_` environment
//! variables; saving writes the file back after a setup flow changed an
//! entry. Conversions to the core's `ConfigEntry` and `RuntimeOptions`
//! live here so the CLI never touches raw TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hwinstant_api::TransportConfig;
use hwinstant_core::{ConfigEntries, ConfigEntry, EntryData, FlowSource, RuntimeOptions};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Config entries keyed by entry id.
    #[serde(default)]
    pub entries: BTreeMap<String, EntryConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    #[serde(default = "default_setup_retry_secs")]
    pub setup_retry_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            update_interval_ms: default_update_interval_ms(),
            setup_retry_secs: default_setup_retry_secs(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    5
}
fn default_update_interval_ms() -> u64 {
    1000
}
fn default_setup_retry_secs() -> u64 {
    10
}

/// One `[entries.<entry_id>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryConfig {
    pub ip_address: String,

    /// `homewizard_instant_{product_type}_{serial}`.
    pub unique_id: Option<String>,

    pub title: String,

    #[serde(default)]
    pub source: FlowSource,
}

impl EntryConfig {
    pub fn from_entry(entry: &ConfigEntry) -> Self {
        Self {
            ip_address: entry.data.ip_address.clone(),
            unique_id: entry.unique_id.clone(),
            title: entry.title.clone(),
            source: entry.source,
        }
    }

    pub fn to_entry(&self, entry_id: &str) -> Result<ConfigEntry, ConfigError> {
        if self.ip_address.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("entries.{entry_id}.ip_address"),
                reason: "must not be empty".into(),
            });
        }
        Ok(ConfigEntry {
            entry_id: entry_id.to_owned(),
            unique_id: self.unique_id.clone(),
            title: self.title.clone(),
            source: self.source,
            data: EntryData {
                ip_address: self.ip_address.trim().to_owned(),
            },
            options: Default::default(),
        })
    }
}

impl Defaults {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::with_timeout(Duration::from_secs(self.timeout))
    }

    pub fn runtime_options(&self) -> Result<RuntimeOptions, ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "defaults.update_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(RuntimeOptions {
            update_interval: Duration::from_millis(self.update_interval_ms),
            setup_retry_interval: Duration::from_secs(self.setup_retry_secs),
            transport: self.transport(),
        })
    }
}

impl Config {
    /// Build the entry registry the runtime and setup flows share.
    pub fn to_entries(&self) -> Result<ConfigEntries, ConfigError> {
        let entries = self
            .entries
            .iter()
            .map(|(id, entry)| entry.to_entry(id))
            .collect::<Result<Vec<_>, _>>()?;
        ConfigEntries::from_entries(entries).map_err(|e| ConfigError::Validation {
            field: "entries".into(),
            reason: e.to_string(),
        })
    }

    /// Replace the stored entries with the registry's current contents.
    pub fn sync_entries(&mut self, entries: &ConfigEntries) {
        self.entries = entries
            .snapshot()
            .iter()
            .map(|entry| (entry.entry_id.clone(), EntryConfig::from_entry(entry)))
            .collect();
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "hwinstant", "hwinstant").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hwinstant");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HWINSTANT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
