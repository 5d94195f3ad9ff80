// ── Runtime entry configuration ──
//
// These types describe *which* devices to poll and *how often*.
// They never touch disk: hwinstant-config builds them from the TOML file
// and writes them back after a setup flow changed something.

use std::time::Duration;

use hwinstant_api::TransportConfig;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// How a config entry came to exist.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowSource {
    #[default]
    User,
    Zeroconf,
    Dhcp,
    Reauth,
    Reconfigure,
}

/// Connection data stored with an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub ip_address: String,
}

/// One configured device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    /// `homewizard_instant_{product_type}_{serial}`; `None` for entries
    /// written by hand without one.
    pub unique_id: Option<String>,
    pub title: String,
    pub source: FlowSource,
    pub data: EntryData,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ConfigEntry {
    /// New entry with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        data: EntryData,
        unique_id: Option<String>,
        source: FlowSource,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().simple().to_string(),
            unique_id,
            title: title.into(),
            source,
            data,
            options: serde_json::Map::new(),
        }
    }

    /// Stable prefix for entity unique ids: the entry's unique id, or its
    /// entry id when there is none.
    pub fn entity_prefix(&self) -> &str {
        self.unique_id.as_deref().unwrap_or(&self.entry_id)
    }
}

/// Tuning for the entry runtime.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Poll period for every loaded entry.
    pub update_interval: Duration,
    /// Delay before retrying a setup that failed with a recoverable error.
    pub setup_retry_interval: Duration,
    /// HTTP settings for device clients.
    pub transport: TransportConfig,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(1),
            setup_retry_interval: Duration::from_secs(10),
            transport: TransportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entries_get_distinct_ids() {
        let data = EntryData {
            ip_address: "192.168.1.50".into(),
        };
        let a = ConfigEntry::new("P1 meter", data.clone(), None, FlowSource::User);
        let b = ConfigEntry::new("P1 meter", data, None, FlowSource::User);
        assert_ne!(a.entry_id, b.entry_id);
        assert_eq!(a.entity_prefix(), a.entry_id);
    }

    #[test]
    fn flow_source_round_trips_as_snake_case() {
        assert_eq!(FlowSource::Zeroconf.to_string(), "zeroconf");
        assert_eq!("dhcp".parse::<FlowSource>().ok(), Some(FlowSource::Dhcp));
        let json = serde_json::to_string(&FlowSource::Reconfigure).ok();
        assert_eq!(json.as_deref(), Some("\"reconfigure\""));
    }
}
