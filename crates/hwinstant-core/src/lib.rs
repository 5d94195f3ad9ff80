//! Plugin logic between `hwinstant-api` and its consumers (the CLI).
//!
//! This crate owns everything that happens after a device answered:
//!
//! - **[`Coordinator`]**: polls one device, runs the pure
//!   [`PollState::apply`] transition on every result and carries out its
//!   side effects (reload, raise or resolve the "API disabled" issue)
//!   against a [`Host`]. Listeners observe ticks through a `watch` channel.
//!
//! - **[`Runtime`]**: the production host. Sets config entries up, spawns
//!   one poll task per loaded entry, retries failed setups on a fixed
//!   interval and processes reload requests on a background task.
//!
//! - **[`ConfigFlow`]**: manual, zeroconf and DHCP setup plus the reauth
//!   and reconfigure steps, driven by [`try_connect`].
//!
//! - **Entities** ([`sensor`], [`device_info`]): the static sensor table
//!   and the projection of a snapshot onto sensor values.
//!
//! - **[`diagnostics`]**: redacted JSON dumps of an entry.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod device_info;
pub mod diagnostics;
pub mod entries;
pub mod error;
pub mod flow;
pub mod host;
pub mod issues;
pub mod runtime;
pub mod sensor;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientFactory, DeviceApi, HttpClientFactory};
pub use config::{ConfigEntry, EntryData, FlowSource, RuntimeOptions};
pub use coordinator::{
    Coordinator, CoordinatorUpdate, FetchOutcome, PollState, SideEffect, Transition, UpdateError,
};
pub use device_info::{DOMAIN, DeviceInfo, device_info, entry_unique_id};
pub use diagnostics::config_entry_diagnostics;
pub use entries::ConfigEntries;
pub use error::CoreError;
pub use flow::{
    AbortReason, ConfigFlow, ConnectError, DhcpInfo, FlowErrorCode, FlowResult, FlowStep,
    ZeroconfInfo, try_connect,
};
pub use host::{Host, StandaloneHost};
pub use issues::{Issue, IssueRegistry, IssueSeverity};
pub use runtime::{EntryState, Runtime, RuntimeEvent};
pub use sensor::{Entities, SensorReading, SensorValue, build_entities};

// Device models pass through unchanged.
pub use hwinstant_api::{CombinedModels, Device, ExternalDeviceType, Measurement, System};
