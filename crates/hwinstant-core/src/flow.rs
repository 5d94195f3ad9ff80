// ── Setup flow ──
//
// Interactive configuration of entries: manual entry by IP, zeroconf and
// DHCP discovery, re-enabling a disabled API, and moving an entry to a
// new address. Each step returns a `FlowResult` telling the caller to show
// a form, that an entry was created, or that the flow ended.

use std::collections::BTreeMap;
use std::sync::Arc;

use hwinstant_api::Device;
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{debug, error, info, warn};

use crate::client::{ClientFactory, DeviceApi};
use crate::config::{ConfigEntry, EntryData, FlowSource};
use crate::device_info::{entry_unique_id, is_supported};
use crate::entries::ConfigEntries;
use crate::error::CoreError;
use crate::host::Host;

// ── Result vocabulary ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowStep {
    User,
    DiscoveryConfirm,
    ReauthEnableApi,
    Reconfigure,
}

/// Recoverable problems shown on the form so the user can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowErrorCode {
    ApiNotEnabled,
    NetworkError,
}

/// Why a flow ended without creating an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbortReason {
    AlreadyConfigured,
    DeviceNotSupported,
    InvalidDiscoveryParameters,
    Unknown,
    UnknownError,
    UnsupportedApiVersion,
    WrongDevice,
    ReauthEnableApiSuccessful,
    ReconfigureSuccessful,
}

impl AbortReason {
    /// Whether the flow reached its goal.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::ReauthEnableApiSuccessful | Self::ReconfigureSuccessful
        )
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    Form {
        step_id: FlowStep,
        /// Keyed by field name; `base` for form-wide errors.
        errors: BTreeMap<String, FlowErrorCode>,
        placeholders: BTreeMap<String, String>,
    },
    CreateEntry {
        entry: Arc<ConfigEntry>,
    },
    Abort {
        reason: AbortReason,
    },
}

impl FlowResult {
    fn form(step_id: FlowStep) -> Self {
        Self::Form {
            step_id,
            errors: BTreeMap::new(),
            placeholders: BTreeMap::new(),
        }
    }

    fn form_with(
        step_id: FlowStep,
        error: Option<FlowErrorCode>,
        placeholders: BTreeMap<String, String>,
    ) -> Self {
        let errors = error
            .map(|code| BTreeMap::from([("base".to_owned(), code)]))
            .unwrap_or_default();
        Self::Form {
            step_id,
            errors,
            placeholders,
        }
    }

    fn abort(reason: AbortReason) -> Self {
        Self::Abort { reason }
    }
}

// ── Connection probe ─────────────────────────────────────────────

/// Outcome of a failed [`try_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Show the form again with this error.
    Recoverable(FlowErrorCode),
    /// End the flow.
    Abort(AbortReason),
}

/// Fetch the identity of the device at `ip_address`.
///
/// The client is always closed before returning.
pub async fn try_connect<F: ClientFactory>(
    factory: &F,
    ip_address: &str,
) -> Result<Device, ConnectError> {
    let client = factory.connect(ip_address).map_err(|e| {
        debug!(ip_address, error = %e, "cannot build client");
        ConnectError::Recoverable(FlowErrorCode::NetworkError)
    })?;

    let result = client.device().await;
    client.close();

    result.map_err(|e| {
        if e.is_disabled() {
            ConnectError::Recoverable(FlowErrorCode::ApiNotEnabled)
        } else if e.is_unsupported() {
            ConnectError::Abort(AbortReason::UnsupportedApiVersion)
        } else if e.is_request_error() {
            debug!(ip_address, error = %e, "device not reachable");
            ConnectError::Recoverable(FlowErrorCode::NetworkError)
        } else {
            error!(ip_address, error = %e, "unexpected error while connecting");
            ConnectError::Abort(AbortReason::UnknownError)
        }
    })
}

/// Reject product types this integration does not set up.
pub fn check_supported(device: &Device) -> Result<(), CoreError> {
    if is_supported(&device.product_type) {
        Ok(())
    } else {
        Err(CoreError::Unsupported {
            product_type: device.product_type.clone(),
        })
    }
}

/// Reject a device whose identity differs from the entry's.
pub fn check_same_device(entry: &ConfigEntry, device: &Device) -> Result<(), CoreError> {
    let found = entry_unique_id(device);
    if found.is_some() && found == entry.unique_id {
        return Ok(());
    }
    Err(CoreError::WrongDevice {
        expected: entry.unique_id.clone().unwrap_or_default(),
        found: found.unwrap_or_default(),
    })
}

// ── Discovery payloads ───────────────────────────────────────────

/// A zeroconf (`_hwenergy._tcp`) announcement.
#[derive(Debug, Clone, Default)]
pub struct ZeroconfInfo {
    pub ip_address: String,
    pub properties: BTreeMap<String, String>,
}

/// A DHCP lease seen for a HomeWizard MAC prefix.
#[derive(Debug, Clone, Default)]
pub struct DhcpInfo {
    pub ip_address: String,
    pub hostname: Option<String>,
    pub macaddress: Option<String>,
}

#[derive(Debug, Clone)]
struct Discovered {
    ip_address: String,
    product_name: String,
    product_type: String,
    serial: String,
}

impl Discovered {
    fn placeholders(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("product_type".to_owned(), self.product_type.clone()),
            ("serial".to_owned(), self.serial.clone()),
            ("ip_address".to_owned(), self.ip_address.clone()),
            (
                "name".to_owned(),
                format!("{} ({})", self.product_name, self.serial),
            ),
        ])
    }
}

// ── Flow ─────────────────────────────────────────────────────────

/// One run of the setup flow.
pub struct ConfigFlow<'a, F: ClientFactory> {
    factory: &'a F,
    entries: &'a ConfigEntries,
    host: &'a dyn Host,
    source: FlowSource,
    discovered: Option<Discovered>,
    /// Entry being reauthenticated or reconfigured.
    entry_id: Option<String>,
}

impl<'a, F: ClientFactory> ConfigFlow<'a, F> {
    pub fn new(factory: &'a F, entries: &'a ConfigEntries, host: &'a dyn Host) -> Self {
        Self {
            factory,
            entries,
            host,
            source: FlowSource::User,
            discovered: None,
            entry_id: None,
        }
    }

    pub fn source(&self) -> FlowSource {
        self.source
    }

    // ── Manual setup ─────────────────────────────────────────────

    pub fn step_user(&mut self) -> FlowResult {
        self.source = FlowSource::User;
        FlowResult::form(FlowStep::User)
    }

    /// Set up the device at `ip_address`.
    pub async fn submit_user(&mut self, ip_address: &str) -> FlowResult {
        self.source = FlowSource::User;
        let device = match try_connect(self.factory, ip_address).await {
            Ok(device) => device,
            Err(ConnectError::Recoverable(code)) => {
                return FlowResult::form_with(FlowStep::User, Some(code), BTreeMap::new());
            }
            Err(ConnectError::Abort(reason)) => return FlowResult::abort(reason),
        };

        if check_supported(&device).is_err() {
            return FlowResult::abort(AbortReason::DeviceNotSupported);
        }
        let Some(unique_id) = entry_unique_id(&device) else {
            warn!(ip_address, "device did not report a serial");
            return FlowResult::abort(AbortReason::Unknown);
        };
        if let Some(abort) = self.abort_if_configured(&unique_id, ip_address) {
            return abort;
        }

        self.create_entry(device.product_name, unique_id, ip_address)
    }

    // ── Discovery ────────────────────────────────────────────────

    /// Handle a zeroconf announcement. Does not contact the device.
    pub fn step_zeroconf(&mut self, info: &ZeroconfInfo) -> FlowResult {
        self.source = FlowSource::Zeroconf;
        let props = &info.properties;
        let (Some(product_name), Some(product_type), Some(serial)) = (
            props.get("product_name"),
            props.get("product_type"),
            props.get("serial"),
        ) else {
            return FlowResult::abort(AbortReason::InvalidDiscoveryParameters);
        };

        if props.get("path").is_some_and(|path| path != "/api/v1") {
            return FlowResult::abort(AbortReason::UnsupportedApiVersion);
        }
        if !is_supported(product_type) {
            return FlowResult::abort(AbortReason::DeviceNotSupported);
        }

        let discovered = Discovered {
            ip_address: info.ip_address.clone(),
            product_name: product_name.clone(),
            product_type: product_type.clone(),
            serial: serial.clone(),
        };
        self.confirm_discovery(discovered)
    }

    /// Handle a DHCP lease by asking the device who it is.
    pub async fn step_dhcp(&mut self, info: &DhcpInfo) -> FlowResult {
        self.source = FlowSource::Dhcp;
        let device = match try_connect(self.factory, &info.ip_address).await {
            Ok(device) => device,
            Err(ConnectError::Recoverable(code)) => {
                error!(ip_address = %info.ip_address, %code, "cannot reach discovered device");
                return FlowResult::abort(AbortReason::Unknown);
            }
            Err(ConnectError::Abort(reason)) => return FlowResult::abort(reason),
        };

        let Some(serial) = device.serial.clone() else {
            return FlowResult::abort(AbortReason::Unknown);
        };
        if !is_supported(&device.product_type) {
            return FlowResult::abort(AbortReason::DeviceNotSupported);
        }

        let discovered = Discovered {
            ip_address: info.ip_address.clone(),
            product_name: device.product_name,
            product_type: device.product_type,
            serial,
        };
        self.confirm_discovery(discovered)
    }

    fn confirm_discovery(&mut self, discovered: Discovered) -> FlowResult {
        let unique_id = discovery_unique_id(&discovered);
        if let Some(abort) = self.abort_if_configured(&unique_id, &discovered.ip_address) {
            return abort;
        }

        let placeholders = discovered.placeholders();
        self.discovered = Some(discovered);
        FlowResult::form_with(FlowStep::DiscoveryConfirm, None, placeholders)
    }

    /// The user confirmed the discovered device.
    pub async fn submit_discovery_confirm(&mut self) -> FlowResult {
        let Some(discovered) = self.discovered.clone() else {
            return FlowResult::abort(AbortReason::Unknown);
        };

        match try_connect(self.factory, &discovered.ip_address).await {
            Ok(_) => {}
            Err(ConnectError::Recoverable(code)) => {
                return FlowResult::form_with(
                    FlowStep::DiscoveryConfirm,
                    Some(code),
                    discovered.placeholders(),
                );
            }
            Err(ConnectError::Abort(reason)) => return FlowResult::abort(reason),
        }

        let unique_id = discovery_unique_id(&discovered);
        if let Some(abort) = self.abort_if_configured(&unique_id, &discovered.ip_address) {
            return abort;
        }
        self.create_entry(discovered.product_name, unique_id, &discovered.ip_address)
    }

    // ── Reauth ───────────────────────────────────────────────────

    /// Ask the user to enable the local API for `entry_id` again.
    pub fn step_reauth(&mut self, entry_id: &str) -> Result<FlowResult, CoreError> {
        let entry = self.entry(entry_id)?;
        self.source = FlowSource::Reauth;
        self.entry_id = Some(entry.entry_id.clone());
        Ok(FlowResult::form_with(
            FlowStep::ReauthEnableApi,
            None,
            BTreeMap::from([("title".to_owned(), entry.title.clone())]),
        ))
    }

    /// The user says the API is enabled again.
    pub async fn submit_reauth_enable_api(&mut self) -> Result<FlowResult, CoreError> {
        let entry = self.flow_entry()?;

        match try_connect(self.factory, &entry.data.ip_address).await {
            Ok(_) => {}
            Err(ConnectError::Recoverable(code)) => {
                return Ok(FlowResult::form_with(
                    FlowStep::ReauthEnableApi,
                    Some(code),
                    BTreeMap::from([("title".to_owned(), entry.title.clone())]),
                ));
            }
            Err(ConnectError::Abort(reason)) => return Ok(FlowResult::abort(reason)),
        }

        info!(entry_id = %entry.entry_id, "local API enabled again");
        self.host.schedule_reload(&entry.entry_id);
        Ok(FlowResult::abort(AbortReason::ReauthEnableApiSuccessful))
    }

    // ── Reconfigure ──────────────────────────────────────────────

    pub fn step_reconfigure(&mut self, entry_id: &str) -> Result<FlowResult, CoreError> {
        let entry = self.entry(entry_id)?;
        self.source = FlowSource::Reconfigure;
        self.entry_id = Some(entry.entry_id.clone());
        Ok(FlowResult::form_with(
            FlowStep::Reconfigure,
            None,
            reconfigure_placeholders(&entry),
        ))
    }

    /// Move the entry to `ip_address` if the same device answers there.
    pub async fn submit_reconfigure(&mut self, ip_address: &str) -> Result<FlowResult, CoreError> {
        let entry = self.flow_entry()?;

        let device = match try_connect(self.factory, ip_address).await {
            Ok(device) => device,
            Err(ConnectError::Recoverable(code)) => {
                return Ok(FlowResult::form_with(
                    FlowStep::Reconfigure,
                    Some(code),
                    reconfigure_placeholders(&entry),
                ));
            }
            Err(ConnectError::Abort(reason)) => return Ok(FlowResult::abort(reason)),
        };

        if let Err(e) = check_same_device(&entry, &device) {
            warn!(entry_id = %entry.entry_id, error = %e, "reconfigure found another device");
            return Ok(FlowResult::abort(AbortReason::WrongDevice));
        }

        self.entries.update_data(
            &entry.entry_id,
            EntryData {
                ip_address: ip_address.to_owned(),
            },
        )?;
        info!(entry_id = %entry.entry_id, ip_address, "entry reconfigured");
        self.host.schedule_reload(&entry.entry_id);
        Ok(FlowResult::abort(AbortReason::ReconfigureSuccessful))
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn entry(&self, entry_id: &str) -> Result<Arc<ConfigEntry>, CoreError> {
        self.entries
            .get(entry_id)
            .ok_or_else(|| CoreError::EntryNotFound {
                entry_id: entry_id.to_owned(),
            })
    }

    fn flow_entry(&self) -> Result<Arc<ConfigEntry>, CoreError> {
        let entry_id = self.entry_id.as_deref().ok_or_else(|| {
            CoreError::Internal("flow has no entry; start it with a reauth or reconfigure step".into())
        })?;
        self.entry(entry_id)
    }

    /// If an entry already owns `unique_id`, point it at `ip_address`
    /// (reloading it when the address changed) and end the flow.
    fn abort_if_configured(&self, unique_id: &str, ip_address: &str) -> Option<FlowResult> {
        let existing = self.entries.get_by_unique_id(unique_id)?;
        let data = EntryData {
            ip_address: ip_address.to_owned(),
        };
        match self.entries.update_data(&existing.entry_id, data) {
            Ok(true) => {
                info!(entry_id = %existing.entry_id, ip_address, "known device moved");
                self.host.schedule_reload(&existing.entry_id);
            }
            Ok(false) => {}
            Err(e) => warn!(entry_id = %existing.entry_id, error = %e, "cannot update entry"),
        }
        Some(FlowResult::abort(AbortReason::AlreadyConfigured))
    }

    fn create_entry(&self, title: String, unique_id: String, ip_address: &str) -> FlowResult {
        let entry = ConfigEntry::new(
            title,
            EntryData {
                ip_address: ip_address.to_owned(),
            },
            Some(unique_id),
            self.source,
        );
        match self.entries.add(entry) {
            Ok(entry) => {
                info!(entry_id = %entry.entry_id, title = %entry.title, "entry created");
                FlowResult::CreateEntry { entry }
            }
            Err(e) => {
                warn!(error = %e, "cannot create entry");
                FlowResult::abort(AbortReason::AlreadyConfigured)
            }
        }
    }
}

fn discovery_unique_id(discovered: &Discovered) -> String {
    format!(
        "{}_{}_{}",
        crate::device_info::DOMAIN,
        discovered.product_type,
        discovered.serial
    )
}

fn reconfigure_placeholders(entry: &ConfigEntry) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("title".to_owned(), entry.title.clone()),
        ("ip_address".to_owned(), entry.data.ip_address.clone()),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::host::StandaloneHost;
    use crate::testing::{Reply, ScriptedFactory, p1_device};

    struct Fixture {
        factory: ScriptedFactory,
        entries: ConfigEntries,
        host: Arc<StandaloneHost>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                factory: ScriptedFactory::new(),
                entries: ConfigEntries::new(),
                host: StandaloneHost::new(),
            }
        }

        fn flow(&self) -> ConfigFlow<'_, ScriptedFactory> {
            ConfigFlow::new(&self.factory, &self.entries, self.host.as_ref())
        }

        fn existing(&self, ip: &str) -> Arc<ConfigEntry> {
            self.entries
                .add(ConfigEntry::new(
                    "P1 meter",
                    EntryData {
                        ip_address: ip.into(),
                    },
                    Some("homewizard_instant_HWE-P1_5c2fafabcdef".into()),
                    FlowSource::User,
                ))
                .unwrap()
        }
    }

    fn zeroconf(props: &[(&str, &str)]) -> ZeroconfInfo {
        ZeroconfInfo {
            ip_address: "192.168.1.50".into(),
            properties: props
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    fn base_error(result: &FlowResult) -> Option<FlowErrorCode> {
        match result {
            FlowResult::Form { errors, .. } => errors.get("base").copied(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn user_flow_creates_entry() {
        let fx = Fixture::new();
        let mut flow = fx.flow();

        assert!(matches!(
            flow.step_user(),
            FlowResult::Form { step_id: FlowStep::User, .. }
        ));

        let result = flow.submit_user("192.168.1.50").await;
        let FlowResult::CreateEntry { entry } = result else {
            panic!("expected entry, got {result:?}");
        };
        assert_eq!(entry.title, "P1 meter");
        assert_eq!(entry.data.ip_address, "192.168.1.50");
        assert_eq!(
            entry.unique_id.as_deref(),
            Some("homewizard_instant_HWE-P1_5c2fafabcdef")
        );
        assert_eq!(entry.source, FlowSource::User);
        assert_eq!(fx.entries.len(), 1);
    }

    #[tokio::test]
    async fn try_connect_always_closes_client() {
        let fx = Fixture::new();
        for reply in [Reply::Ok(p1_device()), Reply::Disabled, Reply::Network, Reply::Garbage] {
            fx.factory.script.set_device(reply);
            let _ = try_connect(&fx.factory, "192.168.1.50").await;
        }
        let script = &fx.factory.script;
        assert_eq!(script.connects.load(Ordering::SeqCst), 4);
        assert_eq!(script.closes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn try_connect_classifies_errors() {
        let fx = Fixture::new();
        let cases = [
            (Reply::Disabled, ConnectError::Recoverable(FlowErrorCode::ApiNotEnabled)),
            (Reply::Network, ConnectError::Recoverable(FlowErrorCode::NetworkError)),
            (Reply::UnsupportedApi, ConnectError::Abort(AbortReason::UnsupportedApiVersion)),
            (Reply::Garbage, ConnectError::Abort(AbortReason::UnknownError)),
        ];
        for (reply, expected) in cases {
            fx.factory.script.set_device(reply);
            assert_eq!(try_connect(&fx.factory, "10.0.0.1").await.unwrap_err(), expected);
        }
    }

    #[tokio::test]
    async fn user_flow_shows_recoverable_errors() {
        let fx = Fixture::new();
        let mut flow = fx.flow();

        fx.factory.script.set_device(Reply::Disabled);
        let result = flow.submit_user("192.168.1.50").await;
        assert_eq!(base_error(&result), Some(FlowErrorCode::ApiNotEnabled));

        fx.factory.script.set_device(Reply::Network);
        let result = flow.submit_user("192.168.1.50").await;
        assert_eq!(base_error(&result), Some(FlowErrorCode::NetworkError));

        fx.factory.script.set_device(Reply::Ok(p1_device()));
        assert!(matches!(
            flow.submit_user("192.168.1.50").await,
            FlowResult::CreateEntry { .. }
        ));
    }

    #[tokio::test]
    async fn user_flow_rejects_other_products() {
        let fx = Fixture::new();
        let mut device = p1_device();
        device.product_type = "HWE-SKT".into();
        fx.factory.script.set_device(Reply::Ok(device));

        let result = fx.flow().submit_user("192.168.1.50").await;
        assert_eq!(
            result,
            FlowResult::Abort {
                reason: AbortReason::DeviceNotSupported
            }
        );
        assert!(fx.entries.is_empty());
    }

    #[tokio::test]
    async fn user_flow_updates_existing_entry_address() {
        let fx = Fixture::new();
        let existing = fx.existing("192.168.1.10");

        let result = fx.flow().submit_user("192.168.1.50").await;

        assert_eq!(
            result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyConfigured
            }
        );
        assert_eq!(fx.entries.len(), 1);
        assert_eq!(
            fx.entries.get(&existing.entry_id).unwrap().data.ip_address,
            "192.168.1.50"
        );
        assert_eq!(fx.host.reload_requests(), vec![existing.entry_id.clone()]);
    }

    #[tokio::test]
    async fn zeroconf_then_confirm_creates_entry() {
        let fx = Fixture::new();
        let mut flow = fx.flow();

        let result = flow.step_zeroconf(&zeroconf(&[
            ("api_enabled", "1"),
            ("path", "/api/v1"),
            ("product_name", "P1 meter"),
            ("product_type", "HWE-P1"),
            ("serial", "5c2fafabcdef"),
        ]));
        let FlowResult::Form {
            step_id,
            placeholders,
            ..
        } = result
        else {
            panic!("expected confirm form");
        };
        assert_eq!(step_id, FlowStep::DiscoveryConfirm);
        assert_eq!(placeholders["name"], "P1 meter (5c2fafabcdef)");

        let FlowResult::CreateEntry { entry } = flow.submit_discovery_confirm().await else {
            panic!("expected entry");
        };
        assert_eq!(entry.source, FlowSource::Zeroconf);
        assert_eq!(entry.data.ip_address, "192.168.1.50");
    }

    #[tokio::test]
    async fn zeroconf_rejects_bad_announcements() {
        let fx = Fixture::new();

        let missing = fx.flow().step_zeroconf(&zeroconf(&[("product_type", "HWE-P1")]));
        assert_eq!(
            missing,
            FlowResult::Abort {
                reason: AbortReason::InvalidDiscoveryParameters
            }
        );

        let socket = fx.flow().step_zeroconf(&zeroconf(&[
            ("product_name", "Energy Socket"),
            ("product_type", "HWE-SKT"),
            ("serial", "5c2fafaaaaaa"),
        ]));
        assert_eq!(
            socket,
            FlowResult::Abort {
                reason: AbortReason::DeviceNotSupported
            }
        );

        let v2 = fx.flow().step_zeroconf(&zeroconf(&[
            ("path", "/api/v2"),
            ("product_name", "P1 meter"),
            ("product_type", "HWE-P1"),
            ("serial", "5c2fafabcdef"),
        ]));
        assert_eq!(
            v2,
            FlowResult::Abort {
                reason: AbortReason::UnsupportedApiVersion
            }
        );
        assert_eq!(fx.factory.script.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zeroconf_for_known_device_updates_address() {
        let fx = Fixture::new();
        let existing = fx.existing("192.168.1.10");

        let result = fx.flow().step_zeroconf(&zeroconf(&[
            ("product_name", "P1 meter"),
            ("product_type", "HWE-P1"),
            ("serial", "5c2fafabcdef"),
        ]));

        assert_eq!(
            result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyConfigured
            }
        );
        assert_eq!(
            fx.entries.get(&existing.entry_id).unwrap().data.ip_address,
            "192.168.1.50"
        );
    }

    #[tokio::test]
    async fn discovery_confirm_shows_errors() {
        let fx = Fixture::new();
        let mut flow = fx.flow();
        flow.step_zeroconf(&zeroconf(&[
            ("product_name", "P1 meter"),
            ("product_type", "HWE-P1"),
            ("serial", "5c2fafabcdef"),
        ]));

        fx.factory.script.set_device(Reply::Disabled);
        let result = flow.submit_discovery_confirm().await;
        assert_eq!(base_error(&result), Some(FlowErrorCode::ApiNotEnabled));
        assert!(fx.entries.is_empty());
    }

    #[tokio::test]
    async fn dhcp_flow() {
        let fx = Fixture::new();
        let info = DhcpInfo {
            ip_address: "192.168.1.50".into(),
            hostname: Some("p1meter-abcdef".into()),
            macaddress: Some("5c2fafabcdef".into()),
        };

        let result = fx.flow().step_dhcp(&info).await;
        assert!(matches!(
            result,
            FlowResult::Form {
                step_id: FlowStep::DiscoveryConfirm,
                ..
            }
        ));

        fx.factory.script.set_device(Reply::Network);
        assert_eq!(
            fx.flow().step_dhcp(&info).await,
            FlowResult::Abort {
                reason: AbortReason::Unknown
            }
        );

        let mut no_serial = p1_device();
        no_serial.serial = None;
        fx.factory.script.set_device(Reply::Ok(no_serial));
        assert_eq!(
            fx.flow().step_dhcp(&info).await,
            FlowResult::Abort {
                reason: AbortReason::Unknown
            }
        );

        fx.factory.script.set_device(Reply::UnsupportedApi);
        assert_eq!(
            fx.flow().step_dhcp(&info).await,
            FlowResult::Abort {
                reason: AbortReason::UnsupportedApiVersion
            }
        );
    }

    #[tokio::test]
    async fn reauth_reloads_entry_once_api_is_back() {
        let fx = Fixture::new();
        let existing = fx.existing("192.168.1.50");
        let mut flow = fx.flow();

        let form = flow.step_reauth(&existing.entry_id).unwrap();
        assert!(matches!(
            form,
            FlowResult::Form {
                step_id: FlowStep::ReauthEnableApi,
                ..
            }
        ));

        fx.factory.script.set_device(Reply::Disabled);
        let still_off = flow.submit_reauth_enable_api().await.unwrap();
        assert_eq!(base_error(&still_off), Some(FlowErrorCode::ApiNotEnabled));
        assert!(fx.host.reload_requests().is_empty());

        fx.factory.script.set_device(Reply::Ok(p1_device()));
        let done = flow.submit_reauth_enable_api().await.unwrap();
        assert_eq!(
            done,
            FlowResult::Abort {
                reason: AbortReason::ReauthEnableApiSuccessful
            }
        );
        assert_eq!(fx.host.reload_requests(), vec![existing.entry_id.clone()]);
    }

    #[tokio::test]
    async fn reauth_for_unknown_entry_fails() {
        let fx = Fixture::new();
        let err = fx.flow().step_reauth("missing").unwrap_err();
        assert!(matches!(err, CoreError::EntryNotFound { .. }));
    }

    #[tokio::test]
    async fn reconfigure_moves_entry() {
        let fx = Fixture::new();
        let existing = fx.existing("192.168.1.10");
        let mut flow = fx.flow();
        flow.step_reconfigure(&existing.entry_id).unwrap();

        let result = flow.submit_reconfigure("192.168.1.60").await.unwrap();

        assert_eq!(
            result,
            FlowResult::Abort {
                reason: AbortReason::ReconfigureSuccessful
            }
        );
        assert_eq!(
            fx.entries.get(&existing.entry_id).unwrap().data.ip_address,
            "192.168.1.60"
        );
        assert_eq!(fx.host.reload_requests(), vec![existing.entry_id.clone()]);
    }

    #[tokio::test]
    async fn reconfigure_refuses_other_device() {
        let fx = Fixture::new();
        let existing = fx.existing("192.168.1.10");
        let mut other = p1_device();
        other.serial = Some("5c2faf000000".into());
        fx.factory.script.set_device(Reply::Ok(other));

        let mut flow = fx.flow();
        flow.step_reconfigure(&existing.entry_id).unwrap();
        let result = flow.submit_reconfigure("192.168.1.60").await.unwrap();

        assert_eq!(
            result,
            FlowResult::Abort {
                reason: AbortReason::WrongDevice
            }
        );
        assert_eq!(
            fx.entries.get(&existing.entry_id).unwrap().data.ip_address,
            "192.168.1.10"
        );
    }

    #[test]
    fn identity_checks() {
        let mut socket = p1_device();
        socket.product_type = "HWE-SKT".into();
        assert!(matches!(
            check_supported(&socket),
            Err(CoreError::Unsupported { .. })
        ));
        assert!(check_supported(&p1_device()).is_ok());

        let entry = ConfigEntry::new(
            "P1 meter",
            EntryData {
                ip_address: "10.0.0.1".into(),
            },
            Some("homewizard_instant_HWE-P1_5c2fafabcdef".into()),
            FlowSource::User,
        );
        assert!(check_same_device(&entry, &p1_device()).is_ok());
        let mut other = p1_device();
        other.serial = Some("000000000000".into());
        assert!(matches!(
            check_same_device(&entry, &other),
            Err(CoreError::WrongDevice { .. })
        ));
    }
}
