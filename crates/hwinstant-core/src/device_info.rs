// ── Device registry info ──
//
// How a meter (and the sub-meters it relays) identify themselves to
// consumers: manufacturer, model, firmware and stable identifiers.

use std::collections::BTreeSet;

use hwinstant_api::{CombinedModels, Device, ExternalDeviceType};
use serde::Serialize;

/// Identifier namespace for everything this crate registers.
pub const DOMAIN: &str = "homewizard_instant";

pub const MANUFACTURER: &str = "HomeWizard";

/// Product types this integration sets up.
pub const SUPPORTED_PRODUCT_TYPES: &[&str] = &["HWE-P1"];

/// Registry description of one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub manufacturer: String,
    pub model: Option<String>,
    pub model_id: Option<String>,
    pub sw_version: Option<String>,
    pub serial_number: Option<String>,
    pub identifiers: BTreeSet<(String, String)>,
    /// `("mac", "aa:bb:cc:dd:ee:ff")` when the serial is a MAC address.
    pub connections: BTreeSet<(String, String)>,
    /// Parent device for sub-meters.
    pub via_device: Option<(String, String)>,
}

/// Identifier of the meter with the given serial.
pub fn device_identifier(serial: &str) -> (String, String) {
    (DOMAIN.to_owned(), format!("{DOMAIN}_{serial}"))
}

/// Unique id of a config entry for a device identity.
pub fn entry_unique_id(device: &Device) -> Option<String> {
    let serial = device.serial.as_deref()?;
    Some(format!("{DOMAIN}_{}_{serial}", device.product_type))
}

/// Registry info for the meter answering at an entry's address.
pub fn device_info(data: &CombinedModels) -> DeviceInfo {
    let device = &data.device;
    let mut identifiers = BTreeSet::new();
    let mut connections = BTreeSet::new();
    if let Some(serial) = device.serial.as_deref() {
        identifiers.insert(device_identifier(serial));
        if let Some(mac) = format_mac(serial) {
            connections.insert(("mac".to_owned(), mac));
        }
    }

    DeviceInfo {
        name: None,
        manufacturer: MANUFACTURER.to_owned(),
        model: Some(format!("{} (Instant)", device.model_name())),
        model_id: Some(device.product_type.clone()),
        sw_version: Some(device.firmware_version.clone()),
        serial_number: device.serial.clone(),
        identifiers,
        connections,
        via_device: None,
    }
}

/// Registry info for a gas, heat or water meter relayed by the P1 meter.
pub fn external_device_info(
    meter: &Device,
    device_unique_id: &str,
    device_type: ExternalDeviceType,
) -> DeviceInfo {
    let mut identifiers = BTreeSet::new();
    identifiers.insert((DOMAIN.to_owned(), device_unique_id.to_owned()));

    DeviceInfo {
        name: Some(external_device_name(device_type).to_owned()),
        manufacturer: MANUFACTURER.to_owned(),
        model: None,
        model_id: None,
        sw_version: None,
        serial_number: Some(device_unique_id.to_owned()),
        identifiers,
        connections: BTreeSet::new(),
        via_device: meter.serial.as_deref().map(device_identifier),
    }
}

fn external_device_name(device_type: ExternalDeviceType) -> &'static str {
    match device_type {
        ExternalDeviceType::GasMeter => "Gas meter",
        ExternalDeviceType::HeatMeter => "Heat meter",
        ExternalDeviceType::WarmWaterMeter => "Warm water meter",
        ExternalDeviceType::WaterMeter => "Water meter",
        ExternalDeviceType::InletHeatMeter => "Inlet heat meter",
    }
}

/// `5c2fafabcdef` -> `5c:2f:af:ab:cd:ef`; `None` unless 12 hex digits.
fn format_mac(serial: &str) -> Option<String> {
    if serial.len() != 12 || !serial.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let lower = serial.to_ascii_lowercase();
    let pairs: Vec<&str> = (0..6).filter_map(|i| lower.get(i * 2..i * 2 + 2)).collect();
    Some(pairs.join(":"))
}

/// Whether the integration sets up this product type.
pub fn is_supported(product_type: &str) -> bool {
    SUPPORTED_PRODUCT_TYPES.contains(&product_type)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{p1_combined, p1_device};

    #[test]
    fn meter_info_carries_identity() {
        let info = device_info(&p1_combined());

        assert_eq!(info.manufacturer, "HomeWizard");
        assert_eq!(info.model.as_deref(), Some("Wi-Fi P1 Meter (Instant)"));
        assert_eq!(info.model_id.as_deref(), Some("HWE-P1"));
        assert_eq!(info.sw_version.as_deref(), Some("4.19"));
        assert!(info.identifiers.contains(&(
            "homewizard_instant".to_owned(),
            "homewizard_instant_5c2fafabcdef".to_owned()
        )));
        assert!(
            info.connections
                .contains(&("mac".to_owned(), "5c:2f:af:ab:cd:ef".to_owned()))
        );
    }

    #[test]
    fn meter_without_serial_has_no_identifiers() {
        let mut data = p1_combined();
        data.device.serial = None;
        let info = device_info(&data);
        assert!(info.identifiers.is_empty());
        assert!(info.connections.is_empty());
    }

    #[test]
    fn external_devices_hang_off_the_meter() {
        let info = external_device_info(&p1_device(), "G001", ExternalDeviceType::GasMeter);
        assert_eq!(info.name.as_deref(), Some("Gas meter"));
        assert_eq!(
            info.via_device,
            Some(device_identifier("5c2fafabcdef"))
        );
    }

    #[test]
    fn unique_id_needs_serial() {
        let mut device = p1_device();
        assert_eq!(
            entry_unique_id(&device).as_deref(),
            Some("homewizard_instant_HWE-P1_5c2fafabcdef")
        );
        device.serial = None;
        assert_eq!(entry_unique_id(&device), None);
    }

    #[test]
    fn only_p1_is_supported() {
        assert!(is_supported("HWE-P1"));
        assert!(!is_supported("HWE-SKT"));
    }

    #[test]
    fn mac_formatting_rejects_non_hex() {
        assert_eq!(format_mac("ABCDEF012345").as_deref(), Some("ab:cd:ef:01:23:45"));
        assert_eq!(format_mac("not-a-mac!!!"), None);
        assert_eq!(format_mac("abc"), None);
    }
}
