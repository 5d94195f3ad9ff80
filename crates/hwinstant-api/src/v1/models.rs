// Local API v1 wire types and the normalized models built from them.
//
// The v1 firmware names fields after the DSMR telegram (`active_power_w`,
// `total_power_import_kwh`, ...). The normalized `Measurement` uses the
// same names the newer API generations use, so everything above this
// crate sees one shape regardless of firmware.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── Device identity ─────────────────────────────────────────────────

/// `GET /api` response: who is answering at this address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub product_type: String,
    pub product_name: String,
    /// Older firmware on some product lines omits the serial.
    #[serde(default)]
    pub serial: Option<String>,
    pub firmware_version: String,
    pub api_version: String,
}

impl Device {
    /// The known product this identity belongs to, if any.
    pub fn product(&self) -> Option<ProductType> {
        self.product_type.parse().ok()
    }

    /// Human-readable model name, falling back to the reported product name.
    pub fn model_name(&self) -> String {
        self.product()
            .map_or_else(|| self.product_name.clone(), |p| p.model_name().to_owned())
    }
}

/// HomeWizard product identifiers as reported in `product_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum ProductType {
    #[strum(serialize = "HWE-P1")]
    P1Meter,
    #[strum(serialize = "HWE-SKT")]
    EnergySocket,
    #[strum(serialize = "HWE-WTR")]
    WaterMeter,
    #[strum(serialize = "HWE-KWH1")]
    KwhMeter1Phase,
    #[strum(serialize = "HWE-KWH3")]
    KwhMeter3Phase,
    #[strum(serialize = "SDM230-wifi")]
    Sdm230,
    #[strum(serialize = "SDM630-wifi")]
    Sdm630,
    #[strum(serialize = "HWE-BAT")]
    Battery,
}

impl ProductType {
    pub fn model_name(self) -> &'static str {
        match self {
            Self::P1Meter => "Wi-Fi P1 Meter",
            Self::EnergySocket => "Wi-Fi Energy Socket",
            Self::WaterMeter => "Wi-Fi Watermeter",
            Self::KwhMeter1Phase | Self::Sdm230 => "Wi-Fi kWh Meter 1-phase",
            Self::KwhMeter3Phase | Self::Sdm630 => "Wi-Fi kWh Meter 3-phase",
            Self::Battery => "Plug-In Battery",
        }
    }
}

// ── Measurement ─────────────────────────────────────────────────────

/// Kinds of sub-meters a P1 meter relays readings for (gas, heat, water).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsRefStr,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExternalDeviceType {
    GasMeter,
    HeatMeter,
    WarmWaterMeter,
    WaterMeter,
    InletHeatMeter,
}

/// Reading for one sub-meter, keyed by its unique id in `Measurement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalDevice {
    /// `None` when the firmware reports a type this client does not know.
    #[serde(rename = "type")]
    pub device_type: Option<ExternalDeviceType>,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Normalized measurement fields. Every field is optional: which ones are
/// present depends on the meter's DSMR version and phase count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub protocol_version: Option<u32>,
    pub meter_model: Option<String>,
    pub unique_id: Option<String>,
    pub tariff: Option<u8>,

    pub energy_import_kwh: Option<f64>,
    pub energy_import_t1_kwh: Option<f64>,
    pub energy_import_t2_kwh: Option<f64>,
    pub energy_import_t3_kwh: Option<f64>,
    pub energy_import_t4_kwh: Option<f64>,
    pub energy_export_kwh: Option<f64>,
    pub energy_export_t1_kwh: Option<f64>,
    pub energy_export_t2_kwh: Option<f64>,
    pub energy_export_t3_kwh: Option<f64>,
    pub energy_export_t4_kwh: Option<f64>,

    pub power_w: Option<f64>,
    pub power_l1_w: Option<f64>,
    pub power_l2_w: Option<f64>,
    pub power_l3_w: Option<f64>,

    pub voltage_v: Option<f64>,
    pub voltage_l1_v: Option<f64>,
    pub voltage_l2_v: Option<f64>,
    pub voltage_l3_v: Option<f64>,

    pub current_a: Option<f64>,
    pub current_l1_a: Option<f64>,
    pub current_l2_a: Option<f64>,
    pub current_l3_a: Option<f64>,

    pub frequency_hz: Option<f64>,

    pub apparent_power_va: Option<f64>,
    pub apparent_power_l1_va: Option<f64>,
    pub apparent_power_l2_va: Option<f64>,
    pub apparent_power_l3_va: Option<f64>,

    pub reactive_power_var: Option<f64>,
    pub reactive_power_l1_var: Option<f64>,
    pub reactive_power_l2_var: Option<f64>,
    pub reactive_power_l3_var: Option<f64>,

    /// Power factor as a fraction (0.0 - 1.0).
    pub power_factor: Option<f64>,
    pub power_factor_l1: Option<f64>,
    pub power_factor_l2: Option<f64>,
    pub power_factor_l3: Option<f64>,

    pub voltage_sag_l1_count: Option<u32>,
    pub voltage_sag_l2_count: Option<u32>,
    pub voltage_sag_l3_count: Option<u32>,
    pub voltage_swell_l1_count: Option<u32>,
    pub voltage_swell_l2_count: Option<u32>,
    pub voltage_swell_l3_count: Option<u32>,
    pub any_power_fail_count: Option<u32>,
    pub long_power_fail_count: Option<u32>,

    pub average_power_15m_w: Option<f64>,
    pub monthly_power_peak_w: Option<f64>,
    pub monthly_power_peak_timestamp: Option<NaiveDateTime>,

    pub total_gas_m3: Option<f64>,
    pub gas_timestamp: Option<NaiveDateTime>,
    pub gas_unique_id: Option<String>,

    pub external_devices: Option<BTreeMap<String, ExternalDevice>>,
}

// ── System ──────────────────────────────────────────────────────────

/// Device health block. On v1 firmware the Wi-Fi fields arrive with the
/// measurement and `cloud_enabled` comes from `/api/v1/system`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub wifi_ssid: Option<String>,
    pub wifi_strength_pct: Option<u8>,
    pub wifi_rssi_db: Option<i32>,
    pub uptime_s: Option<u64>,
    pub cloud_enabled: Option<bool>,
}

impl System {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything one poll returns: identity, measurement, and system status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedModels {
    pub device: Device,
    pub measurement: Measurement,
    pub system: Option<System>,
}

// ── Wire types ──────────────────────────────────────────────────────

/// `GET /api/v1/system` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SystemV1 {
    #[serde(default)]
    pub cloud_enabled: Option<bool>,
}

/// One entry of the `external` array in `GET /api/v1/data`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExternalV1 {
    pub unique_id: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub timestamp: Option<i64>,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

/// `GET /api/v1/data` response, field names as sent by the firmware.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataV1 {
    pub wifi_ssid: Option<String>,
    pub wifi_strength: Option<u8>,

    pub smr_version: Option<u32>,
    pub meter_model: Option<String>,
    pub unique_id: Option<String>,
    pub active_tariff: Option<u8>,

    pub total_power_import_kwh: Option<f64>,
    pub total_power_import_t1_kwh: Option<f64>,
    pub total_power_import_t2_kwh: Option<f64>,
    pub total_power_import_t3_kwh: Option<f64>,
    pub total_power_import_t4_kwh: Option<f64>,
    pub total_power_export_kwh: Option<f64>,
    pub total_power_export_t1_kwh: Option<f64>,
    pub total_power_export_t2_kwh: Option<f64>,
    pub total_power_export_t3_kwh: Option<f64>,
    pub total_power_export_t4_kwh: Option<f64>,

    pub active_power_w: Option<f64>,
    pub active_power_l1_w: Option<f64>,
    pub active_power_l2_w: Option<f64>,
    pub active_power_l3_w: Option<f64>,

    pub active_voltage_v: Option<f64>,
    pub active_voltage_l1_v: Option<f64>,
    pub active_voltage_l2_v: Option<f64>,
    pub active_voltage_l3_v: Option<f64>,

    pub active_current_a: Option<f64>,
    pub active_current_l1_a: Option<f64>,
    pub active_current_l2_a: Option<f64>,
    pub active_current_l3_a: Option<f64>,

    pub active_frequency_hz: Option<f64>,

    pub active_apparent_power_va: Option<f64>,
    pub active_apparent_power_l1_va: Option<f64>,
    pub active_apparent_power_l2_va: Option<f64>,
    pub active_apparent_power_l3_va: Option<f64>,

    pub active_reactive_power_var: Option<f64>,
    pub active_reactive_power_l1_var: Option<f64>,
    pub active_reactive_power_l2_var: Option<f64>,
    pub active_reactive_power_l3_var: Option<f64>,

    pub active_power_factor: Option<f64>,
    pub active_power_factor_l1: Option<f64>,
    pub active_power_factor_l2: Option<f64>,
    pub active_power_factor_l3: Option<f64>,

    pub voltage_sag_l1_count: Option<u32>,
    pub voltage_sag_l2_count: Option<u32>,
    pub voltage_sag_l3_count: Option<u32>,
    pub voltage_swell_l1_count: Option<u32>,
    pub voltage_swell_l2_count: Option<u32>,
    pub voltage_swell_l3_count: Option<u32>,
    pub any_power_fail_count: Option<u32>,
    pub long_power_fail_count: Option<u32>,

    pub active_power_average_w: Option<f64>,
    // Sic: the firmware spells it "montly".
    pub montly_power_peak_w: Option<f64>,
    pub montly_power_peak_timestamp: Option<i64>,

    pub total_gas_m3: Option<f64>,
    pub gas_timestamp: Option<i64>,
    pub gas_unique_id: Option<String>,

    pub external: Option<Vec<ExternalV1>>,
}

impl DataV1 {
    /// Wi-Fi fields ride along with the measurement on v1.
    pub(crate) fn system_fields(&self) -> System {
        System {
            wifi_ssid: self.wifi_ssid.clone(),
            wifi_strength_pct: self.wifi_strength,
            ..System::default()
        }
    }
}

impl From<DataV1> for Measurement {
    fn from(d: DataV1) -> Self {
        let external_devices = d
            .external
            .filter(|list| !list.is_empty())
            .map(|list| {
                list.into_iter()
                    .map(|e| {
                        let device = ExternalDevice {
                            device_type: e.device_type.as_deref().and_then(|t| t.parse().ok()),
                            unit: e.unit,
                            value: e.value,
                            timestamp: e.timestamp.and_then(parse_meter_timestamp),
                        };
                        (e.unique_id, device)
                    })
                    .collect()
            });

        Self {
            protocol_version: d.smr_version,
            meter_model: d.meter_model,
            unique_id: d.unique_id,
            tariff: d.active_tariff,
            energy_import_kwh: d.total_power_import_kwh,
            energy_import_t1_kwh: d.total_power_import_t1_kwh,
            energy_import_t2_kwh: d.total_power_import_t2_kwh,
            energy_import_t3_kwh: d.total_power_import_t3_kwh,
            energy_import_t4_kwh: d.total_power_import_t4_kwh,
            energy_export_kwh: d.total_power_export_kwh,
            energy_export_t1_kwh: d.total_power_export_t1_kwh,
            energy_export_t2_kwh: d.total_power_export_t2_kwh,
            energy_export_t3_kwh: d.total_power_export_t3_kwh,
            energy_export_t4_kwh: d.total_power_export_t4_kwh,
            power_w: d.active_power_w,
            power_l1_w: d.active_power_l1_w,
            power_l2_w: d.active_power_l2_w,
            power_l3_w: d.active_power_l3_w,
            voltage_v: d.active_voltage_v,
            voltage_l1_v: d.active_voltage_l1_v,
            voltage_l2_v: d.active_voltage_l2_v,
            voltage_l3_v: d.active_voltage_l3_v,
            current_a: d.active_current_a,
            current_l1_a: d.active_current_l1_a,
            current_l2_a: d.active_current_l2_a,
            current_l3_a: d.active_current_l3_a,
            frequency_hz: d.active_frequency_hz,
            apparent_power_va: d.active_apparent_power_va,
            apparent_power_l1_va: d.active_apparent_power_l1_va,
            apparent_power_l2_va: d.active_apparent_power_l2_va,
            apparent_power_l3_va: d.active_apparent_power_l3_va,
            reactive_power_var: d.active_reactive_power_var,
            reactive_power_l1_var: d.active_reactive_power_l1_var,
            reactive_power_l2_var: d.active_reactive_power_l2_var,
            reactive_power_l3_var: d.active_reactive_power_l3_var,
            power_factor: d.active_power_factor,
            power_factor_l1: d.active_power_factor_l1,
            power_factor_l2: d.active_power_factor_l2,
            power_factor_l3: d.active_power_factor_l3,
            voltage_sag_l1_count: d.voltage_sag_l1_count,
            voltage_sag_l2_count: d.voltage_sag_l2_count,
            voltage_sag_l3_count: d.voltage_sag_l3_count,
            voltage_swell_l1_count: d.voltage_swell_l1_count,
            voltage_swell_l2_count: d.voltage_swell_l2_count,
            voltage_swell_l3_count: d.voltage_swell_l3_count,
            any_power_fail_count: d.any_power_fail_count,
            long_power_fail_count: d.long_power_fail_count,
            average_power_15m_w: d.active_power_average_w,
            monthly_power_peak_w: d.montly_power_peak_w,
            monthly_power_peak_timestamp: d
                .montly_power_peak_timestamp
                .and_then(parse_meter_timestamp),
            total_gas_m3: d.total_gas_m3,
            gas_timestamp: d.gas_timestamp.and_then(parse_meter_timestamp),
            gas_unique_id: d.gas_unique_id,
            external_devices,
        }
    }
}

/// Decode a DSMR `yymmddhhmmss` timestamp (e.g. `230125220957`).
///
/// Returns `None` for values that do not form a valid date-time.
pub fn parse_meter_timestamp(raw: i64) -> Option<NaiveDateTime> {
    if !(0..=999_999_999_999).contains(&raw) {
        return None;
    }
    let part = |div: i64| -> Option<u32> { u32::try_from((raw / div) % 100).ok() };

    let year = i32::try_from(2000 + raw / 10_000_000_000).ok()?;
    let date = NaiveDate::from_ymd_opt(year, part(100_000_000)?, part(1_000_000)?)?;
    date.and_hms_opt(part(10_000)?, part(100)?, part(1)?)
}
