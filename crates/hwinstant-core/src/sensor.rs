// ── Sensor projection ──
//
// Maps a coordinator snapshot onto sensor entities. Descriptions are a
// static table; entities are created once per entry from the first
// snapshot and read their value from every later update.

use std::fmt;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use hwinstant_api::{CombinedModels, ExternalDevice, ExternalDeviceType};
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::config::ConfigEntry;
use crate::coordinator::CoordinatorUpdate;
use crate::device_info::{DOMAIN, DeviceInfo, device_info, external_device_info};

// ── Classification ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    ApparentPower,
    Current,
    Energy,
    Enum,
    Frequency,
    Gas,
    Power,
    PowerFactor,
    ReactivePower,
    SignalStrength,
    Timestamp,
    Voltage,
    Volume,
    Water,
}

impl DeviceClass {
    /// Units a value of this class may carry. Empty means "not checked".
    pub fn units(self) -> &'static [&'static str] {
        match self {
            Self::Energy => &["Wh", "kWh", "MWh", "MJ", "GJ"],
            Self::Gas => &["m³", "ft³", "CCF"],
            Self::Water => &["m³", "L", "gal", "ft³", "CCF"],
            Self::Volume => &["m³", "L", "mL", "gal", "ft³", "CCF", "fl. oz."],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Diagnostic,
}

/// A sensor's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Float(f64),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

// ── Value transforms ─────────────────────────────────────────────

/// Fraction (0.0 - 1.0) to percent. `None` stays `None`.
pub fn to_percentage(value: Option<f64>) -> Option<f64> {
    value.map(|v| v * 100.0)
}

/// Boot time for a device that has been up for `uptime_s` seconds,
/// truncated to whole seconds so the value does not change every tick.
pub fn uptime_to_datetime(uptime_s: u64) -> Option<DateTime<Utc>> {
    let uptime = TimeDelta::try_seconds(i64::try_from(uptime_s).ok()?)?;
    Utc::now().trunc_subsecs(0).checked_sub_signed(uptime)
}

fn float(value: Option<f64>) -> Option<SensorValue> {
    value.map(SensorValue::Float)
}

fn int(value: Option<u32>) -> Option<SensorValue> {
    value.map(|v| SensorValue::Int(i64::from(v)))
}

fn text(value: Option<&String>) -> Option<SensorValue> {
    value.map(|v| SensorValue::Text(v.clone()))
}

// ── Descriptions ─────────────────────────────────────────────────

type HasFn = fn(&CombinedModels) -> bool;
type ValueFn = fn(&CombinedModels) -> Option<SensorValue>;

/// Static description of one measurement sensor.
#[derive(Clone, Copy)]
pub struct SensorDescription {
    /// v1 field name; also the entity unique-id suffix.
    pub key: &'static str,
    pub translation_key: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub entity_category: Option<EntityCategory>,
    pub suggested_display_precision: Option<u8>,
    pub enabled_by_default: bool,
    /// Allowed states for `DeviceClass::Enum` sensors.
    pub options: &'static [&'static str],
    /// Whether the entity exists at all; defaults to "value present".
    pub has_fn: Option<HasFn>,
    pub value_fn: ValueFn,
    /// Overrides `enabled_by_default` from the first snapshot.
    pub enabled_fn: Option<HasFn>,
}

impl fmt::Debug for SensorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorDescription")
            .field("key", &self.key)
            .field("unit", &self.unit)
            .field("device_class", &self.device_class)
            .finish_non_exhaustive()
    }
}

impl SensorDescription {
    const fn new(key: &'static str, value_fn: ValueFn) -> Self {
        Self {
            key,
            translation_key: None,
            unit: None,
            device_class: None,
            state_class: None,
            entity_category: None,
            suggested_display_precision: None,
            enabled_by_default: true,
            options: &[],
            has_fn: None,
            value_fn,
            enabled_fn: None,
        }
    }

    const fn translation_key(mut self, key: &'static str) -> Self {
        self.translation_key = Some(key);
        self
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    const fn state(mut self, state_class: StateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    const fn precision(mut self, digits: u8) -> Self {
        self.suggested_display_precision = Some(digits);
        self
    }

    const fn diagnostic(mut self) -> Self {
        self.entity_category = Some(EntityCategory::Diagnostic);
        self
    }

    const fn disabled(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    const fn options(mut self, options: &'static [&'static str]) -> Self {
        self.options = options;
        self
    }

    const fn has(mut self, has_fn: HasFn) -> Self {
        self.has_fn = Some(has_fn);
        self
    }

    const fn enabled_when(mut self, enabled_fn: HasFn) -> Self {
        self.enabled_fn = Some(enabled_fn);
        self
    }

    /// Whether `data` supports this sensor.
    pub fn exists_for(&self, data: &CombinedModels) -> bool {
        match self.has_fn {
            Some(has) => has(data),
            None => (self.value_fn)(data).is_some(),
        }
    }

    /// Whether a new entity starts enabled.
    pub fn enabled_for(&self, data: &CombinedModels) -> bool {
        match self.enabled_fn {
            Some(enabled) => enabled(data),
            None => self.enabled_by_default,
        }
    }
}

const fn energy(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("kWh")
        .class(DeviceClass::Energy)
        .state(StateClass::TotalIncreasing)
        .precision(3)
}

const fn export_energy(key: &'static str, value_fn: ValueFn, enabled: HasFn) -> SensorDescription {
    energy(key, value_fn).enabled_when(enabled)
}

const fn power(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("W")
        .class(DeviceClass::Power)
        .state(StateClass::Measurement)
        .precision(0)
}

const fn voltage(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("V")
        .class(DeviceClass::Voltage)
        .state(StateClass::Measurement)
        .precision(1)
}

const fn current(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("A")
        .class(DeviceClass::Current)
        .state(StateClass::Measurement)
        .precision(1)
}

const fn apparent_power(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("VA")
        .class(DeviceClass::ApparentPower)
        .state(StateClass::Measurement)
        .precision(0)
        .disabled()
}

const fn reactive_power(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("var")
        .class(DeviceClass::ReactivePower)
        .state(StateClass::Measurement)
        .precision(0)
        .disabled()
}

const fn power_factor(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn)
        .unit("%")
        .class(DeviceClass::PowerFactor)
        .state(StateClass::Measurement)
        .precision(1)
        .disabled()
}

const fn counter(key: &'static str, value_fn: ValueFn) -> SensorDescription {
    SensorDescription::new(key, value_fn).diagnostic()
}

/// Every measurement sensor a P1 meter can expose.
pub static SENSORS: &[SensorDescription] = &[
    // Meter identity
    SensorDescription::new("smr_version", |d| int(d.measurement.protocol_version))
        .translation_key("dsmr_version")
        .diagnostic(),
    SensorDescription::new("meter_model", |d| text(d.measurement.meter_model.as_ref()))
        .translation_key("meter_model")
        .diagnostic(),
    SensorDescription::new("unique_meter_id", |d| text(d.measurement.unique_id.as_ref()))
        .translation_key("unique_meter_id")
        .diagnostic(),
    // Connectivity
    SensorDescription::new("wifi_ssid", |d| {
        text(d.system.as_ref().and_then(|s| s.wifi_ssid.as_ref()))
    })
    .translation_key("wifi_ssid")
    .diagnostic(),
    SensorDescription::new("active_tariff", |d| {
        d.measurement
            .tariff
            .map(|t| SensorValue::Text(t.to_string()))
    })
    .translation_key("active_tariff")
    .class(DeviceClass::Enum)
    .options(&["1", "2", "3", "4"]),
    SensorDescription::new("wifi_strength", |d| {
        d.system
            .as_ref()
            .and_then(|s| s.wifi_strength_pct)
            .map(|v| SensorValue::Int(i64::from(v)))
    })
    .translation_key("wifi_strength")
    .unit("%")
    .state(StateClass::Measurement)
    .diagnostic()
    .disabled(),
    SensorDescription::new("wifi_rssi", |d| {
        d.system
            .as_ref()
            .and_then(|s| s.wifi_rssi_db)
            .map(|v| SensorValue::Int(i64::from(v)))
    })
    .unit("dBm")
    .class(DeviceClass::SignalStrength)
    .state(StateClass::Measurement)
    .diagnostic()
    .disabled(),
    // Energy import
    energy("total_power_import_kwh", |d| float(d.measurement.energy_import_kwh))
        .translation_key("total_energy_import_kwh"),
    energy("total_power_import_t1_kwh", |d| {
        float(d.measurement.energy_import_t1_kwh)
    })
    .translation_key("total_energy_import_tariff_kwh"),
    energy("total_power_import_t2_kwh", |d| {
        float(d.measurement.energy_import_t2_kwh)
    })
    .translation_key("total_energy_import_tariff_kwh"),
    energy("total_power_import_t3_kwh", |d| {
        float(d.measurement.energy_import_t3_kwh)
    })
    .translation_key("total_energy_import_tariff_kwh"),
    energy("total_power_import_t4_kwh", |d| {
        float(d.measurement.energy_import_t4_kwh)
    })
    .translation_key("total_energy_import_tariff_kwh"),
    // Energy export: only enabled once something was actually exported
    export_energy(
        "total_power_export_kwh",
        |d| float(d.measurement.energy_export_kwh),
        |d| d.measurement.energy_export_kwh.is_none_or(|v| v != 0.0),
    )
    .translation_key("total_energy_export_kwh"),
    export_energy(
        "total_power_export_t1_kwh",
        |d| float(d.measurement.energy_export_t1_kwh),
        |d| d.measurement.energy_export_t1_kwh.is_none_or(|v| v != 0.0),
    )
    .translation_key("total_energy_export_tariff_kwh"),
    export_energy(
        "total_power_export_t2_kwh",
        |d| float(d.measurement.energy_export_t2_kwh),
        |d| d.measurement.energy_export_t2_kwh.is_none_or(|v| v != 0.0),
    )
    .translation_key("total_energy_export_tariff_kwh"),
    export_energy(
        "total_power_export_t3_kwh",
        |d| float(d.measurement.energy_export_t3_kwh),
        |d| d.measurement.energy_export_t3_kwh.is_none_or(|v| v != 0.0),
    )
    .translation_key("total_energy_export_tariff_kwh"),
    export_energy(
        "total_power_export_t4_kwh",
        |d| float(d.measurement.energy_export_t4_kwh),
        |d| d.measurement.energy_export_t4_kwh.is_none_or(|v| v != 0.0),
    )
    .translation_key("total_energy_export_tariff_kwh"),
    // Power
    power("active_power_w", |d| float(d.measurement.power_w)),
    power("active_power_l1_w", |d| float(d.measurement.power_l1_w))
        .translation_key("active_power_phase_w"),
    power("active_power_l2_w", |d| float(d.measurement.power_l2_w))
        .translation_key("active_power_phase_w"),
    power("active_power_l3_w", |d| float(d.measurement.power_l3_w))
        .translation_key("active_power_phase_w"),
    // Voltage
    voltage("active_voltage_v", |d| float(d.measurement.voltage_v)),
    voltage("active_voltage_l1_v", |d| float(d.measurement.voltage_l1_v))
        .translation_key("active_voltage_phase_v"),
    voltage("active_voltage_l2_v", |d| float(d.measurement.voltage_l2_v))
        .translation_key("active_voltage_phase_v"),
    voltage("active_voltage_l3_v", |d| float(d.measurement.voltage_l3_v))
        .translation_key("active_voltage_phase_v"),
    // Current
    current("active_current_a", |d| float(d.measurement.current_a)),
    current("active_current_l1_a", |d| float(d.measurement.current_l1_a))
        .translation_key("active_current_phase_a"),
    current("active_current_l2_a", |d| float(d.measurement.current_l2_a))
        .translation_key("active_current_phase_a"),
    current("active_current_l3_a", |d| float(d.measurement.current_l3_a))
        .translation_key("active_current_phase_a"),
    SensorDescription::new("active_frequency_hz", |d| float(d.measurement.frequency_hz))
        .unit("Hz")
        .class(DeviceClass::Frequency)
        .state(StateClass::Measurement)
        .precision(1),
    // Apparent / reactive power and power factor
    apparent_power("active_apparent_power_va", |d| {
        float(d.measurement.apparent_power_va)
    }),
    apparent_power("active_apparent_power_l1_va", |d| {
        float(d.measurement.apparent_power_l1_va)
    })
    .translation_key("active_apparent_power_phase_va"),
    apparent_power("active_apparent_power_l2_va", |d| {
        float(d.measurement.apparent_power_l2_va)
    })
    .translation_key("active_apparent_power_phase_va"),
    apparent_power("active_apparent_power_l3_va", |d| {
        float(d.measurement.apparent_power_l3_va)
    })
    .translation_key("active_apparent_power_phase_va"),
    reactive_power("active_reactive_power_var", |d| {
        float(d.measurement.reactive_power_var)
    }),
    reactive_power("active_reactive_power_l1_var", |d| {
        float(d.measurement.reactive_power_l1_var)
    })
    .translation_key("active_reactive_power_phase_var"),
    reactive_power("active_reactive_power_l2_var", |d| {
        float(d.measurement.reactive_power_l2_var)
    })
    .translation_key("active_reactive_power_phase_var"),
    reactive_power("active_reactive_power_l3_var", |d| {
        float(d.measurement.reactive_power_l3_var)
    })
    .translation_key("active_reactive_power_phase_var"),
    power_factor("active_power_factor", |d| {
        float(to_percentage(d.measurement.power_factor))
    }),
    power_factor("active_power_factor_l1", |d| {
        float(to_percentage(d.measurement.power_factor_l1))
    })
    .translation_key("active_power_factor_phase"),
    power_factor("active_power_factor_l2", |d| {
        float(to_percentage(d.measurement.power_factor_l2))
    })
    .translation_key("active_power_factor_phase"),
    power_factor("active_power_factor_l3", |d| {
        float(to_percentage(d.measurement.power_factor_l3))
    })
    .translation_key("active_power_factor_phase"),
    // Power quality counters
    counter("voltage_sag_l1_count", |d| int(d.measurement.voltage_sag_l1_count))
        .translation_key("voltage_sag_phase_count"),
    counter("voltage_sag_l2_count", |d| int(d.measurement.voltage_sag_l2_count))
        .translation_key("voltage_sag_phase_count"),
    counter("voltage_sag_l3_count", |d| int(d.measurement.voltage_sag_l3_count))
        .translation_key("voltage_sag_phase_count"),
    counter("voltage_swell_l1_count", |d| {
        int(d.measurement.voltage_swell_l1_count)
    })
    .translation_key("voltage_swell_phase_count"),
    counter("voltage_swell_l2_count", |d| {
        int(d.measurement.voltage_swell_l2_count)
    })
    .translation_key("voltage_swell_phase_count"),
    counter("voltage_swell_l3_count", |d| {
        int(d.measurement.voltage_swell_l3_count)
    })
    .translation_key("voltage_swell_phase_count"),
    counter("any_power_fail_count", |d| int(d.measurement.any_power_fail_count))
        .translation_key("any_power_fail_count"),
    counter("long_power_fail_count", |d| {
        int(d.measurement.long_power_fail_count)
    })
    .translation_key("long_power_fail_count"),
    // Peaks
    power("active_power_average_w", |d| {
        float(d.measurement.average_power_15m_w)
    })
    .translation_key("active_power_average_w"),
    power("monthly_power_peak_w", |d| {
        float(d.measurement.monthly_power_peak_w)
    })
    .translation_key("monthly_power_peak_w"),
    // System
    SensorDescription::new("uptime", |d| {
        d.system
            .as_ref()
            .and_then(|s| s.uptime_s)
            .and_then(uptime_to_datetime)
            .map(SensorValue::Timestamp)
    })
    .has(|d| d.system.as_ref().is_some_and(|s| s.uptime_s.is_some()))
    .class(DeviceClass::Timestamp)
    .diagnostic()
    .disabled(),
];

/// Static description of a sub-meter sensor, per external device type.
#[derive(Debug, Clone, Copy)]
pub struct ExternalSensorDescription {
    pub device_type: ExternalDeviceType,
    pub translation_key: &'static str,
    pub suggested_device_class: DeviceClass,
    pub state_class: StateClass,
    pub suggested_display_precision: u8,
}

pub static EXTERNAL_SENSORS: &[ExternalSensorDescription] = &[
    ExternalSensorDescription {
        device_type: ExternalDeviceType::GasMeter,
        translation_key: "gas_meter",
        suggested_device_class: DeviceClass::Gas,
        state_class: StateClass::TotalIncreasing,
        suggested_display_precision: 3,
    },
    ExternalSensorDescription {
        device_type: ExternalDeviceType::HeatMeter,
        translation_key: "heat_meter",
        suggested_device_class: DeviceClass::Energy,
        state_class: StateClass::TotalIncreasing,
        suggested_display_precision: 3,
    },
    ExternalSensorDescription {
        device_type: ExternalDeviceType::WarmWaterMeter,
        translation_key: "warm_water_meter",
        suggested_device_class: DeviceClass::Water,
        state_class: StateClass::TotalIncreasing,
        suggested_display_precision: 3,
    },
    ExternalSensorDescription {
        device_type: ExternalDeviceType::WaterMeter,
        translation_key: "water_meter",
        suggested_device_class: DeviceClass::Water,
        state_class: StateClass::TotalIncreasing,
        suggested_display_precision: 3,
    },
    ExternalSensorDescription {
        device_type: ExternalDeviceType::InletHeatMeter,
        translation_key: "inlet_heat_meter",
        suggested_device_class: DeviceClass::Volume,
        state_class: StateClass::TotalIncreasing,
        suggested_display_precision: 3,
    },
];

fn external_description(device_type: ExternalDeviceType) -> Option<&'static ExternalSensorDescription> {
    EXTERNAL_SENSORS.iter().find(|d| d.device_type == device_type)
}

/// Sub-meters report `m3`; everything else keeps its spelling.
pub fn normalize_unit(unit: &str) -> String {
    match unit {
        "m3" => "m³".to_owned(),
        other => other.to_owned(),
    }
}

// ── Entities ─────────────────────────────────────────────────────

/// One measurement sensor bound to an entry.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    pub unique_id: String,
    pub description: &'static SensorDescription,
    pub enabled_by_default: bool,
    pub device_info: DeviceInfo,
}

impl SensorEntity {
    pub fn key(&self) -> &'static str {
        self.description.key
    }

    pub fn native_value(&self, update: &CoordinatorUpdate) -> Option<SensorValue> {
        update
            .data
            .as_deref()
            .and_then(|data| (self.description.value_fn)(data))
    }

    pub fn native_unit(&self) -> Option<&'static str> {
        self.description.unit
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.description.device_class
    }

    /// Last tick succeeded and the snapshot has a value for this sensor.
    pub fn available(&self, update: &CoordinatorUpdate) -> bool {
        update.last_update_success && self.native_value(update).is_some()
    }
}

/// One sub-meter sensor (gas, heat, water) bound to an entry.
#[derive(Debug, Clone)]
pub struct ExternalSensorEntity {
    pub unique_id: String,
    pub device_unique_id: String,
    pub description: &'static ExternalSensorDescription,
    pub device_info: DeviceInfo,
}

impl ExternalSensorEntity {
    fn new(
        data: &CombinedModels,
        device_unique_id: &str,
        description: &'static ExternalSensorDescription,
    ) -> Self {
        Self {
            unique_id: format!("{DOMAIN}_{device_unique_id}"),
            device_unique_id: device_unique_id.to_owned(),
            description,
            device_info: external_device_info(
                &data.device,
                device_unique_id,
                description.device_type,
            ),
        }
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.description.device_type, self.device_unique_id)
    }

    /// The sub-meter in the current snapshot, if it still reports.
    fn device<'a>(&self, update: &'a CoordinatorUpdate) -> Option<&'a ExternalDevice> {
        update
            .data
            .as_deref()
            .and_then(|d| d.measurement.external_devices.as_ref())
            .and_then(|devices| devices.get(&self.device_unique_id))
    }

    pub fn native_value(&self, update: &CoordinatorUpdate) -> Option<SensorValue> {
        self.device(update)
            .and_then(|device| device.value)
            .map(SensorValue::Float)
    }

    pub fn native_unit(&self, update: &CoordinatorUpdate) -> Option<String> {
        self.device(update)
            .and_then(|device| device.unit.as_deref())
            .map(normalize_unit)
    }

    /// `None` when the reported unit does not fit the suggested class.
    pub fn device_class(&self, update: &CoordinatorUpdate) -> Option<DeviceClass> {
        let class = self.description.suggested_device_class;
        self.native_unit(update)
            .filter(|unit| class.units().contains(&unit.as_str()))
            .map(|_| class)
    }

    pub fn available(&self, update: &CoordinatorUpdate) -> bool {
        update.last_update_success && self.native_value(update).is_some()
    }
}

/// All entities created for one entry.
#[derive(Debug, Clone, Default)]
pub struct Entities {
    pub sensors: Vec<SensorEntity>,
    pub external: Vec<ExternalSensorEntity>,
}

/// Flattened view of one entity's current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub unique_id: String,
    pub key: String,
    pub value: Option<SensorValue>,
    pub unit: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub available: bool,
    pub enabled_by_default: bool,
}

impl Entities {
    pub fn len(&self) -> usize {
        self.sensors.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sensor(&self, key: &str) -> Option<&SensorEntity> {
        self.sensors.iter().find(|s| s.key() == key)
    }

    /// Current state of every entity, measurement sensors first.
    pub fn readings(&self, update: &CoordinatorUpdate) -> Vec<SensorReading> {
        let sensors = self.sensors.iter().map(|s| SensorReading {
            unique_id: s.unique_id.clone(),
            key: s.key().to_owned(),
            value: s.native_value(update),
            unit: s.native_unit().map(str::to_owned),
            device_class: s.device_class(),
            available: s.available(update),
            enabled_by_default: s.enabled_by_default,
        });
        let external = self.external.iter().map(|s| SensorReading {
            unique_id: s.unique_id.clone(),
            key: s.key(),
            value: s.native_value(update),
            unit: s.native_unit(update),
            device_class: s.device_class(update),
            available: s.available(update),
            enabled_by_default: true,
        });
        sensors.chain(external).collect()
    }
}

/// Create the entities an entry gets for its first snapshot.
///
/// Only sensors the snapshot supports are created, plus one per
/// sub-meter whose type is known.
pub fn build_entities(entry: &ConfigEntry, data: &CombinedModels) -> Entities {
    let meter = device_info(data);
    let prefix = entry.entity_prefix();

    let sensors = SENSORS
        .iter()
        .filter(|d| d.exists_for(data))
        .map(|description| SensorEntity {
            unique_id: format!("{prefix}_{}", description.key),
            description,
            enabled_by_default: description.enabled_for(data),
            device_info: meter.clone(),
        })
        .collect();

    let external = data
        .measurement
        .external_devices
        .iter()
        .flatten()
        .filter_map(|(unique_id, device)| {
            let description = external_description(device.device_type?)?;
            Some(ExternalSensorEntity::new(data, unique_id, description))
        })
        .collect();

    Entities { sensors, external }
}
