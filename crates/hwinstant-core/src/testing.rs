// Scripted device clients and fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hwinstant_api::{
    CombinedModels, Device, Error as ApiError, ExternalDevice, ExternalDeviceType, Measurement,
    System,
};

use crate::client::{ClientFactory, DeviceApi};

// ── Fixtures ────────────────────────────────────────────────────────

pub(crate) fn p1_device() -> Device {
    Device {
        product_type: "HWE-P1".into(),
        product_name: "P1 meter".into(),
        serial: Some("5c2fafabcdef".into()),
        firmware_version: "4.19".into(),
        api_version: "v1".into(),
    }
}

pub(crate) fn p1_combined() -> CombinedModels {
    let mut external = BTreeMap::new();
    external.insert(
        "G001".to_owned(),
        ExternalDevice {
            device_type: Some(ExternalDeviceType::GasMeter),
            unit: Some("m3".into()),
            value: Some(111.111),
            timestamp: None,
        },
    );

    CombinedModels {
        device: p1_device(),
        measurement: Measurement {
            protocol_version: Some(50),
            meter_model: Some("ISKRA  2M550T-101".into()),
            unique_id: Some("00112233445566778899AABBCCDDEEFF".into()),
            tariff: Some(2),
            energy_import_kwh: Some(13779.338),
            energy_import_t1_kwh: Some(10830.511),
            energy_import_t2_kwh: Some(2948.827),
            energy_export_kwh: Some(0.0),
            energy_export_t1_kwh: Some(0.0),
            energy_export_t2_kwh: Some(12.5),
            power_w: Some(-543.0),
            power_l1_w: Some(-676.0),
            power_l2_w: Some(133.0),
            voltage_l1_v: Some(230.111),
            current_l1_a: Some(-4.0),
            frequency_hz: Some(50.0),
            power_factor: Some(0.61),
            any_power_fail_count: Some(4),
            long_power_fail_count: Some(5),
            average_power_15m_w: Some(123.0),
            monthly_power_peak_w: Some(1111.0),
            gas_unique_id: Some("01FFEEDDCCBBAA99887766554433221100".into()),
            external_devices: Some(external),
            ..Measurement::default()
        },
        system: Some(System {
            wifi_ssid: Some("My Wi-Fi".into()),
            wifi_strength_pct: Some(100),
            ..System::default()
        }),
    }
}

// ── Scripted client ─────────────────────────────────────────────────

/// One scripted answer.
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Disabled,
    Network,
    UnsupportedApi,
    Garbage,
}

impl<T: Clone> Reply<T> {
    fn resolve(&self) -> Result<T, ApiError> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::Disabled => Err(ApiError::Disabled),
            Self::Network => Err(ApiError::Request {
                message: "HTTP 503 Service Unavailable".into(),
            }),
            Self::UnsupportedApi => Err(ApiError::UnsupportedApiVersion { found: "v2".into() }),
            Self::Garbage => Err(ApiError::Deserialization {
                message: "expected value at line 1 column 1".into(),
                body: "<html>".into(),
            }),
        }
    }
}

/// Shared script consumed by every client a factory hands out.
///
/// `combined` replies are popped in order; the last one repeats once the
/// queue is down to a single reply.
#[derive(Debug)]
pub(crate) struct Script {
    device: Mutex<Reply<Device>>,
    combined: Mutex<VecDeque<Reply<CombinedModels>>>,
    delay: Mutex<Option<Duration>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub combined_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Script {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            device: Mutex::new(Reply::Ok(p1_device())),
            combined: Mutex::new(VecDeque::from([Reply::Ok(p1_combined())])),
            delay: Mutex::new(None),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            combined_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_device(&self, reply: Reply<Device>) {
        *self.device.lock().unwrap() = reply;
    }

    pub(crate) fn set_combined(&self, replies: Vec<Reply<CombinedModels>>) {
        *self.combined.lock().unwrap() = replies.into();
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn next_combined(&self) -> Reply<CombinedModels> {
        let mut queue = self.combined.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Reply::Network)
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedClient {
    script: Arc<Script>,
}

impl ScriptedClient {
    pub(crate) fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }
}

impl DeviceApi for ScriptedClient {
    async fn device(&self) -> Result<Device, ApiError> {
        let reply = self.script.device.lock().unwrap().clone();
        reply.resolve()
    }

    async fn combined(&self) -> Result<CombinedModels, ApiError> {
        let script = &self.script;
        script.combined_calls.fetch_add(1, Ordering::SeqCst);
        let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *script.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        script.in_flight.fetch_sub(1, Ordering::SeqCst);
        script.next_combined().resolve()
    }

    fn close(&self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedFactory {
    pub script: Arc<Script>,
}

impl ScriptedFactory {
    pub(crate) fn new() -> Self {
        Self {
            script: Script::new(),
        }
    }
}

impl ClientFactory for ScriptedFactory {
    type Client = ScriptedClient;

    fn connect(&self, _ip_address: &str) -> Result<ScriptedClient, ApiError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedClient::new(&self.script))
    }
}
