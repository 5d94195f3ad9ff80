// hwinstant-api: Async Rust client for the HomeWizard Energy local API (v1)

pub mod error;
pub mod transport;
pub mod v1;

pub use error::Error;
pub use transport::TransportConfig;
pub use v1::HomeWizardClient;
pub use v1::models::{
    CombinedModels, Device, ExternalDevice, ExternalDeviceType, Measurement, ProductType, System,
    parse_meter_timestamp,
};
