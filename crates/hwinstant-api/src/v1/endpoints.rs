// Local API v1 endpoints
//
// Identity (`/api`), measurement (`/api/v1/data`), system status
// (`/api/v1/system`), and the combined poll used by the coordinator.

use tracing::debug;

use crate::error::Error;
use crate::v1::client::HomeWizardClient;
use crate::v1::models::{CombinedModels, DataV1, Device, Measurement, System, SystemV1};

const SUPPORTED_API_VERSION: &str = "v1";

impl HomeWizardClient {
    /// Get the device identity.
    ///
    /// `GET /api`
    ///
    /// Fails with [`Error::UnsupportedApiVersion`] when the device
    /// reports anything other than `v1`.
    pub async fn device(&self) -> Result<Device, Error> {
        let device: Device = self.get("api").await?;
        if device.api_version != SUPPORTED_API_VERSION {
            return Err(Error::UnsupportedApiVersion {
                found: device.api_version,
            });
        }
        Ok(device)
    }

    /// Get the latest measurement.
    ///
    /// `GET /api/v1/data`
    pub async fn measurement(&self) -> Result<Measurement, Error> {
        let data: DataV1 = self.get("api/v1/data").await?;
        Ok(Measurement::from(data))
    }

    /// System status (cloud connection).
    ///
    /// `GET /api/v1/system`
    ///
    /// Older firmware has no such endpoint and answers 404, reported
    /// here as `Ok(None)`.
    pub async fn system(&self) -> Result<Option<System>, Error> {
        match self.get::<SystemV1>("api/v1/system").await {
            Ok(status) => Ok(Some(System {
                cloud_enabled: status.cloud_enabled,
                ..System::default()
            })),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Identity, measurement, and system status in one call.
    ///
    /// This is what the coordinator polls every tick. A missing
    /// `/api/v1/system` endpoint is not an error: the system block is
    /// built from whatever the measurement carried.
    pub async fn combined(&self) -> Result<CombinedModels, Error> {
        let device = self.device().await?;

        let (data_res, system_res) =
            tokio::join!(self.get::<DataV1>("api/v1/data"), self.system());

        let data = data_res?;
        let mut system = data.system_fields();
        match system_res? {
            Some(status) => system.cloud_enabled = status.cloud_enabled,
            None => debug!("system endpoint not available on this firmware"),
        }

        Ok(CombinedModels {
            device,
            measurement: Measurement::from(data),
            system: (!system.is_empty()).then_some(system),
        })
    }
}
