// ── Device client seam ──
//
// The coordinator, runtime and setup flow talk to devices through these
// traits so they can be driven by scripted clients in tests.

use std::future::Future;

use hwinstant_api::{CombinedModels, Device, Error as ApiError, HomeWizardClient, TransportConfig};

/// The operations the plugin needs from a device client.
pub trait DeviceApi: Send + Sync + 'static {
    /// Identity of the device (`GET /api`).
    fn device(&self) -> impl Future<Output = Result<Device, ApiError>> + Send;

    /// Identity, measurement and system status in one snapshot.
    fn combined(&self) -> impl Future<Output = Result<CombinedModels, ApiError>> + Send;

    /// Release the client's connections.
    fn close(&self);
}

impl DeviceApi for HomeWizardClient {
    fn device(&self) -> impl Future<Output = Result<Device, ApiError>> + Send {
        HomeWizardClient::device(self)
    }

    fn combined(&self) -> impl Future<Output = Result<CombinedModels, ApiError>> + Send {
        HomeWizardClient::combined(self)
    }

    fn close(&self) {
        HomeWizardClient::close(self);
    }
}

/// Creates a client for a device address.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: DeviceApi;

    fn connect(&self, ip_address: &str) -> Result<Self::Client, ApiError>;
}

/// Factory for real HTTP clients.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    transport: TransportConfig,
}

impl HttpClientFactory {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HomeWizardClient;

    fn connect(&self, ip_address: &str) -> Result<HomeWizardClient, ApiError> {
        HomeWizardClient::new(ip_address, &self.transport)
    }
}
