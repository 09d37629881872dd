// backend/mod.rs
mod mock;
mod vendor;

pub use mock::{MockBackend, MockFixtures};
pub use vendor::{ResultCallback, VendorBackend, VendorError, VendorSdk};

use crate::{
    error::BackendError,
    models::{ControlCommand, Credentials, DeviceDescriptor, DeviceStatus},
};

/// A device-management implementation the bridge forwards to.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn initialize(&self, credentials: &Credentials) -> Result<(), BackendError>;
    async fn start_discovery(&self) -> Result<(), BackendError>;
    async fn stop_discovery(&self) -> Result<(), BackendError>;
    async fn discovered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError>;
    async fn add_device(
        &self,
        device_id: &str,
        ssid: &str,
        password: &str,
    ) -> Result<(), BackendError>;
    async fn registered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError>;
    async fn send_command(
        &self,
        device_id: &str,
        command: &ControlCommand,
    ) -> Result<(), BackendError>;
    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, BackendError>;
}
