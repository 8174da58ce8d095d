use crate::chirpstack::ClientError;
use crate::chirpstack::types::{Device, DeviceKeys, DeviceList, DeviceProfile, DeviceUpdate, ListDevicesQuery};
use async_trait::async_trait;

/// Device management operations of the network server.
///
/// A client is owned by exactly one worker. `connect` has to succeed before any other call, `close` may be called at
/// any time, including after a failed `connect`.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Establishes the transport and probes the server. The message describes how the server responded.
    async fn connect(&mut self) -> Result<String, ClientError>;

    /// Returns `None` if the device does not exist.
    async fn get_device(&self, dev_eui: &str) -> Result<Option<Device>, ClientError>;

    async fn device_exists(&self, dev_eui: &str) -> Result<bool, ClientError> {
        Ok(self.get_device(dev_eui).await?.is_some())
    }

    async fn create_device(&self, device: &Device) -> Result<(), ClientError>;

    /// Writes the keys as given, any version specific mapping is up to the caller.
    async fn create_device_keys(&self, keys: &DeviceKeys) -> Result<(), ClientError>;

    async fn delete_device(&self, dev_eui: &str) -> Result<(), ClientError>;

    async fn list_devices(&self, query: &ListDevicesQuery) -> Result<DeviceList, ClientError>;

    async fn update_device(&self, dev_eui: &str, update: &DeviceUpdate) -> Result<(), ClientError>;

    async fn device_profiles(&self, tenant_id: &str) -> Result<Vec<DeviceProfile>, ClientError>;

    async fn close(&mut self);
}

/// Creates a fresh, unconnected client for every worker.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> Box<dyn DeviceClient>;
}
