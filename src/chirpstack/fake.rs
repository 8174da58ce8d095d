use crate::chirpstack::ClientError;
use crate::chirpstack::client::{ClientFactory, DeviceClient};
use crate::chirpstack::types::{Device, DeviceKeys, DeviceList, DeviceListItem, DeviceProfile, DeviceUpdate, ListDevicesQuery};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// In-memory network server shared by all clients of a test.
#[derive(Debug, Default)]
pub struct FakeBackend {
    devices: Mutex<HashMap<String, Device>>,
    keys: Mutex<HashMap<String, DeviceKeys>>,
    profiles: Vec<DeviceProfile>,
    max_delay_ms: u64,
    device_delays: HashMap<String, u64>,
    connect_error: Option<ClientError>,
    connect_failures: AtomicUsize,
    connection_limit: Option<usize>,
    profiles_error: Option<ClientError>,
    exists_failures: HashSet<String>,
    create_failures: HashMap<String, ClientError>,
    keys_failures: HashSet<String>,
    delete_failures: HashSet<String>,
    panics: HashSet<String>,
    pub calls: Calls,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub clients: AtomicUsize,
    pub connect: AtomicUsize,
    pub close: AtomicUsize,
    pub get_device: AtomicUsize,
    pub create_device: AtomicUsize,
    pub create_device_keys: AtomicUsize,
    pub delete_device: AtomicUsize,
    pub update_device: AtomicUsize,
    pub device_profiles: AtomicUsize,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend::default()
    }

    pub fn with_device(self, device: Device) -> Self {
        lock(&self.devices).insert(device.dev_eui.clone(), device);
        self
    }

    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Every call sleeps for a random duration up to `max_delay_ms`.
    pub fn with_random_delays(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Looking up `dev_eui` takes an extra `delay_ms`.
    pub fn delaying(mut self, dev_eui: &str, delay_ms: u64) -> Self {
        self.device_delays.insert(dev_eui.to_string(), delay_ms);
        self
    }

    pub fn rejecting_connect(mut self, error: ClientError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// The first `failures` connects fail as unavailable, later ones succeed.
    pub fn failing_connects(self, failures: usize) -> Self {
        self.connect_failures.store(failures, Ordering::SeqCst);
        self
    }

    /// Connects after the first `successes` fail as unavailable.
    pub fn dropping_connections_after(mut self, successes: usize) -> Self {
        self.connection_limit = Some(successes);
        self
    }

    pub fn failing_profiles(mut self, error: ClientError) -> Self {
        self.profiles_error = Some(error);
        self
    }

    pub fn failing_exists(mut self, dev_eui: &str) -> Self {
        self.exists_failures.insert(dev_eui.to_string());
        self
    }

    pub fn failing_create(mut self, dev_eui: &str, error: ClientError) -> Self {
        self.create_failures.insert(dev_eui.to_string(), error);
        self
    }

    pub fn failing_keys(mut self, dev_eui: &str) -> Self {
        self.keys_failures.insert(dev_eui.to_string());
        self
    }

    pub fn failing_delete(mut self, dev_eui: &str) -> Self {
        self.delete_failures.insert(dev_eui.to_string());
        self
    }

    /// Creating the device panics inside the client.
    pub fn panicking_on(mut self, dev_eui: &str) -> Self {
        self.panics.insert(dev_eui.to_string());
        self
    }

    pub fn shared(self) -> Arc<FakeBackend> {
        Arc::new(self)
    }

    pub fn device(&self, dev_eui: &str) -> Option<Device> {
        lock(&self.devices).get(dev_eui).cloned()
    }

    pub fn device_count(&self) -> usize {
        lock(&self.devices).len()
    }

    pub fn keys(&self, dev_eui: &str) -> Option<DeviceKeys> {
        lock(&self.keys).get(dev_eui).cloned()
    }

    async fn delay(&self) {
        if self.max_delay_ms == 0 {
            return;
        }

        let millis = rand::thread_rng().gen_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    async fn delay_device(&self, dev_eui: &str) {
        if let Some(millis) = self.device_delays.get(dev_eui) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn count(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[derive(Debug)]
pub struct FakeClient {
    backend: Arc<FakeBackend>,
    connected: bool,
}

impl FakeClient {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        count(&backend.calls.clients);
        FakeClient { backend, connected: false }
    }

    fn ensure_connected(&self) -> Result<&FakeBackend, ClientError> {
        if self.connected {
            Ok(&self.backend)
        } else {
            Err(ClientError::NotConnected)
        }
    }
}

#[async_trait]
impl DeviceClient for FakeClient {
    async fn connect(&mut self) -> Result<String, ClientError> {
        let attempt = self.backend.calls.connect.fetch_add(1, Ordering::SeqCst) + 1;
        self.backend.delay().await;

        if self.backend.connection_limit.is_some_and(|limit| attempt > limit) {
            return Err(ClientError::Unavailable("connection refused".to_string()));
        }

        if let Some(error) = &self.backend.connect_error {
            return Err(error.clone());
        }
        let remaining = self
            .backend
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |failures| failures.checked_sub(1));
        if remaining.is_ok() {
            return Err(ClientError::Unavailable("connection refused".to_string()));
        }

        self.connected = true;
        Ok("Connected successfully".to_string())
    }

    async fn get_device(&self, dev_eui: &str) -> Result<Option<Device>, ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.get_device);
        backend.delay().await;
        backend.delay_device(dev_eui).await;

        if backend.exists_failures.contains(dev_eui) {
            return Err(ClientError::DeadlineExceeded);
        }
        Ok(backend.device(dev_eui))
    }

    async fn create_device(&self, device: &Device) -> Result<(), ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.create_device);
        backend.delay().await;

        if backend.panics.contains(&device.dev_eui) {
            panic!("simulated client crash for {}", device.dev_eui);
        }
        if let Some(error) = backend.create_failures.get(&device.dev_eui) {
            return Err(error.clone());
        }

        let mut devices = lock(&backend.devices);
        if devices.contains_key(&device.dev_eui) {
            return Err(ClientError::AlreadyExists);
        }
        devices.insert(device.dev_eui.clone(), device.clone());
        Ok(())
    }

    async fn create_device_keys(&self, keys: &DeviceKeys) -> Result<(), ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.create_device_keys);
        backend.delay().await;

        if backend.keys_failures.contains(&keys.dev_eui) {
            return Err(ClientError::InvalidArgument("invalid key".to_string()));
        }
        lock(&backend.keys).insert(keys.dev_eui.clone(), keys.clone());
        Ok(())
    }

    async fn delete_device(&self, dev_eui: &str) -> Result<(), ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.delete_device);
        backend.delay().await;

        if backend.delete_failures.contains(dev_eui) {
            return Err(ClientError::PermissionDenied);
        }
        lock(&backend.keys).remove(dev_eui);
        match lock(&backend.devices).remove(dev_eui) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound(format!("Device {} not found (may already be deleted)", dev_eui))),
        }
    }

    async fn list_devices(&self, query: &ListDevicesQuery) -> Result<DeviceList, ClientError> {
        let backend = self.ensure_connected()?;
        let devices = lock(&backend.devices);
        let mut matching = devices
            .values()
            .filter(|device| device.application_id == query.application_id)
            .filter(|device| query.search.as_ref().is_none_or(|search| device.name.contains(search.as_str())))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(DeviceList {
            total_count: matching.len() as u32,
            devices: matching
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .map(|device| DeviceListItem {
                    dev_eui: device.dev_eui.clone(),
                    name: device.name.clone(),
                    description: device.description.clone(),
                    device_profile_id: device.device_profile_id.clone(),
                    device_profile_name: String::new(),
                })
                .collect(),
        })
    }

    async fn update_device(&self, dev_eui: &str, update: &DeviceUpdate) -> Result<(), ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.update_device);

        let mut devices = lock(&backend.devices);
        let device = devices
            .get_mut(dev_eui)
            .ok_or_else(|| ClientError::NotFound(format!("Device {} not found in ChirpStack", dev_eui)))?;
        update.apply_to(device);
        Ok(())
    }

    async fn device_profiles(&self, _tenant_id: &str) -> Result<Vec<DeviceProfile>, ClientError> {
        let backend = self.ensure_connected()?;
        count(&backend.calls.device_profiles);

        match &backend.profiles_error {
            Some(error) => Err(error.clone()),
            None => Ok(backend.profiles.clone()),
        }
    }

    async fn close(&mut self) {
        count(&self.backend.calls.close);
        self.connected = false;
    }
}

#[derive(Debug)]
pub struct FakeClientFactory {
    backend: Arc<FakeBackend>,
}

impl FakeClientFactory {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        FakeClientFactory { backend }
    }
}

impl ClientFactory for FakeClientFactory {
    fn create(&self) -> Box<dyn DeviceClient> {
        Box::new(FakeClient::new(self.backend.clone()))
    }
}
