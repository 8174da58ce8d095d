use crate::app_config::{MissingSetting, ServerConfig};
use crate::chirpstack::{ClientError, ClientFactory, DeviceClient};
use crate::domain::{BatchResult, DeviceRecord, DeviceResult, DuplicatePolicy, ProgressEvent, RegistrationOutcome};
use crate::registration::aggregator::Aggregator;
use crate::registration::pipeline;
use crate::registration::version_resolver;
use crate::registration::worker_pool::{self, Job, dial, pool_size};
use crate::validation;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{info, instrument, warn};

const DUPLICATE_IN_BATCH: &str = "Duplicate DevEUI in batch";

/// A batch of devices to register with the options that apply to all of them.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub records: Vec<DeviceRecord>,
    pub policy: DuplicatePolicy,
    /// Added to every device, overriding record tags with the same key.
    pub custom_tags: HashMap<String, String>,
    pub concurrency_hint: Option<usize>,
}

/// Registration session against one ChirpStack server.
pub struct Registrar {
    config: ServerConfig,
    factory: Arc<dyn ClientFactory>,
    max_workers: usize,
}

impl Registrar {
    pub fn new(config: ServerConfig, factory: Arc<dyn ClientFactory>, max_workers: usize) -> Self {
        Registrar {
            config,
            factory,
            max_workers,
        }
    }

    /// Returns a connected client, failing for incomplete settings or an unreachable server.
    pub async fn connect(&self) -> Result<Box<dyn DeviceClient>, RegistrationError> {
        self.config.validate()?;

        let mut client = self.factory.create();
        match dial(&mut *client, &self.config).await {
            Ok(message) => {
                info!("🔌 {}", message);
                Ok(client)
            }
            Err(error) => {
                client.close().await;
                Err(RegistrationError::Connection(error))
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.config.url()))]
    pub async fn check_connection(&self) -> Result<String, RegistrationError> {
        self.config.validate()?;

        let mut client = self.factory.create();
        let result = client.connect().await;
        client.close().await;
        Ok(result?)
    }

    /// Registers all records concurrently and returns once every record has an outcome.
    ///
    /// Fails without touching any device if the settings are incomplete or the server cannot be reached. Any other
    /// problem ends up in the outcome of the affected device.
    #[instrument(skip_all, fields(devices = request.records.len(), policy = %request.policy))]
    pub async fn register_batch(&self, request: BatchRequest, tx: Sender<ProgressEvent>) -> Result<BatchResult, RegistrationError> {
        let BatchRequest {
            mut records,
            policy,
            custom_tags,
            concurrency_hint,
        } = request;

        info!("🚀 Starting registration...");
        let mut probe = self.connect().await?;
        let mut result = BatchResult::new(records.len());

        if let Some(first) = records.first() {
            match version_resolver::resolve(&*probe, &first.device_profile_id, self.config.tenant_id()).await {
                Ok(version) => {
                    if !version.is_known() {
                        let warning = format!("Unknown LoRaWAN version for {}, keys are mapped by join mode", version);
                        warn!("⚠️ {}", warning);
                        result.warnings.push(warning);
                    }
                    let version = Arc::new(version);
                    for record in records.iter_mut() {
                        record.lorawan_version = Some(version.clone());
                    }
                    result.lorawan_version = Some(version.as_ref().clone());
                }
                Err(error) => {
                    let warning = format!("LoRaWAN version could not be determined, keys are mapped by join mode: {}", error);
                    warn!("⚠️ {}", warning);
                    result.warnings.push(warning);
                }
            }
        }
        probe.close().await;

        let job = Arc::new(RegisterJob { policy, custom_tags });
        let (records, duplicates) = split_duplicates(records, |record| record.dev_eui.as_str());
        let workers = pool_size(records.len(), concurrency_hint, self.max_workers);
        info!(workers, "🚀 Registering {} devices...", records.len());

        let aggregator = Arc::new(Aggregator::new(result, tx));
        aggregator.start().await;
        record_duplicates(job.as_ref(), duplicates, &aggregator).await;

        worker_pool::run(job, records, workers, self.factory.clone(), &self.config, aggregator.clone()).await;

        Ok(aggregator.finish().await)
    }

    /// Deletes all devices concurrently, reporting progress like a registration.
    #[instrument(skip_all, fields(devices = dev_euis.len()))]
    pub async fn delete_batch(
        &self,
        dev_euis: Vec<String>,
        concurrency_hint: Option<usize>,
        tx: Sender<ProgressEvent>,
    ) -> Result<BatchResult, RegistrationError> {
        info!("🗑️ Starting deletion...");
        self.connect().await?.close().await;

        let aggregator = Arc::new(Aggregator::new(BatchResult::new(dev_euis.len()), tx));
        let (dev_euis, duplicates) = split_duplicates(dev_euis, |dev_eui| dev_eui.as_str());
        let workers = pool_size(dev_euis.len(), concurrency_hint, self.max_workers);
        aggregator.start().await;
        record_duplicates(&DeleteJob, duplicates, &aggregator).await;

        worker_pool::run(Arc::new(DeleteJob), dev_euis, workers, self.factory.clone(), &self.config, aggregator.clone()).await;

        Ok(aggregator.finish().await)
    }
}

/// Keeps the first item per DevEUI. Later items with the same DevEUI would race it on the server.
fn split_duplicates<T>(items: Vec<T>, dev_eui: impl Fn(&T) -> &str) -> (Vec<T>, Vec<T>) {
    let mut seen = HashSet::new();
    items.into_iter().partition(|item| {
        let raw = dev_eui(item);
        seen.insert(validation::validate_dev_eui(raw).unwrap_or_else(|_| raw.trim().to_ascii_uppercase()))
    })
}

async fn record_duplicates<J: Job>(job: &J, duplicates: Vec<J::Item>, aggregator: &Aggregator) {
    for item in duplicates {
        let (dev_eui, name) = job.identify(&item);
        warn!(dev_eui = dev_eui.as_str(), "⚠️ {}", DUPLICATE_IN_BATCH);
        aggregator
            .record(DeviceResult::new(dev_eui, name, RegistrationOutcome::Failed(DUPLICATE_IN_BATCH.to_string())))
            .await;
    }
}

struct RegisterJob {
    policy: DuplicatePolicy,
    custom_tags: HashMap<String, String>,
}

#[async_trait]
impl Job for RegisterJob {
    type Item = DeviceRecord;

    fn identify(&self, record: &DeviceRecord) -> (String, String) {
        (record.dev_eui.clone(), record.name.clone())
    }

    async fn run(&self, client: &dyn DeviceClient, record: &DeviceRecord) -> RegistrationOutcome {
        pipeline::register_device(client, record, self.policy, &self.custom_tags).await
    }
}

struct DeleteJob;

#[async_trait]
impl Job for DeleteJob {
    type Item = String;

    fn identify(&self, dev_eui: &String) -> (String, String) {
        (dev_eui.clone(), dev_eui.clone())
    }

    async fn run(&self, client: &dyn DeviceClient, dev_eui: &String) -> RegistrationOutcome {
        pipeline::delete_device(client, dev_eui).await
    }
}

/// Errors that prevent a batch from starting. Failures of single devices are outcomes instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error(transparent)]
    Configuration(#[from] MissingSetting),
    #[error("Connection failed: {0}")]
    Connection(#[from] ClientError),
}
