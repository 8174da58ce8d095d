use crate::app_config::ServerConfig;
use crate::chirpstack::{ClientError, ClientFactory, DeviceClient};
use crate::domain::{DeviceResult, RegistrationOutcome};
use crate::registration::aggregator::Aggregator;
use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, instrument, warn};

const DEVICES_PER_WORKER: usize = 20;

/// Work that is applied to every item of a batch by the worker pool.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// DevEUI and name under which the item's result is reported.
    fn identify(&self, item: &Self::Item) -> (String, String);

    async fn run(&self, client: &dyn DeviceClient, item: &Self::Item) -> RegistrationOutcome;
}

/// Number of workers for a batch: the hint if given, otherwise one worker per 20 devices.
pub fn pool_size(total: usize, hint: Option<usize>, max_workers: usize) -> usize {
    let requested = hint.unwrap_or_else(|| (total / DEVICES_PER_WORKER).max(1));
    requested.clamp(1, max_workers.max(1)).min(total)
}

/// Connects a client, dialing again with exponential backoff while the server is unreachable.
pub async fn dial(client: &mut dyn DeviceClient, config: &ServerConfig) -> Result<String, ClientError> {
    let mut delays = ExponentialBackoff::from_millis(config.retry_ms())
        .factor(2)
        .max_delay(config.retry_max_delay())
        .map(jitter)
        .take(config.connect_attempts() - 1);

    loop {
        match client.connect().await {
            Ok(message) => return Ok(message),
            Err(error) if error.is_retryable() => match delays.next() {
                Some(delay) => {
                    warn!("⚠️ Connecting to ChirpStack failed: {}. Retrying in {:?}...", error, delay);
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error),
            },
            Err(error) => return Err(error),
        }
    }
}

/// Runs `job` over all items with `workers` concurrent workers, each owning its own client.
///
/// Returns once every item has been recorded. Items no worker could take because none of them connected are recorded
/// as failed with the connection error.
#[instrument(skip_all, fields(items = items.len(), workers = workers))]
pub async fn run<J: Job>(
    job: Arc<J>,
    items: Vec<J::Item>,
    workers: usize,
    factory: Arc<dyn ClientFactory>,
    config: &ServerConfig,
    aggregator: Arc<Aggregator>,
) {
    let queue = Arc::new(Mutex::new(VecDeque::from(items)));

    let mut handles = (0..workers)
        .map(|worker| {
            let job = job.clone();
            let queue = queue.clone();
            let client = factory.create();
            let config = config.clone();
            let aggregator = aggregator.clone();
            tokio::spawn(async move { run_worker(worker, job, queue, client, config, aggregator).await })
        })
        .collect::<FuturesUnordered<_>>();

    let mut dial_error = None;
    while let Some(joined) = handles.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => dial_error = Some(error),
            Err(join_error) => error!("❌ Worker terminated unexpectedly: {}", join_error),
        }
    }

    let leftovers = queue.lock().await.drain(..).collect::<Vec<_>>();
    if !leftovers.is_empty() {
        let cause = dial_error.map_or_else(|| "no worker could connect".to_string(), |error| error.to_string());
        warn!("⚠️ {} items were not processed: {}", leftovers.len(), cause);

        for item in leftovers {
            let (dev_eui, name) = job.identify(&item);
            let outcome = RegistrationOutcome::Failed(format!("Connection failed: {}", cause));
            aggregator.record(DeviceResult::new(dev_eui, name, outcome)).await;
        }
    }
}

#[instrument(skip(job, queue, client, config, aggregator))]
async fn run_worker<J: Job>(
    worker: usize,
    job: Arc<J>,
    queue: Arc<Mutex<VecDeque<J::Item>>>,
    mut client: Box<dyn DeviceClient>,
    config: ServerConfig,
    aggregator: Arc<Aggregator>,
) -> Result<(), ClientError> {
    if let Err(error) = dial(&mut *client, &config).await {
        warn!("⚠️ Worker could not connect: {}", error);
        client.close().await;
        return Err(error);
    }
    debug!("Worker connected");

    let mut processed = 0;
    loop {
        let item = queue.lock().await.pop_front();
        let Some(item) = item else { break };

        let outcome = AssertUnwindSafe(job.run(&*client, &item))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| RegistrationOutcome::Failed(panic_message(&*panic)));

        let (dev_eui, name) = job.identify(&item);
        aggregator.record(DeviceResult::new(dev_eui, name, outcome)).await;
        processed += 1;
    }

    client.close().await;
    info!("Worker finished, {} items processed", processed);
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "device pipeline panicked".to_string()
    }
}
