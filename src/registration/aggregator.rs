use crate::domain::{BatchResult, DeviceResult, ProgressEvent};
use tokio::sync::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

/// Collects device results of concurrent workers and reports progress in completion order.
#[derive(Debug)]
pub struct Aggregator {
    progress: Mutex<Progress>,
    tx: Sender<ProgressEvent>,
}

#[derive(Debug)]
struct Progress {
    current: usize,
    result: BatchResult,
}

impl Aggregator {
    pub fn new(result: BatchResult, tx: Sender<ProgressEvent>) -> Self {
        Aggregator {
            progress: Mutex::new(Progress { current: 0, result }),
            tx,
        }
    }

    pub async fn start(&self) {
        let progress = self.progress.lock().await;
        self.emit(ProgressEvent::starting(progress.result.total)).await;
    }

    /// Appends the result and emits its progress event while holding the lock, so events follow the counter.
    pub async fn record(&self, result: DeviceResult) -> usize {
        let mut progress = self.progress.lock().await;
        progress.current += 1;
        let current = progress.current;

        let event = ProgressEvent::processing(current, progress.result.total, &result);
        progress.result.push(result);
        self.emit(event).await;

        current
    }

    /// Freezes the batch result and emits the final event.
    pub async fn finish(&self) -> BatchResult {
        let mut progress = self.progress.lock().await;
        progress.result.finish();

        let result = progress.result.clone();
        self.emit(ProgressEvent::complete(&result)).await;
        info!(
            total = result.total,
            successful = result.successful.len(),
            failed = result.failed.len(),
            "🏁 Batch completed"
        );
        result
    }

    async fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Progress receiver is gone, dropping event");
        }
    }
}
