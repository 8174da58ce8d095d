use crate::domain::{BatchResult, DeviceResult, ResultKind};
use serde::Serialize;

/// Progress of a running batch, emitted in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressEvent {
    Starting {
        current: usize,
        total: usize,
    },
    Processing {
        current: usize,
        total: usize,
        device: String,
        dev_eui: String,
        result: ResultKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Complete {
        current: usize,
        total: usize,
        successful: usize,
        failed: usize,
    },
}

impl ProgressEvent {
    pub fn starting(total: usize) -> Self {
        ProgressEvent::Starting { current: 0, total }
    }

    pub fn processing(current: usize, total: usize, result: &DeviceResult) -> Self {
        ProgressEvent::Processing {
            current,
            total,
            device: result.name.clone(),
            dev_eui: result.dev_eui.clone(),
            result: result.outcome.kind(),
            message: Some(result.outcome.progress_message()),
        }
    }

    pub fn complete(result: &BatchResult) -> Self {
        ProgressEvent::Complete {
            current: result.completed(),
            total: result.total,
            successful: result.successful.len(),
            failed: result.failed.len(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ProgressEvent::Starting { .. } => "starting",
            ProgressEvent::Processing { .. } => "processing",
            ProgressEvent::Complete { .. } => "complete",
        }
    }
}
