use crate::domain::LoRaWanVersionInfo;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Terminal state of one device's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Success,
    /// The device exists on the network server but a later step (setting keys) failed.
    SuccessWithWarning(String),
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Success,
    Warning,
    Failed,
    Skipped,
}

const PROGRESS_MESSAGE_LENGTH: usize = 50;

impl RegistrationOutcome {
    pub fn kind(&self) -> ResultKind {
        match self {
            RegistrationOutcome::Success => ResultKind::Success,
            RegistrationOutcome::SuccessWithWarning(_) => ResultKind::Warning,
            RegistrationOutcome::Failed(_) => ResultKind::Failed,
            RegistrationOutcome::Skipped(_) => ResultKind::Skipped,
        }
    }

    /// Whether the outcome is reported in the `successful` bucket.
    pub fn is_successful(&self) -> bool {
        match self {
            RegistrationOutcome::Success | RegistrationOutcome::SuccessWithWarning(_) => true,
            RegistrationOutcome::Failed(_) | RegistrationOutcome::Skipped(_) => false,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RegistrationOutcome::Success => None,
            RegistrationOutcome::SuccessWithWarning(reason) | RegistrationOutcome::Failed(reason) | RegistrationOutcome::Skipped(reason) => {
                Some(reason)
            }
        }
    }

    /// Short message shown next to the device in the progress stream.
    pub fn progress_message(&self) -> String {
        match self {
            RegistrationOutcome::Success => "Erfolgreich".to_string(),
            RegistrationOutcome::SuccessWithWarning(_) => "Keys nicht gesetzt".to_string(),
            RegistrationOutcome::Skipped(_) => "Bereits vorhanden".to_string(),
            RegistrationOutcome::Failed(reason) => reason.chars().take(PROGRESS_MESSAGE_LENGTH).collect(),
        }
    }
}

/// The outcome of one device, keyed by its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResult {
    pub dev_eui: String,
    pub name: String,
    pub outcome: RegistrationOutcome,
}

impl DeviceResult {
    pub fn new(dev_eui: impl Into<String>, name: impl Into<String>, outcome: RegistrationOutcome) -> Self {
        DeviceResult {
            dev_eui: dev_eui.into(),
            name: name.into(),
            outcome,
        }
    }
}

// Successful entries carry an optional `warning`, failed entries an `error`, which is what report consumers expect.
impl Serialize for DeviceResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let reason_field = match &self.outcome {
            RegistrationOutcome::Success => None,
            RegistrationOutcome::SuccessWithWarning(reason) => Some(("warning", reason)),
            RegistrationOutcome::Failed(reason) | RegistrationOutcome::Skipped(reason) => Some(("error", reason)),
        };

        let mut state = serializer.serialize_struct("DeviceResult", 3 + usize::from(reason_field.is_some()))?;
        state.serialize_field("dev_eui", &self.dev_eui)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("result", &self.outcome.kind())?;
        match reason_field {
            Some(("warning", reason)) => state.serialize_field("warning", reason)?,
            Some((_, reason)) => state.serialize_field("error", reason)?,
            None => {}
        }
        state.end()
    }
}

/// Aggregated outcome of a batch. Grows while workers finish, frozen once the batch completes.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: Vec<DeviceResult>,
    pub failed: Vec<DeviceResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lorawan_version: Option<LoRaWanVersionInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BatchResult {
    pub fn new(total: usize) -> Self {
        BatchResult {
            total,
            successful: Vec::new(),
            failed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            lorawan_version: None,
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, result: DeviceResult) {
        if result.outcome.is_successful() {
            self.successful.push(result);
        } else {
            self.failed.push(result);
        }
    }

    pub fn completed(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn count(&self, kind: ResultKind) -> usize {
        self.successful.iter().chain(self.failed.iter()).filter(|result| result.outcome.kind() == kind).count()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
