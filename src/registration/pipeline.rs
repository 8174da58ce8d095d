use crate::chirpstack::DeviceClient;
use crate::chirpstack::types::{Device, DeviceKeys};
use crate::domain::{DeviceRecord, DuplicatePolicy, RegistrationOutcome};
use crate::registration::key_mapping::map_keys;
use crate::validation::{self, ValidationError};
use State::*;
use Step::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

const ALREADY_EXISTS: &str = "Gerät existiert bereits";

/// Registers one device. Every failure ends up in the returned outcome, nothing is retried.
#[instrument(skip_all, fields(dev_eui = record.dev_eui.as_str(), policy = %policy))]
pub async fn register_device(
    client: &dyn DeviceClient,
    record: &DeviceRecord,
    policy: DuplicatePolicy,
    custom_tags: &HashMap<String, String>,
) -> RegistrationOutcome {
    let mut state = Validate;
    loop {
        debug!("Entering {}", state.name());
        state = match execute_state(state, client, record, policy, custom_tags).await {
            Next(state) => state,
            End(outcome) => {
                match &outcome {
                    RegistrationOutcome::Success => info!("✅ Registered device '{}'", record.name),
                    RegistrationOutcome::SuccessWithWarning(reason) => warn!("⚠️ Registered device '{}' with warning: {}", record.name, reason),
                    RegistrationOutcome::Skipped(reason) => info!("⏭️ Skipped device '{}': {}", record.name, reason),
                    RegistrationOutcome::Failed(reason) => warn!("❌ Failed to register device '{}': {}", record.name, reason),
                }
                return outcome;
            }
        }
    }
}

async fn execute_state(
    state: State,
    client: &dyn DeviceClient,
    record: &DeviceRecord,
    policy: DuplicatePolicy,
    custom_tags: &HashMap<String, String>,
) -> Step {
    match state {
        Validate => match validate(record, custom_tags) {
            Ok(device) => Next(CheckExists(device)),
            Err(error) => End(RegistrationOutcome::Failed(error.to_string())),
        },
        CheckExists(device) => match client.device_exists(&device.device.dev_eui).await {
            Ok(false) => Next(CreateDevice(device)),
            Ok(true) => match policy {
                DuplicatePolicy::Skip => End(RegistrationOutcome::Skipped(ALREADY_EXISTS.to_string())),
                DuplicatePolicy::Replace => Next(DeleteExisting(device)),
            },
            Err(error) => End(RegistrationOutcome::Failed(error.to_string())),
        },
        DeleteExisting(device) => match client.delete_device(&device.device.dev_eui).await {
            Ok(()) => {
                debug!("Deleted existing device");
                Next(CreateDevice(device))
            }
            Err(error) => End(RegistrationOutcome::Failed(format!("Fehler beim Löschen: {}", error))),
        },
        CreateDevice(device) => match client.create_device(&device.device).await {
            Ok(()) => Next(SetKeys(device.keys)),
            Err(error) => End(RegistrationOutcome::Failed(error.to_string())),
        },
        SetKeys(keys) => match client.create_device_keys(&keys).await {
            Ok(()) => End(RegistrationOutcome::Success),
            // The device stays registered, only its keys have to be set again
            Err(error) => End(RegistrationOutcome::SuccessWithWarning(format!("Device created but keys not set: {}", error))),
        },
    }
}

/// Deletes one device, a missing device counts as a failure.
#[instrument(skip(client))]
pub async fn delete_device(client: &dyn DeviceClient, dev_eui: &str) -> RegistrationOutcome {
    let dev_eui = match validation::validate_dev_eui(dev_eui) {
        Ok(dev_eui) => dev_eui,
        Err(error) => return RegistrationOutcome::Failed(error.to_string()),
    };

    match client.delete_device(&dev_eui).await {
        Ok(()) => {
            info!("🗑️ Deleted device {}", dev_eui);
            RegistrationOutcome::Success
        }
        Err(error) => {
            warn!("❌ Failed to delete device {}: {}", dev_eui, error);
            RegistrationOutcome::Failed(error.to_string())
        }
    }
}

/// Cleans the record and maps its keys before any remote call is made.
fn validate(record: &DeviceRecord, custom_tags: &HashMap<String, String>) -> Result<ValidatedDevice, ValidationError> {
    let dev_eui = validation::validate_dev_eui(&record.dev_eui)?;
    let application_id = validation::validate_uuid(&record.application_id, "Application ID")?;
    let device_profile_id = validation::validate_uuid(&record.device_profile_id, "Device Profile ID")?;

    let mapped = map_keys(record);
    let nwk_key = validation::validate_key(&mapped.nwk_key, "Network key")?;
    let app_key = if mapped.app_key.trim().is_empty() {
        String::new()
    } else {
        validation::validate_key(&mapped.app_key, "Application key")?
    };

    let mut tags = record.tags.clone();
    tags.extend(custom_tags.iter().map(|(key, value)| (key.clone(), value.clone())));

    Ok(ValidatedDevice {
        device: Device {
            dev_eui: dev_eui.clone(),
            name: record.name.clone(),
            description: record.description().to_string(),
            application_id: application_id.to_string(),
            device_profile_id: device_profile_id.to_string(),
            tags,
            ..Device::default()
        },
        keys: DeviceKeys { dev_eui, nwk_key, app_key },
    })
}

#[derive(Debug)]
struct ValidatedDevice {
    device: Device,
    keys: DeviceKeys,
}

#[derive(Debug)]
enum State {
    Validate,
    CheckExists(ValidatedDevice),
    DeleteExisting(ValidatedDevice),
    CreateDevice(ValidatedDevice),
    SetKeys(DeviceKeys),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Validate => "validate",
            CheckExists(_) => "check exists",
            DeleteExisting(_) => "delete existing",
            CreateDevice(_) => "create device",
            SetKeys(_) => "set keys",
        }
    }
}

enum Step {
    Next(State),
    End(RegistrationOutcome),
}
