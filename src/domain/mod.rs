mod device_record;
mod duplicate_policy;
mod lorawan_version;
mod outcome;
mod progress;

#[cfg(test)]
pub use device_record::DeviceRecordBuilder;
pub use device_record::DeviceRecord;
pub use duplicate_policy::DuplicatePolicy;
pub use lorawan_version::{LoRaWanVersionInfo, MacVersion, MacVersionField};
pub use outcome::{BatchResult, DeviceResult, RegistrationOutcome, ResultKind};
pub use progress::ProgressEvent;
