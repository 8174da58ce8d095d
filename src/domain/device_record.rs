use crate::domain::LoRaWanVersionInfo;
use std::collections::HashMap;
use std::sync::Arc;

/// One device to register, as produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceRecord {
    pub dev_eui: String,
    pub name: String,
    pub application_id: String,
    pub device_profile_id: String,
    pub nwk_key: String,
    pub app_key: Option<String>,
    pub description: Option<String>,
    pub is_otaa: bool,
    /// Set when `nwk_key` was taken from the dedicated OTAA keys column instead of the mapped network key column.
    pub root_key_from_otaa_column: bool,
    pub tags: HashMap<String, String>,
    /// Resolved once per batch and shared by every record of that batch.
    pub lorawan_version: Option<Arc<LoRaWanVersionInfo>>,
}

impl DeviceRecord {
    pub fn app_key(&self) -> &str {
        self.app_key.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
pub struct DeviceRecordBuilder {
    record: DeviceRecord,
}

#[cfg(test)]
impl DeviceRecordBuilder {
    pub fn new(dev_eui: &str) -> Self {
        DeviceRecordBuilder {
            record: DeviceRecord {
                dev_eui: dev_eui.to_string(),
                name: format!("device-{}", dev_eui.to_lowercase()),
                application_id: "0b6d8b63-7b7e-4a4a-9d52-0a3a1b2c3d4e".to_string(),
                device_profile_id: "8ad02259-c996-43b0-b37b-8a8e813c360f".to_string(),
                nwk_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
                app_key: Some("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".to_string()),
                ..DeviceRecord::default()
            },
        }
    }

    pub fn application_id(mut self, application_id: &str) -> Self {
        self.record.application_id = application_id.to_string();
        self
    }

    pub fn device_profile_id(mut self, device_profile_id: &str) -> Self {
        self.record.device_profile_id = device_profile_id.to_string();
        self
    }

    pub fn keys(mut self, nwk_key: &str, app_key: Option<&str>) -> Self {
        self.record.nwk_key = nwk_key.to_string();
        self.record.app_key = app_key.map(str::to_string);
        self
    }

    pub fn otaa(mut self, is_otaa: bool) -> Self {
        self.record.is_otaa = is_otaa;
        self
    }

    pub fn root_key_from_otaa_column(mut self) -> Self {
        self.record.root_key_from_otaa_column = true;
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.record.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn lorawan_version(mut self, info: LoRaWanVersionInfo) -> Self {
        self.record.lorawan_version = Some(Arc::new(info));
        self
    }

    pub fn build(self) -> DeviceRecord {
        self.record
    }
}
