use crate::domain::MacVersionField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// API: https://www.chirpstack.io/docs/chirpstack/api/api.html#api-Device
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub dev_eui: String,
    pub name: String,
    pub description: String,
    pub application_id: String,
    pub device_profile_id: String,
    pub is_disabled: bool,
    pub skip_fcnt_check: bool,
    pub tags: HashMap<String, String>,
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKeys {
    pub dev_eui: String,
    /// Network root key slot. For LoRaWAN 1.0.x devices this slot carries the OTAA root key.
    pub nwk_key: String,
    pub app_key: String,
}

/// Fields to change on an existing device. Tags and variables are merged into the remote maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
    pub variables: HashMap<String, String>,
}

impl DeviceUpdate {
    pub fn apply_to(&self, device: &mut Device) {
        if let Some(name) = &self.name {
            device.name = name.clone();
        }
        if let Some(description) = &self.description {
            device.description = description.clone();
        }
        device.tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        device.variables.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListDevicesQuery {
    pub application_id: String,
    pub limit: u32,
    pub offset: u32,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceList {
    #[serde(default)]
    pub total_count: u32,
    #[serde(default, rename(deserialize = "result"))]
    pub devices: Vec<DeviceListItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceListItem {
    pub dev_eui: String,
    pub name: String,
    pub description: String,
    pub device_profile_id: String,
    pub device_profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mac_version: MacVersionField,
    #[serde(default)]
    pub supports_otaa: bool,
}
