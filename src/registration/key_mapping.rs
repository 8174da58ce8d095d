use crate::domain::{DeviceRecord, LoRaWanVersionInfo};
use tracing::trace;

/// How the two key slots of the network server are used for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// LoRaWAN 1.0.x: the network key slot carries the single OTAA root key, the application key slot stays empty.
    SingleRootKey,
    /// LoRaWAN 1.1.x: network and application root keys are written to their own slots.
    SeparateRootKeys,
}

impl KeyLayout {
    /// Unknown versions fall back to the join mode of the device.
    pub fn for_device(version: Option<&LoRaWanVersionInfo>, is_otaa: bool) -> Self {
        match version {
            Some(info) if info.is_1_0_x => KeyLayout::SingleRootKey,
            Some(info) if info.is_1_1_x => KeyLayout::SeparateRootKeys,
            _ if is_otaa => KeyLayout::SingleRootKey,
            _ => KeyLayout::SeparateRootKeys,
        }
    }
}

/// Key slot values as they are sent to the network server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedKeys {
    pub nwk_key: String,
    pub app_key: String,
}

pub fn map_keys(record: &DeviceRecord) -> MappedKeys {
    let layout = KeyLayout::for_device(record.lorawan_version.as_deref(), record.is_otaa);
    trace!(dev_eui = record.dev_eui, layout = ?layout, "Mapping keys");

    match layout {
        KeyLayout::SingleRootKey => {
            // A key taken from the OTAA keys column already is the root key
            let root_key = if record.root_key_from_otaa_column || record.app_key().is_empty() {
                &record.nwk_key
            } else {
                record.app_key()
            };
            MappedKeys {
                nwk_key: root_key.to_string(),
                app_key: String::new(),
            }
        }
        KeyLayout::SeparateRootKeys => MappedKeys {
            nwk_key: record.nwk_key.clone(),
            app_key: record.app_key().to_string(),
        },
    }
}
