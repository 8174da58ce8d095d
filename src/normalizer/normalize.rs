use crate::domain::DeviceRecord;
use crate::extensions::value_ext::CellText;
use crate::normalizer::{ColumnMapping, NormalizeError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

pub type Row = Map<String, Value>;

const OTAA: &str = "OTAA";

/// Fallbacks for fields that are not part of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Defaults<'a> {
    pub application_id: Option<&'a str>,
    pub device_profile_id: Option<&'a str>,
}

#[instrument(skip_all, fields(rows = rows.len()))]
pub fn normalize(rows: &[Row], mapping: &ColumnMapping, defaults: &Defaults) -> Result<Vec<DeviceRecord>, NormalizeError> {
    let dev_eui_column = mapping.dev_eui().ok_or(NormalizeError::MissingMapping("dev_eui"))?;
    let name_column = mapping.name().ok_or(NormalizeError::MissingMapping("name"))?;
    let nwk_key_column = mapping.nwk_key().ok_or(NormalizeError::MissingMapping("nwk_key"))?;
    if mapping.application_id().is_none() && defaults.application_id.is_none() {
        return Err(NormalizeError::MissingMapping("application_id"));
    }
    if mapping.device_profile_id().is_none() && defaults.device_profile_id.is_none() {
        return Err(NormalizeError::MissingMapping("device_profile_id"));
    }

    if !rows.is_empty() {
        if let Some(column) = mapping.mapped_columns().find(|column| !rows.iter().any(|row| row.contains_key(*column))) {
            return Err(NormalizeError::MissingColumn(column.to_string()));
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let dev_eui = row.get(dev_eui_column).cell_text();
        if dev_eui.is_empty() {
            debug!(row = index + 1, "Skipping row without DevEUI");
            continue;
        }

        let is_otaa = row.get(mapping.join_mode()).cell_text().to_ascii_uppercase() == OTAA;
        let otaa_key = if is_otaa { row.get(mapping.otaa_keys()).cell_text() } else { String::new() };
        let root_key_from_otaa_column = !otaa_key.is_empty();
        let nwk_key = if root_key_from_otaa_column {
            otaa_key
        } else {
            row.get(nwk_key_column).cell_text()
        };

        records.push(DeviceRecord {
            dev_eui,
            name: row.get(name_column).cell_text(),
            application_id: field_or_default(row, mapping.application_id(), defaults.application_id),
            device_profile_id: field_or_default(row, mapping.device_profile_id(), defaults.device_profile_id),
            nwk_key,
            app_key: optional_field(row, mapping.app_key()),
            description: optional_field(row, mapping.description()),
            is_otaa,
            root_key_from_otaa_column,
            tags: tags(row, mapping),
            lorawan_version: None,
        });
    }

    info!("Normalizing rows... OK, {} devices from {} rows", records.len(), rows.len());
    Ok(records)
}

fn field_or_default(row: &Row, column: Option<&str>, default: Option<&str>) -> String {
    column
        .map(|column| row.get(column).cell_text())
        .filter(|value| !value.is_empty())
        .or_else(|| default.map(str::to_string))
        .unwrap_or_default()
}

fn optional_field(row: &Row, column: Option<&str>) -> Option<String> {
    column.map(|column| row.get(column).cell_text()).filter(|value| !value.is_empty())
}

fn tags(row: &Row, mapping: &ColumnMapping) -> HashMap<String, String> {
    mapping
        .tag_columns()
        .filter_map(|column| {
            let value = row.get(column).cell_text();
            (!value.is_empty()).then(|| (column.to_string(), value))
        })
        .collect()
}
