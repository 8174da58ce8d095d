use serde::Deserialize;

/// Names the input columns that hold each device field. An empty name leaves the field unmapped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    dev_eui: String,
    name: String,
    application_id: String,
    device_profile_id: String,
    nwk_key: String,
    app_key: String,
    description: String,
    join_mode: String,
    otaa_keys: String,
    tag_columns: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        ColumnMapping {
            dev_eui: "dev_eui".to_string(),
            name: "name".to_string(),
            application_id: "application_id".to_string(),
            device_profile_id: "device_profile_id".to_string(),
            nwk_key: "nwk_key".to_string(),
            app_key: "app_key".to_string(),
            description: "description".to_string(),
            join_mode: "lora_joinmode".to_string(),
            otaa_keys: "OTAA keys".to_string(),
            tag_columns: Vec::new(),
        }
    }
}

fn mapped(column: &str) -> Option<&str> {
    Some(column.trim()).filter(|column| !column.is_empty())
}

impl ColumnMapping {
    pub fn dev_eui(&self) -> Option<&str> {
        mapped(&self.dev_eui)
    }

    pub fn name(&self) -> Option<&str> {
        mapped(&self.name)
    }

    pub fn application_id(&self) -> Option<&str> {
        mapped(&self.application_id)
    }

    pub fn device_profile_id(&self) -> Option<&str> {
        mapped(&self.device_profile_id)
    }

    pub fn nwk_key(&self) -> Option<&str> {
        mapped(&self.nwk_key)
    }

    pub fn app_key(&self) -> Option<&str> {
        mapped(&self.app_key)
    }

    pub fn description(&self) -> Option<&str> {
        mapped(&self.description)
    }

    pub fn join_mode(&self) -> &str {
        self.join_mode.trim()
    }

    pub fn otaa_keys(&self) -> &str {
        self.otaa_keys.trim()
    }

    pub fn tag_columns(&self) -> impl Iterator<Item = &str> {
        self.tag_columns.iter().filter_map(|column| mapped(column))
    }

    /// Every mapped column, used to check that the input actually contains them.
    pub(super) fn mapped_columns(&self) -> impl Iterator<Item = &str> {
        [
            self.dev_eui(),
            self.name(),
            self.application_id(),
            self.device_profile_id(),
            self.nwk_key(),
            self.app_key(),
            self.description(),
        ]
        .into_iter()
        .flatten()
        .chain(self.tag_columns())
    }
}

#[cfg(test)]
pub struct ColumnMappingBuilder {
    mapping: ColumnMapping,
}

#[cfg(test)]
impl ColumnMappingBuilder {
    pub fn new() -> Self {
        ColumnMappingBuilder {
            mapping: ColumnMapping::default(),
        }
    }

    pub fn application_id(mut self, column: &str) -> Self {
        self.mapping.application_id = column.to_string();
        self
    }

    pub fn device_profile_id(mut self, column: &str) -> Self {
        self.mapping.device_profile_id = column.to_string();
        self
    }

    pub fn nwk_key(mut self, column: &str) -> Self {
        self.mapping.nwk_key = column.to_string();
        self
    }

    pub fn tag_columns(mut self, columns: &[&str]) -> Self {
        self.mapping.tag_columns = columns.iter().map(|column| column.to_string()).collect();
        self
    }

    pub fn build(self) -> ColumnMapping {
        self.mapping
    }
}
