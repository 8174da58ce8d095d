use crate::domain::DuplicatePolicy;
use crate::normalizer::ColumnMapping;
use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    chirpstack: ServerConfig,
    import: Import,
}

impl AppConfig {
    pub fn load(name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name(name).required(true))
            .add_source(config::File::with_name(&format!("{}_local", name)).required(false))
            .add_source(config::Environment::with_prefix("CHIRP").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn chirpstack(&self) -> &ServerConfig {
        &self.chirpstack
    }

    pub fn import(&self) -> &Import {
        &self.import
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    #[serde(default = "default_log_level")]
    log_level: String,
    progress_buffer_size: usize,
    max_workers: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Core {
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn progress_buffer_size(&self) -> usize {
        self.progress_buffer_size.max(1)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

/// Connection settings of one ChirpStack server, scoped to the session that registers against it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    url: String,
    #[serde(default)]
    api_token: String,
    #[serde(default)]
    tenant_id: String,
    #[serde(with = "humantime_serde")]
    connect_timeout: Duration,
    retry_ms: u64,
    retry_max_delay_ms: u64,
    connect_attempts: usize,
}

impl ServerConfig {
    /// The server URL with a scheme and without trailing slashes.
    pub fn url(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }

    pub fn api_token(&self) -> &str {
        self.api_token.trim()
    }

    pub fn tenant_id(&self) -> &str {
        self.tenant_id.trim()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn retry_ms(&self) -> u64 {
        self.retry_ms
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.max(1)
    }

    /// Fails on the first setting a batch cannot start without.
    pub fn validate(&self) -> Result<(), MissingSetting> {
        if self.url.trim().is_empty() {
            return Err(MissingSetting("server URL"));
        }
        if self.api_token().is_empty() {
            return Err(MissingSetting("API token"));
        }
        if self.tenant_id().is_empty() {
            return Err(MissingSetting("tenant ID"));
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("server configuration incomplete: {0} is missing")]
pub struct MissingSetting(pub &'static str);

#[derive(Debug, Deserialize)]
pub struct Import {
    #[serde(default)]
    duplicate_policy: DuplicatePolicy,
    report_directory: String,
    #[serde(default)]
    default_application_id: Option<String>,
    #[serde(default)]
    default_device_profile_id: Option<String>,
    #[serde(default)]
    mapping: ColumnMapping,
    #[serde(default)]
    custom_tags: HashMap<String, String>,
}

impl Import {
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub fn report_directory(&self) -> &str {
        &self.report_directory
    }

    pub fn default_application_id(&self) -> Option<&str> {
        self.default_application_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn default_device_profile_id(&self) -> Option<&str> {
        self.default_device_profile_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn custom_tags(&self) -> &HashMap<String, String> {
        &self.custom_tags
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core {
                    log_level: "debug".to_string(),
                    progress_buffer_size: 16,
                    max_workers: 10,
                },
                chirpstack: ServerConfig {
                    url: "http://chirpstack.local:8090".to_string(),
                    api_token: "token".to_string(),
                    tenant_id: "52f14cd4-c6f1-4fbd-8f87-4025e1d49242".to_string(),
                    connect_timeout: Duration::from_secs(3),
                    retry_ms: 1,
                    retry_max_delay_ms: 5,
                    connect_attempts: 2,
                },
                import: Import {
                    duplicate_policy: DuplicatePolicy::Skip,
                    report_directory: "reports".to_string(),
                    default_application_id: None,
                    default_device_profile_id: None,
                    mapping: ColumnMapping::default(),
                    custom_tags: HashMap::new(),
                },
            },
        }
    }

    pub fn url(mut self, url: String) -> Self {
        self.config.chirpstack.url = url;
        self
    }

    pub fn api_token(mut self, api_token: &str) -> Self {
        self.config.chirpstack.api_token = api_token.to_string();
        self
    }

    pub fn tenant_id(mut self, tenant_id: &str) -> Self {
        self.config.chirpstack.tenant_id = tenant_id.to_string();
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.core.max_workers = max_workers;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
