use crate::chirpstack::{ClientError, DeviceClient};
use crate::domain::LoRaWanVersionInfo;
use thiserror::Error;
use tracing::{info, instrument};

/// Looks up the LoRaWAN version announced by a device profile of the tenant.
#[instrument(skip(client))]
pub async fn resolve(client: &dyn DeviceClient, profile_id: &str, tenant_id: &str) -> Result<LoRaWanVersionInfo, ResolveError> {
    info!("🔎 Resolving LoRaWAN version...");
    let profile_id = profile_id.trim();
    let profile = client
        .device_profiles(tenant_id)
        .await?
        .into_iter()
        .find(|profile| profile.id.eq_ignore_ascii_case(profile_id))
        .ok_or_else(|| ResolveError::ProfileNotFound(profile_id.to_string()))?;

    let info = LoRaWanVersionInfo::new(profile.mac_version.0, profile.name, profile.supports_otaa);
    info!("🔎 Resolving LoRaWAN version... OK, {}", info);
    Ok(info)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("device profile '{0}' was not found for the tenant")]
    ProfileNotFound(String),
    #[error("device profiles could not be fetched: {0}")]
    Client(#[from] ClientError),
}
