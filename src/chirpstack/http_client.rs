use crate::app_config::ServerConfig;
use crate::chirpstack::ClientError;
use crate::chirpstack::client::{ClientFactory, DeviceClient};
use crate::chirpstack::types::{Device, DeviceKeys, DeviceList, DeviceProfile, DeviceUpdate, ListDevicesQuery};
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

// A DevEUI that is never registered, used to probe connectivity and authentication
const PROBE_DEV_EUI: &str = "0000000000000000";
const PROFILE_PAGE_SIZE: u32 = 100;

/// ChirpStack client speaking to the REST gateway of the device management API.
#[derive(Debug)]
pub struct ChirpStackClient {
    config: ServerConfig,
    client: Option<Client>,
}

impl ChirpStackClient {
    pub fn new(config: ServerConfig) -> Self {
        info!(
            url = %config.url(),
            api_token_length = config.api_token().len(),
            "ChirpStack client initialized"
        );
        ChirpStackClient { config, client: None }
    }

    fn client(&self) -> Result<&Client, ClientError> {
        self.client.as_ref().ok_or(ClientError::NotConnected)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url(), path)
    }
}

pub fn new_client(config: &ServerConfig) -> Result<Client, ClientError> {
    let mut headers = header::HeaderMap::new();
    let mut authorization_value = HeaderValue::from_str(&format!("Bearer {}", config.api_token()))?;
    authorization_value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, authorization_value);

    let client = Client::builder().default_headers(headers).build()?;
    Ok(client)
}

#[async_trait]
impl DeviceClient for ChirpStackClient {
    #[instrument(skip_all, fields(url = %self.config.url()))]
    async fn connect(&mut self) -> Result<String, ClientError> {
        let client = new_client(&self.config)?;

        let probe = client
            .get(self.url(&format!("/api/devices/{}", PROBE_DEV_EUI)))
            .timeout(self.config.connect_timeout())
            .send()
            .await?;

        let status = probe.status();
        let message = match status {
            s if s.is_success() => "Connected successfully".to_string(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => "Connected successfully (server is reachable and authenticated)".to_string(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ClientError::from_status(status, String::new())),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                return Err(error_for_response(probe).await);
            }
            _ => format!("Connected (server responded with: {})", status),
        };

        debug!(status = %status, "{}", message);
        self.client = Some(client);
        Ok(message)
    }

    #[instrument(skip(self))]
    async fn get_device(&self, dev_eui: &str) -> Result<Option<Device>, ClientError> {
        let response = self.client()?.get(self.url(&format!("/api/devices/{}", dev_eui))).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check(response).await?;
        let device_response = response.json::<DeviceBody>().await?;
        Ok(Some(device_response.device))
    }

    #[instrument(skip_all, fields(dev_eui = device.dev_eui.as_str()))]
    async fn create_device(&self, device: &Device) -> Result<(), ClientError> {
        let response = self.client()?.post(self.url("/api/devices")).json(&DeviceBodyRef { device }).send().await?;

        check(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(dev_eui = keys.dev_eui.as_str()))]
    async fn create_device_keys(&self, keys: &DeviceKeys) -> Result<(), ClientError> {
        let response = self
            .client()?
            .post(self.url(&format!("/api/devices/{}/keys", keys.dev_eui)))
            .json(&DeviceKeysBody { device_keys: keys })
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_device(&self, dev_eui: &str) -> Result<(), ClientError> {
        let response = self.client()?.delete(self.url(&format!("/api/devices/{}", dev_eui))).send().await?;

        match check(response).await {
            Err(ClientError::NotFound(_)) => Err(ClientError::NotFound(format!("Device {} not found (may already be deleted)", dev_eui))),
            result => result.map(|_| ()),
        }
    }

    #[instrument(skip(self))]
    async fn list_devices(&self, query: &ListDevicesQuery) -> Result<DeviceList, ClientError> {
        let mut params = vec![("limit", query.limit.to_string()), ("offset", query.offset.to_string())];
        if !query.application_id.is_empty() {
            params.push(("applicationId", query.application_id.clone()));
        }
        if let Some(search) = query.search.as_ref().filter(|search| !search.is_empty()) {
            params.push(("search", search.clone()));
        }

        let response = self.client()?.get(self.url("/api/devices")).query(&params).send().await?;

        let device_list = check(response).await?.json::<DeviceList>().await?;
        info!("Retrieving devices... OK, {} of {} returned", device_list.devices.len(), device_list.total_count);
        Ok(device_list)
    }

    #[instrument(skip(self, update))]
    async fn update_device(&self, dev_eui: &str, update: &DeviceUpdate) -> Result<(), ClientError> {
        let mut device = self
            .get_device(dev_eui)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("Device {} not found in ChirpStack", dev_eui)))?;

        update.apply_to(&mut device);

        let response = self
            .client()?
            .put(self.url(&format!("/api/devices/{}", dev_eui)))
            .json(&DeviceBodyRef { device: &device })
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn device_profiles(&self, tenant_id: &str) -> Result<Vec<DeviceProfile>, ClientError> {
        info!("Retrieving device profiles...");

        let mut profiles = Vec::new();
        loop {
            let offset = profiles.len().to_string();
            let response = self
                .client()?
                .get(self.url("/api/device-profiles"))
                .query(&[("tenantId", tenant_id), ("limit", &PROFILE_PAGE_SIZE.to_string()), ("offset", &offset)])
                .send()
                .await?;

            let page = check(response).await?.json::<DeviceProfileList>().await?;
            let page_size = page.result.len();
            profiles.extend(page.result);

            if page_size == 0 || profiles.len() >= page.total_count as usize {
                break;
            }
        }

        info!("Retrieving device profiles... OK, {} found", profiles.len());
        Ok(profiles)
    }

    async fn close(&mut self) {
        self.client = None;
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_for_response(response).await)
    }
}

async fn error_for_response(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let details = serde_json::from_str::<ErrorBody>(&body).map(|error| error.message).unwrap_or(body);

    ClientError::from_status(status, details)
}

#[derive(Debug)]
pub struct HttpClientFactory {
    config: ServerConfig,
}

impl HttpClientFactory {
    pub fn new(config: ServerConfig) -> Self {
        HttpClientFactory { config }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self) -> Box<dyn DeviceClient> {
        Box::new(ChirpStackClient::new(self.config.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceBody {
    device: Device,
}

#[derive(Debug, Serialize)]
struct DeviceBodyRef<'a> {
    device: &'a Device,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceKeysBody<'a> {
    device_keys: &'a DeviceKeys,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceProfileList {
    #[serde(default)]
    total_count: u32,
    #[serde(default)]
    result: Vec<DeviceProfile>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfigBuilder;
    use crate::domain::MacVersion;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    const DEV_EUI: &str = "A84041F4935D6EEA";

    async fn connected_client(server: &mut Server) -> Result<ChirpStackClient, ClientError> {
        server
            .mock("GET", "/api/devices/0000000000000000")
            .with_status(404)
            .with_body(r#"{"code": 5, "message": "Object does not exist"}"#)
            .create_async()
            .await;

        let config = AppConfigBuilder::new().url(server.url()).build();
        let mut client = ChirpStackClient::new(config.chirpstack().clone());
        client.connect().await?;
        Ok(client)
    }

    #[tokio::test]
    async fn connect_sends_the_bearer_token_and_accepts_not_found() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/devices/0000000000000000")
            .match_header("authorization", "Bearer token")
            .with_status(404)
            .create_async()
            .await;

        let config = AppConfigBuilder::new().url(server.url()).build();
        let mut client = ChirpStackClient::new(config.chirpstack().clone());
        let message = client.connect().await?;

        mock.assert_async().await;
        assert_eq!(message, "Connected successfully (server is reachable and authenticated)");
        Ok(())
    }

    #[tokio::test]
    async fn connect_fails_for_an_invalid_token() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/api/devices/0000000000000000").with_status(401).create_async().await;

        let config = AppConfigBuilder::new().url(server.url()).build();
        let mut client = ChirpStackClient::new(config.chirpstack().clone());

        assert_eq!(client.connect().await, Err(ClientError::Unauthenticated));
        // Calls on a client that never connected fail instead of panicking
        assert_eq!(client.get_device(DEV_EUI).await, Err(ClientError::NotConnected));
        client.close().await;
    }

    #[tokio::test]
    async fn connect_fails_if_the_server_is_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/devices/0000000000000000")
            .with_status(503)
            .with_body(r#"{"message": "upstream connect error"}"#)
            .create_async()
            .await;

        let config = AppConfigBuilder::new().url(server.url()).build();
        let mut client = ChirpStackClient::new(config.chirpstack().clone());

        assert_eq!(client.connect().await, Err(ClientError::Unavailable("upstream connect error".to_string())));
    }

    #[tokio::test]
    async fn connect_accepts_other_responses_as_reachable() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        server.mock("GET", "/api/devices/0000000000000000").with_status(500).create_async().await;

        let config = AppConfigBuilder::new().url(server.url()).build();
        let mut client = ChirpStackClient::new(config.chirpstack().clone());

        assert_eq!(client.connect().await?, "Connected (server responded with: 500 Internal Server Error)");
        Ok(())
    }

    #[tokio::test]
    async fn get_device_maps_the_response() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let mut client = connected_client(&mut server).await?;
        server
            .mock("GET", "/api/devices/A84041F4935D6EEA")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(include_str!("../../tests/resources/chirpstack_device_response.json"))
            .create_async()
            .await;

        let device = client.get_device(DEV_EUI).await?.expect("expected a device");

        assert_eq!(device.dev_eui, "a84041f4935d6eea");
        assert_eq!(device.name, "Wasserzähler 1");
        assert_eq!(device.device_profile_id, "8ad02259-c996-43b0-b37b-8a8e813c360f");
        assert_eq!(device.tags.get("building").map(String::as_str), Some("B12"));
        client.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn device_exists_is_false_for_unknown_devices() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        server.mock("GET", "/api/devices/A84041F4935D6EEA").with_status(404).create_async().await;

        assert!(!client.device_exists(DEV_EUI).await?);
        Ok(())
    }

    #[tokio::test]
    async fn device_exists_propagates_transport_errors() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        server.mock("GET", "/api/devices/A84041F4935D6EEA").with_status(403).create_async().await;

        assert_eq!(client.device_exists(DEV_EUI).await, Err(ClientError::PermissionDenied));
        Ok(())
    }

    #[tokio::test]
    async fn create_device_posts_the_device() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        let mock = server
            .mock("POST", "/api/devices")
            .match_body(Matcher::PartialJson(json!({
                "device": {
                    "devEui": DEV_EUI,
                    "name": "Meter",
                    "applicationId": "0b6d8b63-7b7e-4a4a-9d52-0a3a1b2c3d4e",
                    "deviceProfileId": "8ad02259-c996-43b0-b37b-8a8e813c360f",
                    "tags": {"building": "B12"}
                }
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let device = Device {
            dev_eui: DEV_EUI.to_string(),
            name: "Meter".to_string(),
            application_id: "0b6d8b63-7b7e-4a4a-9d52-0a3a1b2c3d4e".to_string(),
            device_profile_id: "8ad02259-c996-43b0-b37b-8a8e813c360f".to_string(),
            tags: HashMap::from([("building".to_string(), "B12".to_string())]),
            ..Device::default()
        };
        client.create_device(&device).await?;

        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn create_device_maps_conflicts_to_already_exists() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        server
            .mock("POST", "/api/devices")
            .with_status(409)
            .with_body(r#"{"code": 6, "message": "Object already exists"}"#)
            .create_async()
            .await;

        let result = client.create_device(&Device::default()).await;

        assert_eq!(result, Err(ClientError::AlreadyExists));
        Ok(())
    }

    #[tokio::test]
    async fn create_device_keys_writes_the_slots_unchanged() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        let mock = server
            .mock("POST", "/api/devices/A84041F4935D6EEA/keys")
            .match_body(Matcher::Json(json!({
                "deviceKeys": {"devEui": DEV_EUI, "nwkKey": "D60F739062E3B90BBBAE3B26C4308FAE", "appKey": ""}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let keys = DeviceKeys {
            dev_eui: DEV_EUI.to_string(),
            nwk_key: "D60F739062E3B90BBBAE3B26C4308FAE".to_string(),
            app_key: String::new(),
        };
        client.create_device_keys(&keys).await?;

        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn delete_device_reports_missing_devices() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        server.mock("DELETE", "/api/devices/A84041F4935D6EEA").with_status(404).create_async().await;

        let result = client.delete_device(DEV_EUI).await;

        assert_eq!(
            result,
            Err(ClientError::NotFound("Device A84041F4935D6EEA not found (may already be deleted)".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_devices_passes_the_filters() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        let mock = server
            .mock("GET", "/api/devices")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("offset".into(), "20".into()),
                Matcher::UrlEncoded("applicationId".into(), "0b6d8b63-7b7e-4a4a-9d52-0a3a1b2c3d4e".into()),
                Matcher::UrlEncoded("search".into(), "meter".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(include_str!("../../tests/resources/chirpstack_device_list_response.json"))
            .create_async()
            .await;

        let query = ListDevicesQuery {
            application_id: "0b6d8b63-7b7e-4a4a-9d52-0a3a1b2c3d4e".to_string(),
            limit: 10,
            offset: 20,
            search: Some("meter".to_string()),
        };
        let device_list = client.list_devices(&query).await?;

        mock.assert_async().await;
        assert_eq!(device_list.total_count, 42);
        assert_eq!(device_list.devices.len(), 2);
        assert_eq!(device_list.devices[1].device_profile_name, "Water meter 1.0.3");
        Ok(())
    }

    #[tokio::test]
    async fn update_device_merges_tags_with_the_remote_ones() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        server
            .mock("GET", "/api/devices/A84041F4935D6EEA")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/chirpstack_device_response.json"))
            .create_async()
            .await;
        let mock = server
            .mock("PUT", "/api/devices/A84041F4935D6EEA")
            .match_body(Matcher::PartialJson(json!({
                "device": {"name": "Wasserzähler 1", "tags": {"building": "B12", "floor": "3"}}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let update = DeviceUpdate {
            tags: HashMap::from([("floor".to_string(), "3".to_string())]),
            ..DeviceUpdate::default()
        };
        client.update_device(DEV_EUI, &update).await?;

        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn device_profiles_are_fetched_page_by_page() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let client = connected_client(&mut server).await?;
        let first_page = server
            .mock("GET", "/api/device-profiles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("tenantId".into(), "tenant".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(include_str!("../../tests/resources/chirpstack_device_profiles_response.json"))
            .create_async()
            .await;
        let second_page = server
            .mock("GET", "/api/device-profiles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("tenantId".into(), "tenant".into()),
                Matcher::UrlEncoded("offset".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"totalCount": 3, "result": [{"id": "c1b0d8f6-0c49-4d4f-9d27-6a1f6f1f4b11", "name": "Legacy", "macVersion": 9}]}"#)
            .create_async()
            .await;

        let profiles = client.device_profiles("tenant").await?;

        first_page.assert_async().await;
        second_page.assert_async().await;
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].mac_version.0, Some(MacVersion::new(1, 0, 3)));
        assert!(profiles[0].supports_otaa);
        assert_eq!(profiles[1].mac_version.0, Some(MacVersion::new(1, 1, 0)));
        assert_eq!(profiles[2].mac_version.0, None);
        Ok(())
    }

    #[tokio::test]
    async fn factory_creates_unconnected_clients() {
        let config = AppConfigBuilder::new().build();
        let factory = HttpClientFactory::new(config.chirpstack().clone());

        let client = factory.create();

        assert_eq!(client.device_exists(DEV_EUI).await, Err(ClientError::NotConnected));
    }
}
