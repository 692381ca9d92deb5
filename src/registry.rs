//! SkyDNS registry client.
//!
//! A thin façade over the registry's HTTP API, keyed by the 12-character
//! container UUID. The registry composes discoverable DNS names out of the
//! record's name, image, environment, and its own configured domain; this
//! side only maintains the records.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::BridgeError;
use crate::types::ServiceRecord;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Write access to the service registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Register `record` under `uuid`.
    ///
    /// Returns [`BridgeError::ConflictingUuid`] when the registry already
    /// holds that key; callers reset the TTL instead of failing.
    async fn add(&self, uuid: &str, record: &ServiceRecord) -> Result<(), BridgeError>;

    /// Reset the TTL of the record under `uuid`.
    async fn update(&self, uuid: &str, ttl: u32) -> Result<(), BridgeError>;

    /// Remove the record under `uuid`.
    async fn delete(&self, uuid: &str) -> Result<(), BridgeError>;
}

/// Registry client over the SkyDNS HTTP API.
pub struct SkydnsClient {
    client: Client,
    base_url: String,
    secret: String,
}

impl SkydnsClient {
    /// Create a client for the registry at `base_url`. A non-empty `secret`
    /// is forwarded as a bearer token on every request.
    pub fn new(base_url: &str, secret: &str) -> Result<Self, BridgeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    /// Probe the registry. Any HTTP response counts as reachable; only a
    /// transport failure is an error. Used at bootstrap to fail fast.
    pub async fn ping(&self) -> Result<(), BridgeError> {
        let url = format!("{}/skydns/services/", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        debug!(status = %response.status(), "registry probe");
        Ok(())
    }

    fn service_url(&self, uuid: &str) -> String {
        format!("{}/skydns/services/{uuid}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.secret.is_empty() {
            request
        } else {
            request.bearer_auth(&self.secret)
        }
    }
}

/// Map a non-success response to [`BridgeError::Status`].
async fn check(response: Response) -> Result<(), BridgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(BridgeError::Status { status, body })
}

#[async_trait]
impl Registry for SkydnsClient {
    async fn add(&self, uuid: &str, record: &ServiceRecord) -> Result<(), BridgeError> {
        let request = self.client.post(self.service_url(uuid)).json(record);
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(BridgeError::ConflictingUuid(uuid.to_string()));
        }
        check(response).await
    }

    async fn update(&self, uuid: &str, ttl: u32) -> Result<(), BridgeError> {
        let request = self
            .client
            .patch(self.service_url(uuid))
            .json(&json!({ "TTL": ttl }));
        let response = self.authorized(request).send().await?;
        check(response).await
    }

    async fn delete(&self, uuid: &str) -> Result<(), BridgeError> {
        let request = self.client.delete(self.service_url(uuid));
        let response = self.authorized(request).send().await?;
        check(response).await
    }
}
