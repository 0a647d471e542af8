//! Reachability probes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// How long one probe may run. Kept below the probe interval so an
/// unresponsive endpoint does not stack outstanding probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks whether an ingestion endpoint is reachable.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Returns true if the endpoint answered.
    async fn check(&self, endpoint: &str) -> bool;
}

/// Probe issuing an HTTP GET against the endpoint.
pub struct HttpEndpointProbe {
    client: reqwest::Client,
}

impl HttpEndpointProbe {
    /// Build a probe with the default timeout.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpEndpointProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    async fn check(&self, endpoint: &str) -> bool {
        match self.client.get(endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(endpoint, "Probe failed: {e}");
                false
            }
        }
    }
}
