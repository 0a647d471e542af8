//! Stream-status sink contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// Failure to reach the status sink. Non-fatal: the controller logs it
/// and continues; it never blocks teardown.
#[derive(Debug, Clone, Error)]
#[error("Status sink unreachable: {0}")]
pub struct StatusSinkError(pub String);

/// Published lifecycle status of an event's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Broadcast is live.
    Live,

    /// Broadcast has ended.
    Ended,
}

/// External persistence collaborator that records whether an event is
/// currently live. Fire-and-forget from the controller's perspective.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Record the stream status for an event, with the viewer count
    /// when going live.
    async fn update_status(
        &self,
        event_id: &str,
        status: StreamStatus,
        viewer_count: Option<u32>,
    ) -> Result<(), StatusSinkError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate<'a> {
    event_id: &'a str,
    status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewer_count: Option<u32>,
}

/// Status sink posting JSON updates to an HTTP endpoint.
pub struct HttpStatusSink {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpStatusSink {
    /// Build a sink for the given endpoint.
    pub fn new(endpoint: &str) -> Result<Self, StatusSinkError> {
        let endpoint = Url::parse(endpoint).map_err(|e| StatusSinkError(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl StatusSink for HttpStatusSink {
    #[instrument(name = "update_status", skip(self))]
    async fn update_status(
        &self,
        event_id: &str,
        status: StreamStatus,
        viewer_count: Option<u32>,
    ) -> Result<(), StatusSinkError> {
        let update = StatusUpdate {
            event_id,
            status,
            viewer_count,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&update)
            .send()
            .await
            .map_err(|e| StatusSinkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StatusSinkError(format!(
                "sink returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
