use crate::health::HealthEvent;
use crate::traits::sink::{HealthSink, SinkError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Health sink that POSTs each event as JSON to a configured endpoint.
///
/// Transport failures and non-success responses both surface as SinkError,
/// which the reporting phase records and retries; they never stop
/// collection.
pub struct HttpHealthSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpHealthSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl HealthSink for HttpHealthSink {
    async fn publish(&self, event: &HealthEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|err| {
                warn!("health endpoint unreachable: {}", err);
                SinkError::Unavailable(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(format!(
                "endpoint answered {}",
                status
            )));
        }
        debug!("published {} to {}", event.source, self.endpoint);
        Ok(())
    }
}
