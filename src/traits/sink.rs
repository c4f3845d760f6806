use crate::health::HealthEvent;
use async_trait::async_trait;
use std::fmt;

/// Error publishing to the health-management backend.
///
/// Sink errors are recorded and retried on the next reporting phase; they
/// never escalate to scheduler-fatal. A down reporting backend must not
/// stop data collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Transport-level failure reaching the backend
    Unavailable(String),
    /// The backend answered but refused the report
    Rejected(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Unavailable(detail) => write!(f, "health sink unavailable: {}", detail),
            SinkError::Rejected(detail) => write!(f, "health sink rejected report: {}", detail),
        }
    }
}

impl std::error::Error for SinkError {}

/// The external health-management system the agent reports into.
///
/// Publishes are serialized by the scheduler's reporting phase, so an
/// implementation never sees concurrent calls for the same target entity.
#[async_trait]
pub trait HealthSink: Send + Sync {
    async fn publish(&self, event: &HealthEvent) -> Result<(), SinkError>;
}
