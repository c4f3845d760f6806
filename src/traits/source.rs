use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::fmt;

/// Error from an external metric source.
///
/// Failures here are recoverable from the observer's point of view: a
/// failed sample is skipped and retried next run, and only a recurring
/// streak of failures turns into an observer fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The target is not known to the source
    UnknownTarget(String),
    /// The source could not be reached or produced no value
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::UnknownTarget(target) => write!(f, "unknown metric target '{}'", target),
            SourceError::Unavailable(detail) => write!(f, "metric source unavailable: {}", detail),
        }
    }
}

impl std::error::Error for SourceError {}

/// External provider of raw metric samples.
///
/// Targets are opaque strings owned by the observers, e.g. `cpu_percent`
/// or `disk_used_percent:/data`. The process-level acquisition behind a
/// target (proc filesystem reads, perf counters, elevated helper binaries)
/// lives outside this crate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Sample the current value for one target
    async fn sample(&self, target: &str) -> Result<f64, SourceError>;
}

/// External certificate store access, reduced to the one question the
/// certificate observer asks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Whole days until the named certificate expires. Negative values
    /// mean the certificate is already expired.
    async fn days_until_expiry(&self, name: &str) -> Result<i64, SourceError>;
}
