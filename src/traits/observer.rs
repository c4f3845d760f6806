use crate::config::{ConfigError, ObserverSettings};
use crate::health::HealthEvent;
use crate::traits::sink::{HealthSink, SinkError};
use crate::types::Timestamp;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fault raised by an observer run.
///
/// A fault is orthogonal to a health verdict: detecting a resource warning
/// is the observer working as intended, while a fault means the run itself
/// did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverFault {
    /// The run exceeded its deadline and was cancelled by the scheduler
    Timeout { limit: Duration },
    /// The run observed the stop signal and exited early
    Cancelled,
    /// A metric source kept failing past the per-run retry allowance
    Sampling { target: String, detail: String },
    /// Anything else that broke inside the run
    Internal(String),
}

impl ObserverFault {
    /// Short machine-readable tag used in run records and telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            ObserverFault::Timeout { .. } => "timeout",
            ObserverFault::Cancelled => "cancelled",
            ObserverFault::Sampling { .. } => "sampling",
            ObserverFault::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for ObserverFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverFault::Timeout { limit } => {
                write!(f, "run exceeded the {:?} execution timeout", limit)
            }
            ObserverFault::Cancelled => write!(f, "run was cancelled"),
            ObserverFault::Sampling { target, detail } => {
                write!(f, "sampling '{}' kept failing: {}", target, detail)
            }
            ObserverFault::Internal(detail) => write!(f, "internal fault: {}", detail),
        }
    }
}

impl std::error::Error for ObserverFault {}

/// Fault raised by a reporting phase. Never fatal to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFault {
    Sink(SinkError),
    Cancelled,
}

impl fmt::Display for ReportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFault::Sink(err) => write!(f, "report failed: {}", err),
            ReportFault::Cancelled => write!(f, "report was cancelled"),
        }
    }
}

impl std::error::Error for ReportFault {}

/// When an observer last ran and how long it took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStamp {
    pub started: Timestamp,
    pub duration_ms: u64,
}

/// The capability contract every concrete check implements.
///
/// `run` samples, evaluates, and commits verdicts to the observer's own
/// ledger; `report` publishes queued transitions to the shared sink. The
/// split lets the scheduler batch reporting on its own cadence and keeps a
/// down sink from corrupting collected state.
#[async_trait]
pub trait Observer: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Apply configuration. A config error disables the observer; it never
    /// takes the agent down.
    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError>;

    /// One collection pass. Must honor `cancel` at every blocking boundary
    /// and must not leave the ledger half-committed for any source id.
    async fn run(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault>;

    /// Publish queued health transitions to the sink. Transitions that
    /// fail to publish stay queued for the next reporting phase.
    async fn report(
        &mut self,
        sink: &dyn HealthSink,
        cancel: &CancellationToken,
    ) -> Result<(), ReportFault>;

    fn last_run(&self) -> Option<RunStamp>;

    fn has_active_warning_or_error(&self) -> bool;

    fn is_internally_faulted(&self) -> bool;

    /// Verdict counts committed by the most recent run, as
    /// (ok, warning, error)
    fn last_verdicts(&self) -> (u32, u32, u32);

    /// Stop-time drain: synthesize an Ok clear for every active condition
    /// so no warning outlives the observer once it stops checking.
    fn drain_to_ok(&mut self) -> Vec<HealthEvent>;
}
