use crate::config::AgentSettings;
use crate::telemetry::{emit_run_outcome, RunOutcome};
use crate::traits::observer::{Observer, ObserverFault};
use crate::traits::sink::HealthSink;
use crate::types::{now_millis, Timestamp};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between poll cycles
    pub poll_interval: Duration,
    /// Deadline for a single observer run
    pub run_timeout: Duration,
    /// Consecutive run faults per observer before the scheduler goes fatal
    pub max_consecutive_failures: u32,
    /// How long `stop_and_wait` waits for the drain to finish
    pub stop_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            run_timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
            stop_grace: Duration::from_secs(5),
        }
    }
}

impl SchedulerConfig {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            run_timeout: settings.run_timeout,
            max_consecutive_failures: settings.max_consecutive_failures,
            ..Self::default()
        }
    }
}

/// Scheduler lifecycle.
///
/// A scheduler instance runs once: `Idle -> Running -> Draining -> Stopped`
/// on a requested stop, `Running -> Fatal` when an observer crosses the
/// failure ceiling. Restarting means constructing a fresh instance, so no
/// stale per-run state can leak across lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Stopped,
    Fatal,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "Idle"),
            SchedulerState::Running => write!(f, "Running"),
            SchedulerState::Draining => write!(f, "Draining"),
            SchedulerState::Stopped => write!(f, "Stopped"),
            SchedulerState::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Last-known run outcome per observer, readable while the loop runs
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub observer: String,
    pub last_run: Timestamp,
    pub last_duration_ms: u64,
    pub fault: Option<String>,
    pub has_active_warning_or_error: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The instance already ran; schedulers are single-use
    Exhausted,
    /// An observer kept faulting past the configured ceiling
    FailureCeiling { observer: String, failures: u32 },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Exhausted => {
                write!(f, "scheduler instances are single-use; construct a new one")
            }
            SchedulerError::FailureCeiling { observer, failures } => write!(
                f,
                "observer '{}' faulted {} consecutive times, shutting down",
                observer, failures
            ),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Cloneable handle for stopping a running scheduler from outside
#[derive(Clone)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    /// Signal stop without waiting
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Signal stop and wait, bounded by `grace`, for the drain to finish.
    /// Returns false if the scheduler was still winding down at the
    /// deadline.
    pub async fn stop_and_wait(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        let deadline = Instant::now() + grace;
        loop {
            let state = *self.state.read().await;
            if matches!(
                state,
                SchedulerState::Stopped | SchedulerState::Fatal | SchedulerState::Idle
            ) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Drives the ordered observer set: runs each enabled observer under a
/// deadline, contains per-observer faults, publishes queued health
/// transitions once per cycle, and guarantees that no warning outlives a
/// stopped observer.
pub struct ObserverScheduler {
    config: SchedulerConfig,
    observers: Vec<Box<dyn Observer>>,
    sink: Arc<dyn HealthSink>,
    state: Arc<RwLock<SchedulerState>>,
    cancel: CancellationToken,
    records: Arc<DashMap<String, RunRecord>>,
    failures: HashMap<String, u32>,
}

impl ObserverScheduler {
    pub fn new(config: SchedulerConfig, sink: Arc<dyn HealthSink>) -> Self {
        Self {
            config,
            observers: Vec::new(),
            sink,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            cancel: CancellationToken::new(),
            records: Arc::new(DashMap::new()),
            failures: HashMap::new(),
        }
    }

    /// Observers run in registration order
    pub fn register(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            cancel: self.cancel.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Shared run-record table, keyed by observer name
    pub fn records(&self) -> Arc<DashMap<String, RunRecord>> {
        Arc::clone(&self.records)
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Drive the polling loop until stop is requested or an observer
    /// crosses the failure ceiling. Consumes the instance's one lifetime.
    pub async fn run(&mut self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.write().await;
            if *state != SchedulerState::Idle {
                return Err(SchedulerError::Exhausted);
            }
            *state = SchedulerState::Running;
        }
        info!(
            "scheduler started with {} observers, poll interval {:?}, run timeout {:?}",
            self.observers.len(),
            self.config.poll_interval,
            self.config.run_timeout
        );

        let outcome = self.poll_loop().await;

        match outcome {
            Ok(()) => {
                *self.state.write().await = SchedulerState::Draining;
                self.drain().await;
                *self.state.write().await = SchedulerState::Stopped;
                info!("scheduler stopped");
                Ok(())
            }
            Err(err) => {
                error!("{}", err);
                // Fatal still clears every observer's resource-threshold
                // warnings before the process gives up; an internal fault
                // is not a ledger entry, so nothing false is cleared.
                self.drain().await;
                *self.state.write().await = SchedulerState::Fatal;
                Err(err)
            }
        }
    }

    async fn poll_loop(&mut self) -> Result<(), SchedulerError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let cycle_id = Uuid::new_v4().to_string();
            debug!("cycle {} starting", cycle_id);

            self.run_phase(&cycle_id).await?;
            self.report_phase().await;

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Run every enabled observer, in order, each under the configured
    /// deadline. A hung observer is cancelled and recorded; the cycle
    /// moves on to the next observer either way.
    async fn run_phase(&mut self, cycle_id: &str) -> Result<(), SchedulerError> {
        for observer in self.observers.iter_mut() {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if !observer.is_enabled() {
                continue;
            }
            let name = observer.name().to_string();
            let child = self.cancel.child_token();
            let started = Instant::now();

            let outcome = match timeout(self.config.run_timeout, observer.run(&child)).await {
                Ok(result) => result,
                Err(_) => {
                    child.cancel();
                    Err(ObserverFault::Timeout {
                        limit: self.config.run_timeout,
                    })
                }
            };
            let duration = started.elapsed();

            let stop_requested = self.cancel.is_cancelled();
            match &outcome {
                Ok(()) => {
                    self.failures.insert(name.clone(), 0);
                }
                Err(ObserverFault::Cancelled) if stop_requested => {
                    // The loop is winding down; not an observer failure.
                }
                Err(fault @ ObserverFault::Timeout { .. }) => {
                    // Recorded, but a slow observer does not count toward
                    // the fatal ceiling; only genuine run faults do.
                    warn!("observer '{}' {}", name, fault);
                }
                Err(fault) => {
                    let count = self.failures.entry(name.clone()).or_insert(0);
                    *count += 1;
                    warn!(
                        "observer '{}' faulted ({} consecutive): {}",
                        name, count, fault
                    );
                }
            }

            let consecutive = self.failures.get(&name).copied().unwrap_or(0);
            self.records.insert(
                name.clone(),
                RunRecord {
                    observer: name.clone(),
                    last_run: now_millis(),
                    last_duration_ms: duration.as_millis() as u64,
                    fault: outcome.as_ref().err().map(|f| f.kind().to_string()),
                    has_active_warning_or_error: observer.has_active_warning_or_error(),
                    consecutive_failures: consecutive,
                },
            );

            let (verdicts_ok, verdicts_warning, verdicts_error) = observer.last_verdicts();
            emit_run_outcome(&RunOutcome {
                cycle_id: cycle_id.to_string(),
                observer: name.clone(),
                duration_ms: duration.as_millis() as u64,
                fault: outcome.as_ref().err().map(|f| f.kind().to_string()),
                verdicts_ok,
                verdicts_warning,
                verdicts_error,
            });

            // A ceiling of 0 disables escalation entirely.
            if self.config.max_consecutive_failures > 0
                && consecutive >= self.config.max_consecutive_failures
            {
                return Err(SchedulerError::FailureCeiling {
                    observer: name,
                    failures: consecutive,
                });
            }
        }
        Ok(())
    }

    /// Publish queued transitions, one observer at a time, so the shared
    /// sink never sees interleaved publishes. Report faults are logged
    /// and retried next phase; they are never fatal.
    async fn report_phase(&mut self) {
        for observer in self.observers.iter_mut() {
            if !observer.is_enabled() {
                continue;
            }
            if let Err(fault) = observer.report(self.sink.as_ref(), &self.cancel).await {
                warn!("observer '{}' report failed: {}", observer.name(), fault);
            }
        }
    }

    /// Stop protocol: synthesize and publish an Ok clear for every source
    /// still active in any observer's ledger, so no warning outlives the
    /// agent's attention.
    async fn drain(&mut self) {
        for observer in self.observers.iter_mut() {
            let name = observer.name().to_string();
            let clears = observer.drain_to_ok();
            if clears.is_empty() {
                continue;
            }
            info!("clearing {} active conditions for '{}'", clears.len(), name);
            for event in clears {
                if let Err(err) = self.sink.publish(&event).await {
                    error!("failed to publish stop-clear for {}: {}", event.source, err);
                }
            }
            if let Some(mut record) = self.records.get_mut(&name) {
                record.has_active_warning_or_error = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert!(config.max_consecutive_failures > 0);
        assert!(config.poll_interval > Duration::ZERO);
        assert!(config.run_timeout > Duration::ZERO);
    }

    #[test]
    fn test_scheduler_config_from_settings() {
        let mut settings = AgentSettings::new("node-7");
        settings.poll_interval = Duration::from_secs(15);
        settings.run_timeout = Duration::from_secs(5);
        settings.max_consecutive_failures = 9;
        let config = SchedulerConfig::from_settings(&settings);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.run_timeout, Duration::from_secs(5));
        assert_eq!(config.max_consecutive_failures, 9);
    }

    #[tokio::test]
    async fn test_single_use_instances() {
        let mut scheduler =
            ObserverScheduler::new(SchedulerConfig::default(), Arc::new(MemorySink::new()));
        let handle = scheduler.handle();
        handle.stop();
        scheduler.run().await.unwrap();
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);

        // A finished instance refuses to run again.
        assert_eq!(scheduler.run().await, Err(SchedulerError::Exhausted));
    }
}
