use crate::config::{ConfigError, ObserverSettings};
use crate::health::{HealthEvent, SourceId};
use crate::observers::support::ObserverCore;
use crate::traits::observer::{Observer, ObserverFault, ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::traits::source::{MetricSource, SourceError};
use crate::types::{Entity, Severity};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Scripted implementation of MetricSource for tests and dry runs.
///
/// Targets answer with a fixed value or a sequence that advances one step
/// per sample (the last value sticks). Targets can be told to fail, and
/// every sample can be delayed to exercise timeout and cancellation paths.
#[derive(Debug, Default)]
pub struct ScriptedMetricSource {
    values: Arc<RwLock<HashMap<String, VecDeque<f64>>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    delay: Arc<RwLock<Duration>>,
}

impl ScriptedMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed value for a target
    pub async fn set(&self, target: &str, value: f64) {
        self.values
            .write()
            .await
            .insert(target.to_string(), VecDeque::from([value]));
    }

    /// Sequence of values; one per sample, last value repeats
    pub async fn set_sequence(&self, target: &str, sequence: impl IntoIterator<Item = f64>) {
        self.values
            .write()
            .await
            .insert(target.to_string(), sequence.into_iter().collect());
    }

    /// Make a target fail with SourceError::Unavailable
    pub async fn fail(&self, target: &str) {
        self.failing.write().await.insert(target.to_string());
    }

    pub async fn recover(&self, target: &str) {
        self.failing.write().await.remove(target);
    }

    /// Delay applied before every sample answers
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }
}

#[async_trait]
impl MetricSource for ScriptedMetricSource {
    async fn sample(&self, target: &str) -> Result<f64, SourceError> {
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(target) {
            return Err(SourceError::Unavailable(format!("target '{}' is failing", target)));
        }
        let mut values = self.values.write().await;
        match values.get_mut(target) {
            Some(sequence) => {
                let value = if sequence.len() > 1 {
                    sequence.pop_front().unwrap_or_default()
                } else {
                    sequence.front().copied().unwrap_or_default()
                };
                Ok(value)
            }
            None => Err(SourceError::UnknownTarget(target.to_string())),
        }
    }
}

/// Shared counters a test can hold on to after the observer moves into
/// the scheduler
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    runs_started: Arc<AtomicU32>,
    runs_completed: Arc<AtomicU32>,
    reports: Arc<AtomicU32>,
}

impl ScriptedProbe {
    pub fn runs_started(&self) -> u32 {
        self.runs_started.load(Ordering::SeqCst)
    }

    pub fn runs_completed(&self) -> u32 {
        self.runs_completed.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> u32 {
        self.reports.load(Ordering::SeqCst)
    }
}

/// Fully scripted Observer for scheduler tests: configurable run delay,
/// a number of runs that fail, and an optional severity raised on every
/// run.
pub struct ScriptedObserver {
    core: ObserverCore,
    run_delay: Duration,
    failing_runs: u32,
    raises: Option<Severity>,
    probe: ScriptedProbe,
}

impl ScriptedObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ObserverCore::new(name),
            run_delay: Duration::ZERO,
            failing_runs: 0,
            raises: None,
            probe: ScriptedProbe::default(),
        }
    }

    /// Delay every run; combined with a scheduler timeout this simulates
    /// a hung observer
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    /// Fail the first `count` runs with an internal fault
    pub fn failing_runs(mut self, count: u32) -> Self {
        self.failing_runs = count;
        self
    }

    /// Raise this severity on every successful run
    pub fn raising(mut self, severity: Severity) -> Self {
        self.raises = Some(severity);
        self
    }

    pub fn probe(&self) -> ScriptedProbe {
        self.probe.clone()
    }

    fn source_id(&self) -> SourceId {
        SourceId::new(self.core.name(), "Node:scripted", "ScriptedCondition")
    }
}

#[async_trait]
impl Observer for ScriptedObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        self.core.set_enabled(settings.get_bool("enabled", true));
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let started = self.core.begin_run();
        self.probe.runs_started.fetch_add(1, Ordering::SeqCst);

        if !self.run_delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.core.finish_run(started, false);
                    return Err(ObserverFault::Cancelled);
                }
                _ = tokio::time::sleep(self.run_delay) => {}
            }
        }

        if self.failing_runs > 0 {
            self.failing_runs -= 1;
            self.core.finish_run(started, true);
            return Err(ObserverFault::Internal("scripted failure".to_string()));
        }

        if let Some(severity) = self.raises {
            let source = self.source_id();
            self.core.commit_verdict(
                source,
                Entity::node("scripted"),
                severity,
                "scripted condition",
            );
        }

        self.core.finish_run(started, false);
        self.probe.runs_completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn report(
        &mut self,
        sink: &dyn HealthSink,
        cancel: &CancellationToken,
    ) -> Result<(), ReportFault> {
        self.probe.reports.fetch_add(1, Ordering::SeqCst);
        self.core.report_pending(sink, cancel).await
    }

    fn last_run(&self) -> Option<RunStamp> {
        self.core.last_run()
    }

    fn has_active_warning_or_error(&self) -> bool {
        self.core.has_active()
    }

    fn is_internally_faulted(&self) -> bool {
        self.core.is_faulted()
    }

    fn last_verdicts(&self) -> (u32, u32, u32) {
        self.core.last_verdicts()
    }

    fn drain_to_ok(&mut self) -> Vec<HealthEvent> {
        self.core.drain_to_ok()
    }
}
