use crate::config::{load_overrides, ConfigError, EntityOverride, ObserverSettings};
use crate::health::{HealthEvent, SourceId};
use crate::metrics::{evaluate, MetricDomain, ThresholdPair};
use crate::observers::support::{verdict_message, ObserverCore};
use crate::traits::observer::{Observer, ObserverFault, ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::traits::source::{MetricSource, SourceError};
use crate::types::Entity;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const APP_OBSERVER: &str = "AppObserver";

/// One application's sampled resource usage for a single run
struct AppSample {
    app: String,
    cpu: Result<f64, SourceError>,
    memory: Result<f64, SourceError>,
}

/// Per-application CPU and memory check.
///
/// Applications are sampled in parallel, bounded by `max_parallel_samples`,
/// because a node can host dozens of them and each sample may sit on a
/// slow external call. Verdicts are committed sequentially after the join
/// so the ledger never sees interleaved writes.
pub struct AppObserver {
    core: ObserverCore,
    source: Arc<dyn MetricSource>,
    applications: Vec<String>,
    cpu_defaults: ThresholdPair,
    memory_defaults: ThresholdPair,
    overrides: HashMap<String, EntityOverride>,
    max_parallel: usize,
}

impl AppObserver {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            core: ObserverCore::new(APP_OBSERVER),
            source,
            applications: Vec::new(),
            cpu_defaults: ThresholdPair::disabled(),
            memory_defaults: ThresholdPair::disabled(),
            overrides: HashMap::new(),
            max_parallel: 4,
        }
    }

    fn thresholds_for(&self, app: &str) -> (ThresholdPair, ThresholdPair) {
        match self.overrides.get(app) {
            Some(entry) => (
                entry.cpu.or(self.cpu_defaults),
                entry.memory.or(self.memory_defaults),
            ),
            None => (self.cpu_defaults, self.memory_defaults),
        }
    }

    /// Fan out over all applications with a bounded number of in-flight
    /// samples. Each task bails out quickly once cancellation is observed.
    async fn collect(&self, cancel: &CancellationToken) -> Vec<Option<AppSample>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let tasks = self.applications.iter().map(|app| {
            let app = app.clone();
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let cpu_target = format!("app_cpu_percent:{}", app);
                let cpu = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    result = source.sample(&cpu_target) => result,
                };
                let memory_target = format!("app_memory_percent:{}", app);
                let memory = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    result = source.sample(&memory_target) => result,
                };
                Some(AppSample { app, cpu, memory })
            }
        });
        join_all(tasks).await
    }

    fn commit_sample(&mut self, sample: AppSample) {
        let (cpu_thresholds, memory_thresholds) = self.thresholds_for(&sample.app);
        let entity = Entity::application(&sample.app);

        match sample.cpu {
            Ok(cpu) => {
                let severity = evaluate(cpu, &cpu_thresholds, MetricDomain::Percentage);
                let message = verdict_message(
                    &format!("application '{}' CPU usage", sample.app),
                    cpu,
                    "%",
                    severity,
                    &cpu_thresholds,
                );
                let source_id = SourceId::new(APP_OBSERVER, entity.to_string(), "CpuPercent");
                self.core
                    .commit_verdict(source_id, entity.clone(), severity, message);
            }
            Err(err) => warn!(app = %sample.app, "cpu sample failed: {}", err),
        }

        match sample.memory {
            Ok(memory) => {
                let severity = evaluate(memory, &memory_thresholds, MetricDomain::Percentage);
                let message = verdict_message(
                    &format!("application '{}' memory usage", sample.app),
                    memory,
                    "%",
                    severity,
                    &memory_thresholds,
                );
                let source_id = SourceId::new(APP_OBSERVER, entity.to_string(), "MemoryPercent");
                self.core
                    .commit_verdict(source_id, entity, severity, message);
            }
            Err(err) => warn!(app = %sample.app, "memory sample failed: {}", err),
        }
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let samples = self.collect(cancel).await;
        // Completed samples commit even when the run is being cancelled;
        // each commit is whole-verdict, so there is no partial state to
        // worry about.
        for sample in samples.into_iter().flatten() {
            self.commit_sample(sample);
        }
        if cancel.is_cancelled() {
            return Err(ObserverFault::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl Observer for AppObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        self.applications = settings.get_list("applications");
        self.core
            .set_enabled(settings.get_bool("enabled", !self.applications.is_empty()));
        self.cpu_defaults = settings.get_threshold_pair("cpu_warning", "cpu_error");
        self.memory_defaults = settings.get_threshold_pair("memory_warning", "memory_error");
        self.max_parallel = settings.get_u64("max_parallel_samples", 4).max(1) as usize;

        self.overrides.clear();
        if let Some(path) = settings.get("overrides_file") {
            let entries = load_overrides(&PathBuf::from(path))?;
            for entry in entries {
                self.overrides.insert(entry.entity.clone(), entry);
            }
        }
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let started = self.core.begin_run();
        let outcome = self.run_inner(cancel).await;
        let faulted = matches!(&outcome, Err(ObserverFault::Internal(_)));
        self.core.finish_run(started, faulted);
        outcome
    }

    async fn report(
        &mut self,
        sink: &dyn HealthSink,
        cancel: &CancellationToken,
    ) -> Result<(), ReportFault> {
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
