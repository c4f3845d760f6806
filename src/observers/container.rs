use crate::config::{ConfigError, ObserverSettings};
use crate::health::{HealthEvent, SourceId};
use crate::metrics::{evaluate, MetricDomain, ThresholdPair};
use crate::observers::support::{verdict_message, ObserverCore};
use crate::traits::observer::{Observer, ObserverFault, ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::traits::source::MetricSource;
use crate::types::Entity;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const CONTAINER_OBSERVER: &str = "ContainerObserver";

/// Per-container CPU and memory check.
///
/// The container list comes from configuration; the stats behind the
/// `container_*` targets come from whatever the metric source wraps
/// (a docker-stats style helper on the node).
pub struct ContainerObserver {
    core: ObserverCore,
    source: Arc<dyn MetricSource>,
    containers: Vec<String>,
    cpu_thresholds: ThresholdPair,
    memory_thresholds: ThresholdPair,
}

impl ContainerObserver {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            core: ObserverCore::new(CONTAINER_OBSERVER),
            source,
            containers: Vec::new(),
            cpu_thresholds: ThresholdPair::disabled(),
            memory_thresholds: ThresholdPair::disabled(),
        }
    }

    async fn sample_one(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<f64>, ObserverFault> {
        let source = Arc::clone(&self.source);
        let sampled = tokio::select! {
            _ = cancel.cancelled() => return Err(ObserverFault::Cancelled),
            result = source.sample(target) => result,
        };
        match sampled {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("{}: sample '{}' failed: {}", CONTAINER_OBSERVER, target, err);
                Ok(None)
            }
        }
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let containers = self.containers.clone();
        for container in containers {
            let entity = Entity::deployed_service_package(&container);

            if let Some(cpu) = self
                .sample_one(&format!("container_cpu_percent:{}", container), cancel)
                .await?
            {
                let severity = evaluate(cpu, &self.cpu_thresholds, MetricDomain::Percentage);
                let message = verdict_message(
                    &format!("container '{}' CPU usage", container),
                    cpu,
                    "%",
                    severity,
                    &self.cpu_thresholds,
                );
                let source_id = SourceId::new(
                    CONTAINER_OBSERVER,
                    entity.to_string(),
                    "CpuPercent",
                );
                self.core
                    .commit_verdict(source_id, entity.clone(), severity, message);
            }

            if let Some(memory) = self
                .sample_one(&format!("container_memory_percent:{}", container), cancel)
                .await?
            {
                let severity =
                    evaluate(memory, &self.memory_thresholds, MetricDomain::Percentage);
                let message = verdict_message(
                    &format!("container '{}' memory usage", container),
                    memory,
                    "%",
                    severity,
                    &self.memory_thresholds,
                );
                let source_id = SourceId::new(
                    CONTAINER_OBSERVER,
                    entity.to_string(),
                    "MemoryPercent",
                );
                self.core
                    .commit_verdict(source_id, entity.clone(), severity, message);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Observer for ContainerObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        // Disabled unless containers are configured.
        self.containers = settings.get_list("containers");
        self.core
            .set_enabled(settings.get_bool("enabled", !self.containers.is_empty()));
        self.cpu_thresholds = settings.get_threshold_pair("cpu_warning", "cpu_error");
        self.memory_thresholds = settings.get_threshold_pair("memory_warning", "memory_error");
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
