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

pub const DISK_OBSERVER: &str = "DiskObserver";

/// Space-used check per configured volume.
///
/// Each volume is its own health source, so one full volume raises and
/// clears independently of the others.
pub struct DiskObserver {
    core: ObserverCore,
    source: Arc<dyn MetricSource>,
    node_name: String,
    volumes: Vec<String>,
    space_thresholds: ThresholdPair,
}

impl DiskObserver {
    pub fn new(node_name: impl Into<String>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            core: ObserverCore::new(DISK_OBSERVER),
            source,
            node_name: node_name.into(),
            volumes: Vec::new(),
            space_thresholds: ThresholdPair::disabled(),
        }
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let volumes = self.volumes.clone();
        for volume in volumes {
            let target = format!("disk_used_percent:{}", volume);
            let source = Arc::clone(&self.source);
            let sampled = tokio::select! {
                _ = cancel.cancelled() => return Err(ObserverFault::Cancelled),
                result = source.sample(&target) => result,
            };
            let used = match sampled {
                Ok(value) => value,
                Err(err) => {
                    warn!("{}: sample '{}' failed: {}", DISK_OBSERVER, target, err);
                    continue;
                }
            };

            let severity = evaluate(used, &self.space_thresholds, MetricDomain::Percentage);
            let message = verdict_message(
                &format!("disk space used on {}", volume),
                used,
                "%",
                severity,
                &self.space_thresholds,
            );
            let source_id = SourceId::new(
                DISK_OBSERVER,
                format!("Node:{}", self.node_name),
                format!("DiskSpaceUsedPercent:{}", volume),
            );
            self.core
                .commit_verdict(source_id, Entity::node(&self.node_name), severity, message);
        }
        Ok(())
    }
}

#[async_trait]
impl Observer for DiskObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        self.core.set_enabled(settings.get_bool("enabled", true));
        self.volumes = settings.get_list("volumes");
        if self.volumes.is_empty() {
            self.volumes.push("/".to_string());
        }
        self.space_thresholds = settings.get_threshold_pair("space_warning", "space_error");
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
