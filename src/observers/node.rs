use crate::config::{ConfigError, ObserverSettings};
use crate::health::{HealthEvent, SourceId};
use crate::metrics::{evaluate, MetricDomain, MetricSeries, ThresholdPair};
use crate::observers::support::{verdict_message, ObserverCore};
use crate::traits::observer::{Observer, ObserverFault, ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::traits::source::MetricSource;
use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const NODE_OBSERVER: &str = "NodeObserver";

/// Machine-wide resource check: CPU, memory, open file handles, and active
/// TCP connections for the node the agent lives on.
///
/// CPU keeps a rolling window and evaluates its average so a single spike
/// between polls does not raise; the other metrics evaluate their latest
/// sample.
pub struct NodeObserver {
    core: ObserverCore,
    source: Arc<dyn MetricSource>,
    node_name: String,
    cpu_series: MetricSeries,
    cpu_thresholds: ThresholdPair,
    memory_thresholds: ThresholdPair,
    fd_thresholds: ThresholdPair,
    tcp_thresholds: ThresholdPair,
    sample_failure_limit: u32,
    failure_streaks: HashMap<String, u32>,
}

impl NodeObserver {
    pub fn new(node_name: impl Into<String>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            core: ObserverCore::new(NODE_OBSERVER),
            source,
            node_name: node_name.into(),
            cpu_series: MetricSeries::ring("cpu_percent", 12),
            cpu_thresholds: ThresholdPair::disabled(),
            memory_thresholds: ThresholdPair::disabled(),
            fd_thresholds: ThresholdPair::disabled(),
            tcp_thresholds: ThresholdPair::disabled(),
            sample_failure_limit: 3,
            failure_streaks: HashMap::new(),
        }
    }

    fn source_id(&self, property: impl Into<String>) -> SourceId {
        SourceId::new(
            NODE_OBSERVER,
            format!("Node:{}", self.node_name),
            property,
        )
    }

    /// Sample one target, honoring cancellation and the per-target failure
    /// streak. Ok(None) means "skip this metric for this run".
    async fn sample(
        &mut self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<f64>, ObserverFault> {
        let source = Arc::clone(&self.source);
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ObserverFault::Cancelled),
            result = source.sample(target) => result,
        };
        match result {
            Ok(value) => {
                self.failure_streaks.remove(target);
                Ok(Some(value))
            }
            Err(err) => {
                let streak = self.failure_streaks.entry(target.to_string()).or_insert(0);
                *streak += 1;
                if *streak >= self.sample_failure_limit {
                    Err(ObserverFault::Sampling {
                        target: target.to_string(),
                        detail: err.to_string(),
                    })
                } else {
                    warn!(
                        "{}: sample '{}' failed ({} of {} allowed): {}",
                        NODE_OBSERVER, target, streak, self.sample_failure_limit, err
                    );
                    Ok(None)
                }
            }
        }
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        if let Some(cpu) = self.sample("cpu_percent", cancel).await? {
            self.cpu_series.append(cpu);
            if let Ok(average) = self.cpu_series.average() {
                let severity = evaluate(average, &self.cpu_thresholds, MetricDomain::Percentage);
                let message =
                    verdict_message("average CPU usage", average, "%", severity, &self.cpu_thresholds);
                let source = self.source_id("CpuPercent");
                let entity = crate::types::Entity::node(&self.node_name);
                self.core.commit_verdict(source, entity, severity, message);
            }
        }

        if let Some(memory) = self.sample("memory_percent", cancel).await? {
            let severity = evaluate(memory, &self.memory_thresholds, MetricDomain::Percentage);
            let message =
                verdict_message("memory usage", memory, "%", severity, &self.memory_thresholds);
            let source = self.source_id("MemoryPercent");
            let entity = crate::types::Entity::node(&self.node_name);
            self.core.commit_verdict(source, entity, severity, message);
        }

        if let Some(fds) = self.sample("fd_count", cancel).await? {
            let severity = evaluate(fds, &self.fd_thresholds, MetricDomain::Count);
            let message =
                verdict_message("open file handles", fds, "", severity, &self.fd_thresholds);
            let source = self.source_id("FileHandles");
            let entity = crate::types::Entity::node(&self.node_name);
            self.core.commit_verdict(source, entity, severity, message);
        }

        if let Some(conns) = self.sample("tcp_conn_count", cancel).await? {
            let severity = evaluate(conns, &self.tcp_thresholds, MetricDomain::Count);
            let message =
                verdict_message("active TCP connections", conns, "", severity, &self.tcp_thresholds);
            let source = self.source_id("TcpConnections");
            let entity = crate::types::Entity::node(&self.node_name);
            self.core.commit_verdict(source, entity, severity, message);
        }

        Ok(())
    }
}

#[async_trait]
impl Observer for NodeObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        self.core.set_enabled(settings.get_bool("enabled", true));
        let window = settings.get_u64("cpu_window", 12) as usize;
        self.cpu_series = MetricSeries::ring("cpu_percent", window);
        self.cpu_thresholds = settings.get_threshold_pair("cpu_warning", "cpu_error");
        self.memory_thresholds = settings.get_threshold_pair("memory_warning", "memory_error");
        self.fd_thresholds = settings.get_threshold_pair("fd_warning", "fd_error");
        self.tcp_thresholds = settings.get_threshold_pair("tcp_warning", "tcp_error");
        self.sample_failure_limit = settings.get_u64("sample_failure_limit", 3) as u32;
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let started = self.core.begin_run();
        let outcome = self.run_inner(cancel).await;
        let faulted = matches!(
            &outcome,
            Err(ObserverFault::Sampling { .. }) | Err(ObserverFault::Internal(_))
        );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::source::MockMetricSource;
    use crate::types::Severity;

    fn observer_with(source: MockMetricSource) -> NodeObserver {
        NodeObserver::new("node-0", Arc::new(source))
    }

    fn healthy_source() -> MockMetricSource {
        let mut source = MockMetricSource::new();
        source.expect_sample().returning(|target| {
            Ok(match target {
                "cpu_percent" => 20.0,
                "memory_percent" => 40.0,
                "fd_count" => 900.0,
                "tcp_conn_count" => 120.0,
                _ => 0.0,
            })
        });
        source
    }

    #[tokio::test]
    async fn test_healthy_run_raises_nothing() {
        let mut observer = observer_with(healthy_source());
        let settings = ObserverSettings::from_pairs([("cpu_warning", "80"), ("cpu_error", "95")]);
        observer.initialize(&settings).await.unwrap();

        observer.run(&CancellationToken::new()).await.unwrap();

        assert!(!observer.has_active_warning_or_error());
        assert!(!observer.is_internally_faulted());
        assert!(observer.last_run().is_some());
    }

    #[tokio::test]
    async fn test_nonsense_threshold_never_raises() {
        let mut observer = observer_with(healthy_source());
        let settings = ObserverSettings::from_pairs([("cpu_warning", "-1000")]);
        observer.initialize(&settings).await.unwrap();

        observer.run(&CancellationToken::new()).await.unwrap();

        assert!(!observer.has_active_warning_or_error());
        assert!(!observer.is_internally_faulted());
    }

    #[tokio::test]
    async fn test_cpu_average_crosses_warning() {
        let mut source = MockMetricSource::new();
        source.expect_sample().returning(|target| {
            Ok(match target {
                "cpu_percent" => 90.0,
                _ => 0.0,
            })
        });
        let mut observer = observer_with(source);
        let settings = ObserverSettings::from_pairs([("cpu_warning", "80"), ("cpu_error", "95")]);
        observer.initialize(&settings).await.unwrap();

        observer.run(&CancellationToken::new()).await.unwrap();

        assert!(observer.has_active_warning_or_error());
        let (_, warnings, errors) = observer.last_verdicts();
        assert_eq!(warnings, 1);
        assert_eq!(errors, 0);
    }

    #[tokio::test]
    async fn test_sample_failure_streak_faults() {
        let mut source = MockMetricSource::new();
        source
            .expect_sample()
            .returning(|_| Err(crate::traits::source::SourceError::Unavailable("down".into())));
        let mut observer = observer_with(source);
        let settings = ObserverSettings::from_pairs([("sample_failure_limit", "2")]);
        observer.initialize(&settings).await.unwrap();

        let cancel = CancellationToken::new();
        // First run: streak 1 on cpu, skipped; memory etc. each build their own.
        assert!(observer.run(&cancel).await.is_ok());
        // Second run: cpu streak hits the limit.
        let fault = observer.run(&cancel).await.unwrap_err();
        assert!(matches!(fault, ObserverFault::Sampling { .. }));
        assert!(observer.is_internally_faulted());
    }

    #[tokio::test]
    async fn test_cancelled_before_sampling() {
        let mut observer = observer_with(healthy_source());
        observer.initialize(&ObserverSettings::new()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let fault = observer.run(&cancel).await.unwrap_err();
        assert_eq!(fault, ObserverFault::Cancelled);
        // A stop-cancelled run is not an internal fault.
        assert!(!observer.is_internally_faulted());
    }

    #[tokio::test]
    async fn test_warning_then_recovery_clears() {
        let mut source = MockMetricSource::new();
        let mut calls = 0_u32;
        source.expect_sample().returning(move |target| {
            if target == "memory_percent" {
                calls += 1;
                Ok(if calls == 1 { 92.0 } else { 30.0 })
            } else {
                Ok(10.0)
            }
        });
        let mut observer = observer_with(source);
        let settings =
            ObserverSettings::from_pairs([("memory_warning", "85"), ("memory_error", "97")]);
        observer.initialize(&settings).await.unwrap();

        let cancel = CancellationToken::new();
        observer.run(&cancel).await.unwrap();
        assert!(observer.has_active_warning_or_error());

        observer.run(&cancel).await.unwrap();
        assert!(!observer.has_active_warning_or_error());

        let sink = crate::sinks::MemorySink::new();
        observer.report(&sink, &cancel).await.unwrap();
        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[1].severity, Severity::Ok);
        assert_eq!(events[0].source, events[1].source);
    }
}
