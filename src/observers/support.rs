use crate::health::{HealthEvent, HealthLedger, LedgerOutcome, SourceId};
use crate::metrics::ThresholdPair;
use crate::traits::observer::{ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::types::{now_millis, Entity, Severity};
use log::debug;
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared run bookkeeping embedded by every concrete observer.
///
/// Observers are independent types behind one capability trait. The parts
/// they all need (name, enablement, the ledger, run stamps, fault flags,
/// verdict counting, the publish loop) live here by composition.
#[derive(Debug)]
pub struct ObserverCore {
    name: String,
    enabled: bool,
    ledger: HealthLedger,
    entities: HashMap<SourceId, Entity>,
    last_run: Option<RunStamp>,
    faulted: bool,
    verdicts: (u32, u32, u32),
}

impl ObserverCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            ledger: HealthLedger::new(),
            entities: HashMap::new(),
            last_run: None,
            faulted: false,
            verdicts: (0, 0, 0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_run(&self) -> Option<RunStamp> {
        self.last_run
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn has_active(&self) -> bool {
        self.ledger.has_active()
    }

    pub fn last_verdicts(&self) -> (u32, u32, u32) {
        self.verdicts
    }

    /// Mark the start of a run: resets verdict counts and the fault flag
    /// so this run's outcome stands on its own
    pub fn begin_run(&mut self) -> Instant {
        self.verdicts = (0, 0, 0);
        self.faulted = false;
        Instant::now()
    }

    /// Mark the end of a run
    pub fn finish_run(&mut self, started_at: Instant, faulted: bool) {
        self.faulted = faulted;
        self.last_run = Some(RunStamp {
            started: now_millis(),
            duration_ms: started_at.elapsed().as_millis() as u64,
        });
    }

    /// Commit one full verdict: builds the event, updates the ledger, and
    /// counts the verdict. Duplicate raises are suppressed by the ledger.
    pub fn commit_verdict(
        &mut self,
        source: SourceId,
        entity: Entity,
        severity: Severity,
        message: impl Into<String>,
    ) {
        match severity {
            Severity::Ok => self.verdicts.0 += 1,
            Severity::Warning => self.verdicts.1 += 1,
            Severity::Error => self.verdicts.2 += 1,
        }
        self.entities.insert(source.clone(), entity.clone());
        let event = HealthEvent::new(source, severity, message, entity);
        if self.ledger.commit(event) == LedgerOutcome::Queued {
            debug!("{}: queued {} transition", self.name, severity);
        }
    }

    /// Publish queued transitions in order. On any failure the unpublished
    /// remainder goes back on the queue for the next reporting phase.
    pub async fn report_pending(
        &mut self,
        sink: &dyn HealthSink,
        cancel: &CancellationToken,
    ) -> Result<(), ReportFault> {
        let mut pending = self.ledger.take_pending();
        while let Some(event) = pending.pop_front() {
            if cancel.is_cancelled() {
                pending.push_front(event);
                self.ledger.restore_pending(pending);
                return Err(ReportFault::Cancelled);
            }
            if let Err(err) = sink.publish(&event).await {
                pending.push_front(event);
                self.ledger.restore_pending(pending);
                return Err(ReportFault::Sink(err));
            }
        }
        Ok(())
    }

    /// Synthesize Ok clears for every active condition
    pub fn drain_to_ok(&mut self) -> Vec<HealthEvent> {
        let name = self.name.clone();
        let entities = std::mem::take(&mut self.entities);
        self.ledger.drain_to_ok(|source| {
            entities
                .get(source)
                .cloned()
                .unwrap_or_else(|| Entity::node(&name))
        })
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &HealthLedger {
        &self.ledger
    }
}

/// Human-readable verdict message shared by the metric observers
pub fn verdict_message(
    metric: &str,
    value: f64,
    unit: &str,
    severity: Severity,
    thresholds: &ThresholdPair,
) -> String {
    match severity {
        Severity::Error => format!(
            "{} {:.1}{} is at or above the error threshold {:.1}{}",
            metric,
            value,
            unit,
            thresholds.error.unwrap_or_default(),
            unit
        ),
        Severity::Warning => format!(
            "{} {:.1}{} is at or above the warning threshold {:.1}{}",
            metric,
            value,
            unit,
            thresholds.warning.unwrap_or_default(),
            unit
        ),
        Severity::Ok => format!("{} {:.1}{} is within configured thresholds", metric, value, unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;

    fn source(property: &str) -> SourceId {
        SourceId::new("TestObserver", "Node:node-0", property)
    }

    #[tokio::test]
    async fn test_commit_then_report_publishes_once() {
        let mut core = ObserverCore::new("TestObserver");
        let sink = MemorySink::new();
        let cancel = CancellationToken::new();

        core.commit_verdict(
            source("CpuPercent"),
            Entity::node("node-0"),
            Severity::Warning,
            "cpu high",
        );
        core.report_pending(&sink, &cancel).await.unwrap();
        // Same verdict again: suppressed, second report publishes nothing.
        core.commit_verdict(
            source("CpuPercent"),
            Entity::node("node-0"),
            Severity::Warning,
            "cpu high",
        );
        core.report_pending(&sink, &cancel).await.unwrap();

        assert_eq!(sink.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_report_retries_next_phase() {
        let mut core = ObserverCore::new("TestObserver");
        let sink = MemorySink::new();
        let cancel = CancellationToken::new();

        core.commit_verdict(
            source("CpuPercent"),
            Entity::node("node-0"),
            Severity::Warning,
            "cpu high",
        );
        sink.fail_next(1).await;
        assert!(core.report_pending(&sink, &cancel).await.is_err());
        assert_eq!(core.ledger().pending_len(), 1);

        core.report_pending(&sink, &cancel).await.unwrap();
        assert_eq!(sink.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_drain_resolves_entities() {
        let mut core = ObserverCore::new("TestObserver");
        core.commit_verdict(
            source("CpuPercent"),
            Entity::application("fabric:/Billing"),
            Severity::Error,
            "cpu very high",
        );
        let clears = core.drain_to_ok();
        assert_eq!(clears.len(), 1);
        assert_eq!(clears[0].entity, Entity::application("fabric:/Billing"));
        assert!(!core.has_active());
    }

    #[test]
    fn test_begin_run_resets_outcome() {
        let mut core = ObserverCore::new("TestObserver");
        let started = core.begin_run();
        core.finish_run(started, true);
        assert!(core.is_faulted());
        core.begin_run();
        assert!(!core.is_faulted());
        assert_eq!(core.last_verdicts(), (0, 0, 0));
    }
}
