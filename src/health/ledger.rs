use crate::health::event::{HealthEvent, SourceId};
use crate::types::{Entity, Severity};
use std::collections::{HashMap, VecDeque};

/// Result of committing a verdict to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The verdict repeats what the sink already knows; nothing to publish
    Suppressed,
    /// The verdict is a transition and was queued for the next report phase
    Queued,
}

/// Per-observer record of currently active (non-Ok) health conditions.
///
/// The ledger is what turns a stream of per-cycle verdicts into
/// raise-once/clear-once semantics: a condition is published when it first
/// becomes active, when its severity changes, and when it resolves, but
/// never on every poll cycle in between.
#[derive(Debug, Default)]
pub struct HealthLedger {
    active: HashMap<SourceId, Severity>,
    pending: VecDeque<HealthEvent>,
}

impl HealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a full verdict for one source id.
    ///
    /// The commit is atomic per source id: active state and the pending
    /// publish queue are updated together or not at all.
    pub fn commit(&mut self, event: HealthEvent) -> LedgerOutcome {
        let previous = self.active.get(&event.source).copied();
        match (previous, event.severity) {
            // Already-active condition at the same severity: suppress.
            (Some(active), severity) if active == severity => LedgerOutcome::Suppressed,
            // Healthy verdict with nothing active: nothing to clear.
            (None, Severity::Ok) => LedgerOutcome::Suppressed,
            // Resolution of an active condition.
            (Some(_), Severity::Ok) => {
                self.active.remove(&event.source);
                self.pending.push_back(event);
                LedgerOutcome::Queued
            }
            // New raise or severity change.
            (_, severity) => {
                self.active.insert(event.source.clone(), severity);
                self.pending.push_back(event);
                LedgerOutcome::Queued
            }
        }
    }

    /// Severity currently tracked for a source, if active
    pub fn active_severity(&self, source: &SourceId) -> Option<Severity> {
        self.active.get(source).copied()
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take everything queued for publication, in commit order
    pub fn take_pending(&mut self) -> VecDeque<HealthEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Put unpublished events back at the front of the queue, preserving
    /// their original order, after a failed report phase
    pub fn restore_pending(&mut self, mut events: VecDeque<HealthEvent>) {
        while let Some(event) = events.pop_back() {
            self.pending.push_front(event);
        }
    }

    /// Drain every active condition into a synthesized Ok clear.
    ///
    /// Used by the stop protocol: after this, the ledger has no active
    /// entries and the returned events, once published, leave no stale
    /// warning behind in the sink. Pending unpublished transitions are
    /// dropped; the clears supersede them.
    pub fn drain_to_ok(&mut self, entity_for: impl Fn(&SourceId) -> Entity) -> Vec<HealthEvent> {
        self.pending.clear();
        let mut sources: Vec<SourceId> = self.active.drain().map(|(source, _)| source).collect();
        sources.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        sources
            .into_iter()
            .map(|source| {
                let entity = entity_for(&source);
                HealthEvent::clear(source, entity)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entity;

    fn event(property: &str, severity: Severity) -> HealthEvent {
        HealthEvent::new(
            SourceId::new("NodeObserver", "Node:node-0", property),
            severity,
            format!("{} verdict", property),
            Entity::node("node-0"),
        )
    }

    #[test]
    fn test_raise_once() {
        let mut ledger = HealthLedger::new();
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Warning)),
            LedgerOutcome::Queued
        );
        // Same condition next cycle: suppressed, not re-published.
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Warning)),
            LedgerOutcome::Suppressed
        );
        assert_eq!(ledger.pending_len(), 1);
        assert!(ledger.has_active());
    }

    #[test]
    fn test_ok_without_raise_is_suppressed() {
        let mut ledger = HealthLedger::new();
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Ok)),
            LedgerOutcome::Suppressed
        );
        assert_eq!(ledger.pending_len(), 0);
    }

    #[test]
    fn test_clear_once() {
        let mut ledger = HealthLedger::new();
        ledger.commit(event("CpuPercent", Severity::Warning));
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Ok)),
            LedgerOutcome::Queued
        );
        assert!(!ledger.has_active());
        // A second Ok has nothing left to clear.
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Ok)),
            LedgerOutcome::Suppressed
        );
    }

    #[test]
    fn test_severity_change_is_published() {
        let mut ledger = HealthLedger::new();
        ledger.commit(event("CpuPercent", Severity::Warning));
        assert_eq!(
            ledger.commit(event("CpuPercent", Severity::Error)),
            LedgerOutcome::Queued
        );
        assert_eq!(
            ledger.active_severity(&SourceId::new("NodeObserver", "Node:node-0", "CpuPercent")),
            Some(Severity::Error)
        );
    }

    #[test]
    fn test_restore_preserves_order() {
        let mut ledger = HealthLedger::new();
        ledger.commit(event("CpuPercent", Severity::Warning));
        ledger.commit(event("MemoryPercent", Severity::Error));
        let taken = ledger.take_pending();
        assert_eq!(taken.len(), 2);
        ledger.restore_pending(taken);
        let again = ledger.take_pending();
        assert_eq!(again[0].source.property, "CpuPercent");
        assert_eq!(again[1].source.property, "MemoryPercent");
    }

    #[test]
    fn test_drain_to_ok_clears_everything() {
        let mut ledger = HealthLedger::new();
        ledger.commit(event("CpuPercent", Severity::Warning));
        ledger.commit(event("MemoryPercent", Severity::Error));
        let clears = ledger.drain_to_ok(|_| Entity::node("node-0"));
        assert_eq!(clears.len(), 2);
        assert!(clears.iter().all(|e| e.severity == Severity::Ok));
        assert!(!ledger.has_active());
        assert_eq!(ledger.pending_len(), 0);
    }
}
