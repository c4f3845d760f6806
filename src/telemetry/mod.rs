use serde::Serialize;

/// Structured record of one observer run within a poll cycle.
///
/// Emitted fire-and-forget through the logging pipeline after each cycle;
/// consumers tail the `telemetry` target. Emission is never on the
/// critical path and never fails the loop.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub cycle_id: String,
    pub observer: String,
    pub duration_ms: u64,
    pub fault: Option<String>,
    pub verdicts_ok: u32,
    pub verdicts_warning: u32,
    pub verdicts_error: u32,
}

/// Serialize and log one run outcome. Serialization problems are
/// swallowed; telemetry must not interfere with monitoring.
pub fn emit_run_outcome(outcome: &RunOutcome) {
    if let Ok(json) = serde_json::to_string(outcome) {
        log::info!(target: "telemetry", "{}", json);
    }
}
