pub mod config;
pub mod health;
pub mod metrics;
pub mod observers;
pub mod scheduler;
pub mod sinks;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use config::{AgentSettings, ConfigError, EntityOverride, ObserverSettings};
pub use health::{HealthEvent, HealthLedger, LedgerOutcome, SourceId};
pub use metrics::{evaluate, threshold_enabled, MetricDomain, MetricSeries, ThresholdPair};
pub use observers::{
    AppObserver, CertificateObserver, ContainerObserver, DiskObserver, NodeObserver,
    ScriptedMetricSource, ScriptedObserver,
};
pub use scheduler::{
    ObserverScheduler, RunRecord, SchedulerConfig, SchedulerError, SchedulerHandle, SchedulerState,
};
pub use sinks::{HttpHealthSink, MemorySink};
pub use traits::{
    CertificateStore, HealthSink, MetricSource, Observer, ObserverFault, ReportFault, RunStamp,
    SinkError, SourceError,
};
pub use types::{Entity, EntityKind, Severity, Timestamp};

/// Configure the global logger: stdout always, plus an optional log file.
///
/// An unknown level string falls back to `info`, in keeping with the
/// config policy that bad values degrade rather than fail.
pub fn init_logging(level: &str, file: Option<&str>) -> Result<(), fern::InitError> {
    let level = level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());
    if let Some(path) = file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}
