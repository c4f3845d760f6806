use cluster_sentinel::{
    init_logging, AgentSettings, AppObserver, DiskObserver, HealthSink, HttpHealthSink,
    MemorySink, MetricSource, NodeObserver, Observer, ObserverScheduler, ObserverSettings,
    SchedulerConfig, ScriptedMetricSource,
};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

/// Dry-run settings: short intervals and a simulated metric source so the
/// agent shows a full collect/report/stop lifecycle without touching the
/// machine it runs on.
fn dry_run_settings() -> AgentSettings {
    let mut settings = AgentSettings::new(
        std::env::var("SENTINEL_NODE_NAME").unwrap_or_else(|_| "node-0".to_string()),
    );
    settings.poll_interval = Duration::from_secs(5);
    settings.run_timeout = Duration::from_secs(10);

    settings.set_section(
        "NodeObserver",
        ObserverSettings::from_pairs([
            ("cpu_warning", "80"),
            ("cpu_error", "95"),
            ("memory_warning", "85"),
            ("memory_error", "95"),
            ("fd_warning", "60000"),
        ]),
    );
    settings.set_section(
        "DiskObserver",
        ObserverSettings::from_pairs([
            ("volumes", "/,/var/log"),
            ("space_warning", "85"),
            ("space_error", "95"),
        ]),
    );
    settings.set_section(
        "AppObserver",
        ObserverSettings::from_pairs([
            ("applications", "fabric:/Billing,fabric:/Search"),
            ("cpu_warning", "75"),
            ("cpu_error", "90"),
            ("memory_warning", "85"),
        ]),
    );
    settings
}

async fn simulated_source() -> Arc<ScriptedMetricSource> {
    let source = ScriptedMetricSource::new();
    // Drift the node CPU into warning territory and back out again.
    source
        .set_sequence("cpu_percent", [35.0, 52.0, 88.0, 91.0, 87.0, 40.0, 30.0])
        .await;
    source.set("memory_percent", 58.0).await;
    source.set("fd_count", 18_000.0).await;
    source.set("tcp_conn_count", 420.0).await;
    source.set("disk_used_percent:/", 47.0).await;
    source.set("disk_used_percent:/var/log", 88.0).await;
    source.set("app_cpu_percent:fabric:/Billing", 41.0).await;
    source.set("app_memory_percent:fabric:/Billing", 36.0).await;
    source.set("app_cpu_percent:fabric:/Search", 12.0).await;
    source.set("app_memory_percent:fabric:/Search", 22.0).await;
    Arc::new(source)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging("info", None)?;

    let settings = dry_run_settings();
    let source = simulated_source().await;

    let memory_sink = MemorySink::new();
    let sink: Arc<dyn HealthSink> = match std::env::var("SENTINEL_HEALTH_ENDPOINT") {
        Ok(endpoint) => {
            info!("reporting health to {}", endpoint);
            Arc::new(HttpHealthSink::new(endpoint))
        }
        Err(_) => Arc::new(memory_sink.clone()),
    };

    let observers: Vec<Box<dyn Observer>> = vec![
        Box::new(NodeObserver::new(
            &settings.node_name,
            Arc::clone(&source) as Arc<dyn MetricSource>,
        )),
        Box::new(DiskObserver::new(
            &settings.node_name,
            Arc::clone(&source) as Arc<dyn MetricSource>,
        )),
        Box::new(AppObserver::new(Arc::clone(&source) as Arc<dyn MetricSource>)),
    ];

    let config = SchedulerConfig::from_settings(&settings);
    let stop_grace = config.stop_grace;
    let mut scheduler = ObserverScheduler::new(config, sink);
    for mut observer in observers {
        let section = settings.section(observer.name());
        // A broken config section disables the observer; it never takes
        // the agent down.
        if let Err(err) = observer.initialize(&section).await {
            error!("observer '{}' disabled: {}", observer.name(), err);
            continue;
        }
        scheduler.register(observer);
    }

    let handle = scheduler.handle();
    let records = scheduler.records();

    let loop_task = tokio::spawn(async move { scheduler.run().await });

    tokio::signal::ctrl_c().await?;
    info!("stop requested, draining");
    if !handle.stop_and_wait(stop_grace).await {
        error!("scheduler did not drain within the grace period");
    }

    match loop_task.await {
        Ok(Ok(())) => info!("scheduler exited cleanly"),
        Ok(Err(err)) => error!("scheduler exited fatally: {}", err),
        Err(err) => error!("scheduler task panicked: {}", err),
    }

    for entry in records.iter() {
        info!(
            "{}: last run {}ms, fault: {:?}, active: {}",
            entry.observer,
            entry.last_duration_ms,
            entry.fault,
            entry.has_active_warning_or_error
        );
    }
    let published = memory_sink.events().await;
    info!("{} health events published during this session", published.len());
    for event in published {
        info!("  [{}] {} - {}", event.severity, event.source, event.message);
    }

    Ok(())
}
