use cluster_sentinel::observers::ScriptedMetricSource;
use cluster_sentinel::sinks::MemorySink;
use cluster_sentinel::traits::Observer;
use cluster_sentinel::types::Severity;
use cluster_sentinel::{NodeObserver, ObserverSettings};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn node_observer(source: Arc<ScriptedMetricSource>, pairs: &[(&str, &str)]) -> NodeObserver {
    let mut observer = NodeObserver::new("node-0", source);
    let settings = ObserverSettings::from_pairs(pairs.iter().copied());
    observer.initialize(&settings).await.unwrap();
    observer
}

async fn steady_source() -> Arc<ScriptedMetricSource> {
    let source = ScriptedMetricSource::new();
    source.set("cpu_percent", 20.0).await;
    source.set("memory_percent", 40.0).await;
    source.set("fd_count", 900.0).await;
    source.set("tcp_conn_count", 100.0).await;
    Arc::new(source)
}

#[tokio::test]
async fn test_threshold_crossed_raises_exactly_once() {
    let source = steady_source().await;
    source.set("memory_percent", 92.0).await;
    let mut observer = node_observer(
        Arc::clone(&source),
        &[("memory_warning", "85"), ("memory_error", "97"), ("cpu_window", "4")],
    )
    .await;

    let sink = MemorySink::new();
    let cancel = CancellationToken::new();

    // Three cycles over a stable environment: the warning publishes once.
    for _ in 0..3 {
        observer.run(&cancel).await.unwrap();
        observer.report(&sink, &cancel).await.unwrap();
    }

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warning);
    assert!(observer.has_active_warning_or_error());
}

#[tokio::test]
async fn test_recovery_clears_exactly_once() {
    let source = steady_source().await;
    source.set_sequence("memory_percent", [92.0, 92.0, 30.0, 30.0]).await;
    let mut observer = node_observer(
        Arc::clone(&source),
        &[("memory_warning", "85")],
    )
    .await;

    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    for _ in 0..4 {
        observer.run(&cancel).await.unwrap();
        observer.report(&sink, &cancel).await.unwrap();
    }

    let events = sink.events().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].severity, Severity::Warning);
    assert_eq!(events[1].severity, Severity::Ok);
    assert_eq!(events[0].source, events[1].source);
    assert!(!observer.has_active_warning_or_error());
}

#[tokio::test]
async fn test_nonsense_threshold_completes_without_fault() {
    let source = steady_source().await;
    source.set("cpu_percent", 99.0).await;
    let mut observer =
        node_observer(Arc::clone(&source), &[("cpu_warning", "-1000")]).await;

    observer.run(&CancellationToken::new()).await.unwrap();

    assert!(!observer.is_internally_faulted());
    assert!(!observer.has_active_warning_or_error());
}

#[tokio::test]
async fn test_report_failure_keeps_transition_for_next_phase() {
    let source = steady_source().await;
    source.set("memory_percent", 92.0).await;
    let mut observer =
        node_observer(Arc::clone(&source), &[("memory_warning", "85")]).await;

    let sink = MemorySink::new();
    let cancel = CancellationToken::new();

    observer.run(&cancel).await.unwrap();
    sink.fail_next(1).await;
    assert!(observer.report(&sink, &cancel).await.is_err());
    assert!(sink.is_empty().await);

    // Next reporting phase delivers the same transition.
    observer.report(&sink, &cancel).await.unwrap();
    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_recovering_source_does_not_fault() {
    let source = steady_source().await;
    source.fail("cpu_percent").await;
    let mut observer = node_observer(
        Arc::clone(&source),
        &[("sample_failure_limit", "3")],
    )
    .await;
    let cancel = CancellationToken::new();

    // Two failing runs stay under the limit; recovery resets the streak.
    observer.run(&cancel).await.unwrap();
    observer.run(&cancel).await.unwrap();
    source.recover("cpu_percent").await;
    observer.run(&cancel).await.unwrap();
    observer.run(&cancel).await.unwrap();

    assert!(!observer.is_internally_faulted());
}

#[tokio::test]
async fn test_drain_to_ok_empties_ledger() {
    let source = steady_source().await;
    source.set("memory_percent", 92.0).await;
    source.set("fd_count", 999_999.0).await;
    let mut observer = node_observer(
        Arc::clone(&source),
        &[("memory_warning", "85"), ("fd_warning", "500000")],
    )
    .await;

    observer.run(&CancellationToken::new()).await.unwrap();
    assert!(observer.has_active_warning_or_error());

    let clears = observer.drain_to_ok();
    assert_eq!(clears.len(), 2);
    assert!(clears.iter().all(|event| event.severity == Severity::Ok));
    assert!(!observer.has_active_warning_or_error());
}
