use crate::config::{ConfigError, ObserverSettings};
use crate::health::{HealthEvent, SourceId};
use crate::metrics::{threshold_enabled, MetricDomain};
use crate::observers::support::ObserverCore;
use crate::traits::observer::{Observer, ObserverFault, ReportFault, RunStamp};
use crate::traits::sink::HealthSink;
use crate::traits::source::CertificateStore;
use crate::types::{Entity, Severity};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const CERTIFICATE_OBSERVER: &str = "CertificateObserver";

/// Expiry check for a configured set of certificates.
///
/// Unlike the resource observers, the comparison is inverted: fewer
/// remaining days is worse. The shared disable-threshold policy still
/// applies to the day levels; the below-threshold comparison is local to
/// this observer rather than bent into the shared evaluator.
pub struct CertificateObserver {
    core: ObserverCore,
    store: Arc<dyn CertificateStore>,
    node_name: String,
    certificates: Vec<String>,
    warning_days: Option<f64>,
    error_days: Option<f64>,
}

impl CertificateObserver {
    pub fn new(node_name: impl Into<String>, store: Arc<dyn CertificateStore>) -> Self {
        Self {
            core: ObserverCore::new(CERTIFICATE_OBSERVER),
            store,
            node_name: node_name.into(),
            certificates: Vec::new(),
            warning_days: None,
            error_days: None,
        }
    }

    fn severity_for(&self, days_remaining: i64) -> Severity {
        let days = days_remaining as f64;
        if let Some(error_days) = self.error_days {
            if days <= error_days {
                return Severity::Error;
            }
        }
        if let Some(warning_days) = self.warning_days {
            if days <= warning_days {
                return Severity::Warning;
            }
        }
        Severity::Ok
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<(), ObserverFault> {
        let certificates = self.certificates.clone();
        for name in certificates {
            let store = Arc::clone(&self.store);
            let looked_up = tokio::select! {
                _ = cancel.cancelled() => return Err(ObserverFault::Cancelled),
                result = store.days_until_expiry(&name) => result,
            };
            let days = match looked_up {
                Ok(days) => days,
                Err(err) => {
                    warn!("{}: lookup of '{}' failed: {}", CERTIFICATE_OBSERVER, name, err);
                    continue;
                }
            };

            let severity = self.severity_for(days);
            let message = match severity {
                Severity::Ok => {
                    format!("certificate '{}' expires in {} days", name, days)
                }
                _ => {
                    if days < 0 {
                        format!("certificate '{}' expired {} days ago", name, -days)
                    } else {
                        format!("certificate '{}' expires in only {} days", name, days)
                    }
                }
            };
            let source_id = SourceId::new(
                CERTIFICATE_OBSERVER,
                format!("Node:{}", self.node_name),
                format!("CertificateExpiry:{}", name),
            );
            self.core
                .commit_verdict(source_id, Entity::node(&self.node_name), severity, message);
        }
        Ok(())
    }
}

#[async_trait]
impl Observer for CertificateObserver {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    async fn initialize(&mut self, settings: &ObserverSettings) -> Result<(), ConfigError> {
        self.certificates = settings.get_list("certificates");
        self.core
            .set_enabled(settings.get_bool("enabled", !self.certificates.is_empty()));
        // Day horizons are counts; the shared policy filters nonsense.
        self.warning_days =
            threshold_enabled(settings.get_threshold("warning_days"), MetricDomain::Count);
        self.error_days =
            threshold_enabled(settings.get_threshold("error_days"), MetricDomain::Count);
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
