pub mod observer;
pub mod sink;
pub mod source;

pub use observer::{Observer, ObserverFault, ReportFault, RunStamp};
pub use sink::{HealthSink, SinkError};
pub use source::{CertificateStore, MetricSource, SourceError};
