pub mod app;
pub mod certificate;
pub mod container;
pub mod disk;
pub mod mock;
pub mod node;
pub mod support;

pub use app::AppObserver;
pub use certificate::CertificateObserver;
pub use container::ContainerObserver;
pub use disk::DiskObserver;
pub use mock::{ScriptedMetricSource, ScriptedObserver, ScriptedProbe};
pub use node::NodeObserver;
pub use support::ObserverCore;
