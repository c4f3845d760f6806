pub mod entity;
pub mod severity;

pub use entity::{Entity, EntityKind};
pub use severity::Severity;

/// Timestamp in milliseconds
pub type Timestamp = u64;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
