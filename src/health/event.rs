use crate::types::{now_millis, Entity, Severity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a health condition.
///
/// A later event with the same source id supersedes the earlier one in the
/// sink, which is what makes raise/clear pairing work: the id must not
/// change between the raise and its eventual clear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub observer: String,
    pub entity: String,
    pub property: String,
}

impl SourceId {
    pub fn new(
        observer: impl Into<String>,
        entity: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            observer: observer.into(),
            entity: entity.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.observer, self.entity, self.property)
    }
}

/// One health verdict, publishable to the external health system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub source: SourceId,
    pub severity: Severity,
    pub message: String,
    pub entity: Entity,
    pub timestamp: Timestamp,
}

impl HealthEvent {
    pub fn new(
        source: SourceId,
        severity: Severity,
        message: impl Into<String>,
        entity: Entity,
    ) -> Self {
        Self {
            source,
            severity,
            message: message.into(),
            entity,
            timestamp: now_millis(),
        }
    }

    /// Synthesized clear for a previously raised condition
    pub fn clear(source: SourceId, entity: Entity) -> Self {
        let message = format!("{} has returned to healthy state", source.property);
        Self::new(source, Severity::Ok, message, entity)
    }
}
