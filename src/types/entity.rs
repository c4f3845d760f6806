use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cluster entity a health verdict targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Application,
    Service,
    DeployedServicePackage,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "Node"),
            EntityKind::Application => write!(f, "Application"),
            EntityKind::Service => write!(f, "Service"),
            EntityKind::DeployedServicePackage => write!(f, "DeployedServicePackage"),
        }
    }
}

/// A named cluster entity (the target of a health report)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn node(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Node, name)
    }

    pub fn application(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Application, name)
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Service, name)
    }

    pub fn deployed_service_package(name: impl Into<String>) -> Self {
        Self::new(EntityKind::DeployedServicePackage, name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_display() {
        let entity = Entity::node("node-3");
        assert_eq!(entity.to_string(), "Node:node-3");

        let entity = Entity::application("fabric:/Billing");
        assert_eq!(entity.to_string(), "Application:fabric:/Billing");
    }
}
