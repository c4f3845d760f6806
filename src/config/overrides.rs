use crate::config::ConfigError;
use crate::metrics::ThresholdPair;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Entity-scoped threshold overrides from a per-observer JSON side-file.
///
/// The file holds an array of these; thresholds left out of an entry fall
/// back to the observer's section-level defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOverride {
    pub entity: String,
    #[serde(default)]
    pub cpu: ThresholdPair,
    #[serde(default)]
    pub memory: ThresholdPair,
}

impl EntityOverride {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            cpu: ThresholdPair::disabled(),
            memory: ThresholdPair::disabled(),
        }
    }
}

/// Load entity overrides from a JSON side-file.
///
/// A missing file means "no overrides" and succeeds with an empty list; a
/// file that exists but cannot be read or parsed is a ConfigError the
/// caller surfaces through `initialize`.
pub fn load_overrides(path: &Path) -> Result<Vec<EntityOverride>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::UnreadableOverrides {
        path: path.display().to_string(),
        detail: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| ConfigError::InvalidOverrides {
        path: path.display().to_string(),
        detail: err.to_string(),
    })
}
