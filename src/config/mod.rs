pub mod overrides;
pub mod settings;

pub use overrides::{load_overrides, EntityOverride};
pub use settings::{AgentSettings, ObserverSettings};

use std::fmt;

/// Configuration error.
///
/// Malformed individual values never produce this; typed accessors
/// degrade to defaults. It is reserved for structurally broken inputs
/// such as an unparseable overrides side-file, and even then it only
/// disables the affected observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An overrides side-file exists but cannot be read
    UnreadableOverrides { path: String, detail: String },
    /// An overrides side-file exists but is not valid JSON of the
    /// expected shape
    InvalidOverrides { path: String, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnreadableOverrides { path, detail } => {
                write!(f, "cannot read overrides file '{}': {}", path, detail)
            }
            ConfigError::InvalidOverrides { path, detail } => {
                write!(f, "overrides file '{}' is malformed: {}", path, detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
