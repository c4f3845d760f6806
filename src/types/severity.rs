use serde::{Deserialize, Serialize};
use std::fmt;

/// Health verdict severity
///
/// Ordered so that `Ok < Warning < Error`, which lets callers take the
/// worst of several verdicts with `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// Whether this verdict represents a healthy state
    pub fn is_ok(&self) -> bool {
        matches!(self, Severity::Ok)
    }

    /// Whether this verdict should be tracked as active in a ledger
    pub fn is_active(&self) -> bool {
        !self.is_ok()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "Ok"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(
            Severity::Warning.max(Severity::Error),
            Severity::Error
        );
    }

    #[test]
    fn test_severity_active() {
        assert!(!Severity::Ok.is_active());
        assert!(Severity::Warning.is_active());
        assert!(Severity::Error.is_active());
    }
}
