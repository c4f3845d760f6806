use crate::metrics::ThresholdPair;
use log::warn;
use std::collections::HashMap;
use std::time::Duration;

/// Flat key/value settings section for one observer.
///
/// All accessors degrade: an absent, blank, or malformed value falls back
/// to the supplied default with a logged warning. Bad configuration slows
/// nobody down and crashes nothing.
#[derive(Debug, Clone, Default)]
pub struct ObserverSettings {
    values: HashMap<String, String>,
}

impl ObserverSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value, with blank treated as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.to_ascii_lowercase().parse::<bool>() {
                Ok(value) => value,
                Err(_) => {
                    warn!("setting '{}' has non-boolean value '{}', using {}", key, raw, default);
                    default
                }
            },
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!("setting '{}' has non-numeric value '{}', using {}", key, raw, default);
                    default
                }
            },
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!("setting '{}' has non-integer value '{}', using {}", key, raw, default);
                    default
                }
            },
        }
    }

    pub fn get_duration_secs(&self, key: &str, default: Duration) -> Duration {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(
                        "setting '{}' has non-integer value '{}', using {:?}",
                        key, raw, default
                    );
                    default
                }
            },
        }
    }

    /// Threshold level: absent or malformed means "not configured".
    ///
    /// Domain validation (negative, zero, over-100-percent) happens later
    /// in the shared evaluate policy, so a nonsense-but-parseable value
    /// flows through as configured-then-disabled rather than erroring here.
    pub fn get_threshold(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            None => None,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("threshold '{}' has non-numeric value '{}', disabling check", key, raw);
                    None
                }
            },
        }
    }

    /// Threshold pair from a pair of keys
    pub fn get_threshold_pair(&self, warning_key: &str, error_key: &str) -> ThresholdPair {
        ThresholdPair::new(self.get_threshold(warning_key), self.get_threshold(error_key))
    }

    /// Comma-separated list value
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Top-level agent settings: scheduler knobs plus one section per observer
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub node_name: String,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
    pub max_consecutive_failures: u32,
    sections: HashMap<String, ObserverSettings>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            node_name: "node-0".to_string(),
            poll_interval: Duration::from_secs(60),
            run_timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
            sections: HashMap::new(),
        }
    }
}

impl AgentSettings {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    pub fn set_section(&mut self, observer: impl Into<String>, settings: ObserverSettings) {
        self.sections.insert(observer.into(), settings);
    }

    /// Settings section for one observer; empty section if none configured
    pub fn section(&self, observer: &str) -> ObserverSettings {
        self.sections.get(observer).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_means_default() {
        let settings = ObserverSettings::from_pairs([("poll_interval_secs", "  ")]);
        assert_eq!(
            settings.get_duration_secs("poll_interval_secs", Duration::from_secs(60)),
            Duration::from_secs(60)
        );
        assert!(settings.get("poll_interval_secs").is_none());
    }

    #[test]
    fn test_malformed_degrades_to_default() {
        let settings = ObserverSettings::from_pairs([
            ("enabled", "yes-please"),
            ("cpu_warning", "eighty"),
            ("window", "12.5"),
        ]);
        assert!(settings.get_bool("enabled", true));
        assert_eq!(settings.get_threshold("cpu_warning"), None);
        assert_eq!(settings.get_u64("window", 12), 12);
    }

    #[test]
    fn test_threshold_pair_parses_both_sides() {
        let settings =
            ObserverSettings::from_pairs([("cpu_warning", "80"), ("cpu_error", "95")]);
        let pair = settings.get_threshold_pair("cpu_warning", "cpu_error");
        assert_eq!(pair.warning, Some(80.0));
        assert_eq!(pair.error, Some(95.0));
    }

    #[test]
    fn test_negative_threshold_flows_through() {
        // Parseable-but-nonsense levels are a policy question for the
        // evaluator, not a parse error here.
        let settings = ObserverSettings::from_pairs([("cpu_warning", "-1000")]);
        assert_eq!(settings.get_threshold("cpu_warning"), Some(-1000.0));
    }

    #[test]
    fn test_list_values() {
        let settings =
            ObserverSettings::from_pairs([("volumes", " /data , /var/log ,, ")]);
        assert_eq!(settings.get_list("volumes"), vec!["/data", "/var/log"]);
        assert!(settings.get_list("missing").is_empty());
    }

    #[test]
    fn test_missing_section_is_empty() {
        let agent = AgentSettings::default();
        let section = agent.section("NodeObserver");
        assert!(section.get("anything").is_none());
    }
}
