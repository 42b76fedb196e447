//! Configuration for the toxicity classifier

use serde::{Deserialize, Serialize};
use std::time::Duration;
use toxscan_core::{Error, Result};

/// Default endpoint of the hosted moderation API
pub const DEFAULT_API_URL: &str = "https://api.moderatehatespeech.com/api/v1/moderate/";

/// Which classifier implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    /// Hosted moderation API
    #[default]
    Remote,
    /// Offline word-list classifier
    Lexicon,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Backend to use
    #[serde(default)]
    pub backend: ClassifierBackend,

    /// Scoring endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Credential sent with every request (required for the remote backend)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Confidence above which a `flag` result counts as severe.
    /// Used for logging and metrics only; every result is stored.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl ClassifierConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::config("classifier timeout_secs must be greater than zero"));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if self.backend == ClassifierBackend::Remote {
            if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(Error::config("remote classifier requires an api_key"));
            }
            if self.api_url.trim().is_empty() {
                return Err(Error::config("remote classifier requires an api_url"));
            }
        }

        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            api_url: default_api_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_confidence_threshold() -> f64 {
    0.9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: ClassifierConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.backend, ClassifierBackend::Remote);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.confidence_threshold, 0.9);
    }

    #[test]
    fn test_remote_requires_key() {
        let mut config = ClassifierConfig::default();
        assert!(config.validate().is_err());

        config.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lexicon_needs_no_key() {
        let config: ClassifierConfig = serde_yaml::from_str("backend: lexicon").unwrap();
        assert_eq!(config.backend, ClassifierBackend::Lexicon);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_range() {
        let config = ClassifierConfig {
            backend: ClassifierBackend::Lexicon,
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
