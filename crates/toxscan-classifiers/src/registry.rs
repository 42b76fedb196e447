//! Classifier construction from configuration

use crate::{
    config::{ClassifierBackend, ClassifierConfig},
    remote::RemoteClassifier,
    toxicity::LexiconClassifier,
    Classifier,
};
use std::sync::Arc;
use toxscan_core::Result;
use tracing::info;

/// Build the configured classifier.
///
/// The configuration is validated first, so a remote backend without a
/// credential is rejected here rather than on the first request.
pub fn build_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    config.validate()?;

    let classifier: Arc<dyn Classifier> = match config.backend {
        ClassifierBackend::Remote => {
            let remote = RemoteClassifier::from_config(config)?;
            info!(url = %remote.api_url(), timeout_secs = config.timeout_secs, "Using remote classifier");
            Arc::new(remote)
        }
        ClassifierBackend::Lexicon => {
            info!("Using offline lexicon classifier");
            Arc::new(LexiconClassifier::new())
        }
    };

    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_lexicon() {
        let config = ClassifierConfig {
            backend: ClassifierBackend::Lexicon,
            ..Default::default()
        };
        let classifier = build_classifier(&config).unwrap();
        assert_eq!(classifier.name(), "lexicon");
    }

    #[test]
    fn test_build_remote() {
        let config = ClassifierConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let classifier = build_classifier(&config).unwrap();
        assert_eq!(classifier.name(), "moderatehatespeech");
    }

    #[test]
    fn test_build_remote_without_key_fails() {
        assert!(build_classifier(&ClassifierConfig::default()).is_err());
    }
}
