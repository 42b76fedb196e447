//! Offline lexicon-based toxicity classifier

use crate::classifier::Classifier;
use async_trait::async_trait;
use std::collections::HashSet;
use toxscan_core::{ClassificationError, ToxicityResult};

const DEFAULT_TERMS: &[&str] = &[
    "hate", "stupid", "idiot", "dumb", "kill", "die", "worst", "terrible", "awful", "sucks",
    "garbage", "trash", "shit", "fuck", "damn", "hell", "asshole", "bastard", "bitch", "moron",
];

/// Word-list toxicity classifier.
///
/// Produces the same `flag`/`normal` labels as the hosted API so results are
/// interchangeable in storage. Intended for dry runs and local development.
pub struct LexiconClassifier {
    name: String,
    terms: HashSet<String>,
}

impl LexiconClassifier {
    /// Create a classifier with the built-in word list
    pub fn new() -> Self {
        Self::with_terms(DEFAULT_TERMS.iter().copied())
    }

    /// Create a classifier with a custom word list
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: "lexicon".to_string(),
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    fn toxicity_score(&self, text: &str) -> f64 {
        let matches = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .filter(|word| self.terms.contains(&word.to_lowercase()))
            .count() as f64;

        // Keep confidence bounded for lexicon-only approach.
        (matches * 0.35).clamp(0.0, 0.95)
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ToxicityResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }

        let score = self.toxicity_score(text);
        if score > 0.5 {
            Ok(ToxicityResult::new(ToxicityResult::FLAG, score))
        } else {
            Ok(ToxicityResult::new(ToxicityResult::NORMAL, 1.0 - score))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lexicon_classifier_normal() {
        let classifier = LexiconClassifier::new();

        let result = classifier.classify("great post").await.unwrap();
        assert_eq!(result.label, "normal");
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_lexicon_classifier_flag() {
        let classifier = LexiconClassifier::new();

        let result = classifier
            .classify("I hate you, you stupid idiot!")
            .await
            .unwrap();
        assert_eq!(result.label, "flag");
        assert!(result.confidence > 0.9);
    }

    #[tokio::test]
    async fn test_lexicon_matches_whole_words() {
        let classifier = LexiconClassifier::new();

        // "hell" inside "hello" and "die" inside "diet" must not count
        let result = classifier.classify("hello, how is the diet going").await.unwrap();
        assert_eq!(result.label, "normal");
    }

    #[tokio::test]
    async fn test_lexicon_custom_terms() {
        let classifier = LexiconClassifier::with_terms(["Spam", "scam"]);

        let result = classifier.classify("spam spam SCAM").await.unwrap();
        assert_eq!(result.label, "flag");
    }

    #[tokio::test]
    async fn test_lexicon_rejects_empty() {
        let classifier = LexiconClassifier::new();
        assert_eq!(
            classifier.classify("").await.unwrap_err(),
            ClassificationError::EmptyInput
        );
    }
}
