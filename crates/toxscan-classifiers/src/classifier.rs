//! Classifier trait

use async_trait::async_trait;
use toxscan_core::{ClassificationError, ToxicityResult};

/// Trait for all toxicity classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Score the given text.
    ///
    /// Failures are returned, never raised: callers treat an error as
    /// "no result available this cycle".
    async fn classify(&self, text: &str) -> Result<ToxicityResult, ClassificationError>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
