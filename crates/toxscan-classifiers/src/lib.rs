//! toxscan Classifiers
//!
//! Toxicity scoring behind a single async [`Classifier`] trait.
//!
//! Two backends are provided:
//! - [`RemoteClassifier`]: the hosted moderation API, one HTTP request per text
//! - [`LexiconClassifier`]: an offline word-list scorer for dry runs
//!
//! Both return a [`ToxicityResult`](toxscan_core::ToxicityResult) or a
//! [`ClassificationError`](toxscan_core::ClassificationError); neither panics
//! or retries.

pub mod classifier;
pub mod config;
pub mod registry;
pub mod remote;
pub mod toxicity;

pub use classifier::Classifier;
pub use config::{ClassifierBackend, ClassifierConfig};
pub use registry::build_classifier;
pub use remote::RemoteClassifier;
pub use toxicity::LexiconClassifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::config::ClassifierConfig;
    pub use crate::remote::RemoteClassifier;
    pub use crate::toxicity::LexiconClassifier;
}
