//! Core types for toxscan

use serde::{Deserialize, Serialize};

/// Well-known document field names
pub mod fields {
    /// Store-assigned document identifier
    pub const ID: &str = "_id";

    /// Per-item or per-reply toxicity result
    pub const TOXICITY: &str = "toxicity";

    /// Tri-state marker on flat records
    pub const TOXICITY_STATUS: &str = "toxicity_status";

    /// Thread-level processed marker
    pub const TOXICITY_PROCESSED: &str = "toxicity_processed";

    /// Thread-level aggregate summary
    pub const TOXICITY_SUMMARY: &str = "toxicity_summary";

    /// Creation time in epoch seconds
    pub const CREATED_UTC: &str = "created_utc";
}

/// Score returned by the classification service for one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityResult {
    /// Classification label, e.g. `flag` or `normal`
    #[serde(rename = "class")]
    pub label: String,

    /// Confidence in the label (0.0-1.0)
    pub confidence: f64,
}

impl ToxicityResult {
    /// Label the scoring service uses for toxic content
    pub const FLAG: &'static str = "flag";

    /// Label the scoring service uses for acceptable content
    pub const NORMAL: &'static str = "normal";

    /// Create a new toxicity result
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Whether this result is a flag at or above the severity threshold.
    ///
    /// Informational only: flagged and unflagged results are persisted the same way.
    pub fn is_flagged(&self, threshold: f64) -> bool {
        self.label == Self::FLAG && self.confidence > threshold
    }

    /// Serialize into the document representation
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Marker state of a flat record.
///
/// `Pending` is never written: it is the absence of the status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Pending,
    Scored,
    SkippedEmpty,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scored => "scored",
            Self::SkippedEmpty => "skipped_empty",
        }
    }

    /// Read the status from a document's `toxicity_status` field
    pub fn of(document: &serde_json::Map<String, serde_json::Value>) -> Self {
        match document
            .get(fields::TOXICITY_STATUS)
            .and_then(|v| v.as_str())
        {
            Some("scored") => Self::Scored,
            Some("skipped_empty") => Self::SkippedEmpty,
            _ if document.contains_key(fields::TOXICITY) => Self::Scored,
            _ => Self::Pending,
        }
    }
}

/// Aggregate over the replies of one thread that received a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub average_confidence: f64,
    pub max_confidence: f64,
    pub min_confidence: f64,
    pub scored_reply_count: usize,
    pub total_reply_count: usize,
}

impl ThreadSummary {
    /// Compute a summary from the confidences of scored replies.
    ///
    /// Returns `None` when nothing was scored.
    pub fn from_confidences(confidences: &[f64], total_reply_count: usize) -> Option<Self> {
        if confidences.is_empty() {
            return None;
        }

        let sum: f64 = confidences.iter().sum();
        let max = confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = confidences.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            average_confidence: sum / confidences.len() as f64,
            max_confidence: max,
            min_confidence: min,
            scored_reply_count: confidences.len(),
            total_reply_count,
        })
    }

    /// Serialize into the document representation
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_toxicity_result_wire_shape() {
        let result = ToxicityResult::new("flag", 0.95);
        assert_eq!(result.to_value().unwrap(), json!({"class": "flag", "confidence": 0.95}));

        let parsed: ToxicityResult =
            serde_json::from_value(json!({"class": "normal", "confidence": 0.1})).unwrap();
        assert_eq!(parsed, ToxicityResult::new("normal", 0.1));
    }

    #[test]
    fn test_is_flagged_threshold() {
        assert!(ToxicityResult::new("flag", 0.95).is_flagged(0.9));
        assert!(!ToxicityResult::new("flag", 0.9).is_flagged(0.9));
        assert!(!ToxicityResult::new("normal", 0.99).is_flagged(0.9));
    }

    #[test]
    fn test_score_status_of_document() {
        let doc = |v: serde_json::Value| v.as_object().cloned().unwrap();

        assert_eq!(ScoreStatus::of(&doc(json!({"text": "hi"}))), ScoreStatus::Pending);
        assert_eq!(
            ScoreStatus::of(&doc(json!({"toxicity_status": "skipped_empty"}))),
            ScoreStatus::SkippedEmpty
        );
        assert_eq!(
            ScoreStatus::of(&doc(json!({"toxicity": {"class": "normal", "confidence": 0.2}}))),
            ScoreStatus::Scored
        );
    }

    #[test]
    fn test_summary_single_reply() {
        let summary = ThreadSummary::from_confidences(&[0.8], 2).unwrap();
        assert_eq!(summary.average_confidence, 0.8);
        assert_eq!(summary.max_confidence, 0.8);
        assert_eq!(summary.min_confidence, 0.8);
        assert_eq!(summary.scored_reply_count, 1);
        assert_eq!(summary.total_reply_count, 2);
    }

    #[test]
    fn test_summary_wire_shape() {
        let summary = ThreadSummary::from_confidences(&[0.2, 0.6], 3).unwrap();
        assert_eq!(
            summary.to_value().unwrap(),
            json!({
                "average_confidence": 0.4,
                "max_confidence": 0.6,
                "min_confidence": 0.2,
                "scored_reply_count": 2,
                "total_reply_count": 3,
            })
        );
    }

    #[test]
    fn test_summary_absent_when_nothing_scored() {
        assert!(ThreadSummary::from_confidences(&[], 4).is_none());
    }

    proptest! {
        #[test]
        fn summary_matches_definition(
            scores in proptest::collection::vec(0.0f64..=1.0, 1..50),
            extra in 0usize..10,
        ) {
            let total = scores.len() + extra;
            let summary = ThreadSummary::from_confidences(&scores, total).unwrap();

            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            prop_assert!((summary.average_confidence - mean).abs() < 1e-9);
            prop_assert!(scores.iter().all(|s| *s <= summary.max_confidence));
            prop_assert!(scores.iter().all(|s| *s >= summary.min_confidence));
            prop_assert!(scores.contains(&summary.max_confidence));
            prop_assert!(scores.contains(&summary.min_confidence));
            prop_assert_eq!(summary.scored_reply_count, scores.len());
            prop_assert_eq!(summary.total_reply_count, total);
        }
    }
}
