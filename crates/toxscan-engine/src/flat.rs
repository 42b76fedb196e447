//! Flat-record batch processor
//!
//! Scores a bounded window of independent records and persists every result
//! in one bulk update. A record leaves the window once it carries a
//! `toxicity_status` (or a legacy `toxicity` field).

use crate::job::FlatJob;
use crate::metrics;
use crate::report::{JobKind, ProcessingReport};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use toxscan_classifiers::Classifier;
use toxscan_core::{fields, normalize_value, ClassificationError, ScoreStatus, ToxicityResult};
use toxscan_store::{Document, DocumentStore, FindQuery, UpdateOne};
use tracing::{debug, info, warn};

/// What happened to one selected record
enum ItemOutcome {
    Scored { id: Value, result: ToxicityResult, value: Value },
    Empty { id: Value },
    Unreadable,
    Failed { error: ClassificationError },
    NoId,
}

/// Scores flat records of one collection per call
#[derive(Clone)]
pub struct FlatBatchProcessor {
    classifier: Arc<dyn Classifier>,
    confidence_threshold: f64,
}

impl FlatBatchProcessor {
    /// Create a processor; `confidence_threshold` only affects the flagged count
    pub fn new(classifier: Arc<dyn Classifier>, confidence_threshold: f64) -> Self {
        Self {
            classifier,
            confidence_threshold,
        }
    }

    /// Selection for unscored records
    pub fn selection(job: &FlatJob) -> FindQuery {
        FindQuery::new()
            .missing(fields::TOXICITY_STATUS)
            .missing(fields::TOXICITY)
            .limit(job.batch_size)
    }

    /// Run one batch against `store`
    pub async fn process(&self, store: &dyn DocumentStore, job: &FlatJob) -> ProcessingReport {
        let start = Instant::now();
        let label = job.label();
        let mut report = ProcessingReport::new(JobKind::Flat, label.clone());

        let documents = match store.find(&job.collection, &Self::selection(job)).await {
            Ok(documents) => documents,
            Err(e) => {
                report.error = Some(e);
                report.latency = start.elapsed();
                metrics::record_report(&report);
                return report;
            }
        };
        report.selected = documents.len();

        let outcomes: Vec<ItemOutcome> = stream::iter(documents)
            .map(|document| {
                let label = &label;
                async move { self.score_document(&document, job, label).await }
            })
            .buffer_unordered(job.classify_concurrency.max(1))
            .collect()
            .await;

        let mut updates = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Scored { id, result, value } => {
                    report.scored += 1;
                    if result.is_flagged(self.confidence_threshold) {
                        report.flagged += 1;
                    }
                    updates.push(
                        UpdateOne::new(id)
                            .set(fields::TOXICITY, value)
                            .set(fields::TOXICITY_STATUS, status_value(ScoreStatus::Scored)),
                    );
                }
                ItemOutcome::Empty { id } => {
                    report.skipped_empty += 1;
                    if job.mark_empty {
                        updates.push(
                            UpdateOne::new(id)
                                .set(fields::TOXICITY_STATUS, status_value(ScoreStatus::SkippedEmpty)),
                        );
                    }
                }
                ItemOutcome::Unreadable => report.unreadable += 1,
                ItemOutcome::Failed { error } => {
                    report.classification_failures += 1;
                    metrics::record_classification_failure(&label, error.kind());
                }
                ItemOutcome::NoId => {}
            }
        }

        report.staged_updates = updates.len();
        if !updates.is_empty() {
            match store.bulk_update(&job.collection, updates).await {
                Ok(write) => {
                    info!(
                        job = %label,
                        selected = report.selected,
                        scored = report.scored,
                        skipped_empty = report.skipped_empty,
                        unreadable = report.unreadable,
                        failures = report.classification_failures,
                        matched = write.matched,
                        "Batch update complete"
                    );
                    report.write = Some(write);
                }
                Err(e) => report.error = Some(e),
            }
        } else {
            debug!(job = %label, selected = report.selected, "Nothing to persist");
        }

        report.latency = start.elapsed();
        metrics::record_report(&report);
        report
    }

    async fn score_document(&self, document: &Document, job: &FlatJob, label: &str) -> ItemOutcome {
        let Some(id) = document.get(fields::ID).filter(|id| !id.is_null()).cloned() else {
            warn!(job = %label, "Skipping document without an id");
            return ItemOutcome::NoId;
        };

        // A missing field is empty content; any other non-string is left pending.
        let content = match document.get(&job.text_field) {
            None => "",
            Some(Value::String(text)) => text.trim(),
            Some(_) => {
                warn!(
                    job = %label,
                    id = %id,
                    field = %job.text_field,
                    "Text field is not a string, document stays pending"
                );
                return ItemOutcome::Unreadable;
            }
        };

        if content.is_empty() {
            debug!(job = %label, id = %id, "Skipping document due to empty content");
            return ItemOutcome::Empty { id };
        }

        let post_date = normalize_value(document.get(fields::CREATED_UTC));

        let scored = self.classifier.classify(content).await.and_then(|result| {
            let value = result
                .to_value()
                .map_err(|e| ClassificationError::Malformed(e.to_string()))?;
            Ok((result, value))
        });

        match scored {
            Ok((result, value)) => {
                debug!(
                    job = %label,
                    id = %id,
                    date = %post_date,
                    label = %result.label,
                    confidence = result.confidence,
                    "Scored document"
                );
                ItemOutcome::Scored { id, result, value }
            }
            Err(error) => {
                warn!(
                    job = %label,
                    id = %id,
                    error = %error,
                    "Classification failed, document stays pending"
                );
                ItemOutcome::Failed { error }
            }
        }
    }
}

fn status_value(status: ScoreStatus) -> Value {
    Value::String(status.as_str().to_string())
}
