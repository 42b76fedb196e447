//! Threaded-aggregate batch processor
//!
//! Scores every reply of a window of threads, largest threads first, and
//! marks each thread processed together with a summary over the replies that
//! were scored. A thread is processed once: replies whose classification
//! failed are not retried.

use crate::job::ThreadJob;
use crate::metrics;
use crate::report::{JobKind, ProcessingReport};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use toxscan_classifiers::Classifier;
use toxscan_core::{fields, ClassificationError, ThreadSummary, ToxicityResult};
use toxscan_store::{Document, DocumentStore, FindQuery, SortKey, SortOrder, UpdateOne};
use tracing::{debug, info, warn};

/// What happened to one reply; every variant carries the reply to write back
enum ReplyOutcome {
    Scored { reply: Value, result: ToxicityResult, value: Value },
    Empty { reply: Value },
    Failed { reply: Value, error: ClassificationError },
}

/// Counters for one thread
#[derive(Default)]
struct ThreadTally {
    scored: usize,
    flagged: usize,
    skipped_empty: usize,
    failures: usize,
}

/// Scores threads of one collection per call
#[derive(Clone)]
pub struct ThreadBatchProcessor {
    classifier: Arc<dyn Classifier>,
    confidence_threshold: f64,
}

impl ThreadBatchProcessor {
    /// Create a processor; `confidence_threshold` only affects the flagged count
    pub fn new(classifier: Arc<dyn Classifier>, confidence_threshold: f64) -> Self {
        Self {
            classifier,
            confidence_threshold,
        }
    }

    /// Selection for unprocessed threads, largest first
    pub fn selection(job: &ThreadJob) -> FindQuery {
        FindQuery::new()
            .missing(fields::TOXICITY_PROCESSED)
            .sort_by(SortKey::Length(job.replies_field.clone()), SortOrder::Descending)
            .limit(job.batch_size)
    }

    /// Run one batch against `store`
    pub async fn process(&self, store: &dyn DocumentStore, job: &ThreadJob) -> ProcessingReport {
        let start = Instant::now();
        let label = job.label();
        let mut report = ProcessingReport::new(JobKind::Thread, label.clone());

        let threads = match store.find(&job.collection, &Self::selection(job)).await {
            Ok(threads) => threads,
            Err(e) => {
                report.error = Some(e);
                report.latency = start.elapsed();
                metrics::record_report(&report);
                return report;
            }
        };
        report.selected = threads.len();

        let mut updates = Vec::with_capacity(threads.len());
        for thread in threads {
            let Some(thread_id) = thread.get(fields::ID).filter(|id| !id.is_null()).cloned() else {
                warn!(job = %label, "Skipping thread without an id");
                continue;
            };

            let (update, tally) = self.process_thread(thread_id, thread, job, &label).await;

            report.scored += tally.scored;
            report.flagged += tally.flagged;
            report.skipped_empty += tally.skipped_empty;
            report.classification_failures += tally.failures;
            if tally.scored == 0 {
                report.unscored_threads += 1;
            }
            updates.push(update);
        }

        report.staged_updates = updates.len();
        if !updates.is_empty() {
            match store.bulk_update(&job.collection, updates).await {
                Ok(write) => {
                    info!(
                        job = %label,
                        threads = report.selected,
                        replies_scored = report.scored,
                        failures = report.classification_failures,
                        matched = write.matched,
                        "Batch update complete"
                    );
                    report.write = Some(write);
                }
                Err(e) => report.error = Some(e),
            }
        } else {
            debug!(job = %label, "No unprocessed threads");
        }

        report.latency = start.elapsed();
        metrics::record_report(&report);
        report
    }

    /// Score one thread and build its update
    async fn process_thread(
        &self,
        thread_id: Value,
        mut thread: Document,
        job: &ThreadJob,
        label: &str,
    ) -> (UpdateOne, ThreadTally) {
        // Anything other than a reply list is left as stored.
        let replies = match thread.remove(&job.replies_field) {
            Some(Value::Array(replies)) => Some(replies),
            Some(other) => {
                warn!(
                    job = %label,
                    thread = %thread_id,
                    field = %job.replies_field,
                    kind = value_kind(&other),
                    "Reply field is not a list, thread has no replies to score"
                );
                None
            }
            None => None,
        };
        let has_reply_list = replies.is_some();
        let replies = replies.unwrap_or_default();
        let total = replies.len();

        // `buffered` keeps reply order even when classifying concurrently.
        let outcomes: Vec<ReplyOutcome> = stream::iter(replies)
            .map(|reply| self.score_reply(reply, job, &thread_id, label))
            .buffered(job.classify_concurrency.max(1))
            .collect()
            .await;

        let mut tally = ThreadTally::default();
        let mut confidences = Vec::new();
        let mut enriched = Vec::with_capacity(total);

        for outcome in outcomes {
            match outcome {
                ReplyOutcome::Scored { mut reply, result, value } => {
                    tally.scored += 1;
                    if result.is_flagged(self.confidence_threshold) {
                        tally.flagged += 1;
                    }
                    confidences.push(result.confidence);
                    if let Value::Object(ref mut fields_map) = reply {
                        fields_map.insert(fields::TOXICITY.to_string(), value);
                    }
                    enriched.push(reply);
                }
                ReplyOutcome::Empty { reply } => {
                    tally.skipped_empty += 1;
                    enriched.push(reply);
                }
                ReplyOutcome::Failed { reply, error } => {
                    tally.failures += 1;
                    metrics::record_classification_failure(label, error.kind());
                    enriched.push(reply);
                }
            }
        }

        let summary = ThreadSummary::from_confidences(&confidences, total);
        debug!(
            job = %label,
            thread = %thread_id,
            replies = total,
            scored = tally.scored,
            "Thread scored"
        );

        let summary = match summary.as_ref().map(ThreadSummary::to_value).transpose() {
            Ok(summary) => summary.unwrap_or(Value::Null),
            Err(e) => {
                warn!(job = %label, thread = %thread_id, error = %e, "Failed to encode thread summary");
                Value::Null
            }
        };

        let mut update = UpdateOne::new(thread_id)
            .set(fields::TOXICITY_PROCESSED, Value::Bool(true))
            .set(fields::TOXICITY_SUMMARY, summary);
        if has_reply_list {
            update = update.set(job.replies_field.clone(), Value::Array(enriched));
        }

        (update, tally)
    }

    async fn score_reply(
        &self,
        reply: Value,
        job: &ThreadJob,
        thread_id: &Value,
        label: &str,
    ) -> ReplyOutcome {
        let content = reply
            .get(&job.reply_text_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            debug!(
                job = %label,
                thread = %thread_id,
                reply = %reply_id(&reply, job),
                "Skipping reply due to empty content"
            );
            return ReplyOutcome::Empty { reply };
        }

        let scored = self.classifier.classify(content).await.and_then(|result| {
            let value = result
                .to_value()
                .map_err(|e| ClassificationError::Malformed(e.to_string()))?;
            Ok((result, value))
        });

        match scored {
            Ok((result, value)) => ReplyOutcome::Scored { reply, result, value },
            Err(error) => {
                warn!(
                    job = %label,
                    thread = %thread_id,
                    reply = %reply_id(&reply, job),
                    error = %error,
                    "Classification failed, reply left unscored"
                );
                ReplyOutcome::Failed { reply, error }
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn reply_id(reply: &Value, job: &ThreadJob) -> Value {
    reply.get(&job.reply_id_field).cloned().unwrap_or(Value::Null)
}
