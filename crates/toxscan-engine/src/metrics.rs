//! Metrics recorded by the batch processors
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use crate::report::ProcessingReport;

pub const ITEMS_SCORED: &str = "toxscan_items_scored_total";
pub const ITEMS_FLAGGED: &str = "toxscan_flagged_total";
pub const ITEMS_SKIPPED: &str = "toxscan_items_skipped_total";
pub const ITEMS_UNREADABLE: &str = "toxscan_items_unreadable_total";
pub const CLASSIFICATION_FAILURES: &str = "toxscan_classification_failures_total";
pub const BATCH_ERRORS: &str = "toxscan_batch_errors_total";
pub const BATCH_LATENCY: &str = "toxscan_batch_latency_us";
pub const CYCLES: &str = "toxscan_cycles_total";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(ITEMS_SCORED, "Items and replies that received a toxicity result");
    metrics::describe_counter!(
        ITEMS_FLAGGED,
        "Scored items flagged above the confidence threshold"
    );
    metrics::describe_counter!(ITEMS_SKIPPED, "Items and replies skipped for empty content");
    metrics::describe_counter!(ITEMS_UNREADABLE, "Items left pending because their text is not a string");
    metrics::describe_counter!(
        CLASSIFICATION_FAILURES,
        "Classification attempts that returned an error, by kind"
    );
    metrics::describe_counter!(BATCH_ERRORS, "Batch jobs that failed to select or persist");
    metrics::describe_histogram!(
        BATCH_LATENCY,
        metrics::Unit::Microseconds,
        "Batch job latency in microseconds"
    );
    metrics::describe_counter!(CYCLES, "Completed scheduler cycles");
}

/// Count one classification failure
pub(crate) fn record_classification_failure(job: &str, kind: &'static str) {
    metrics::counter!(CLASSIFICATION_FAILURES, "job" => job.to_string(), "kind" => kind).increment(1);
}

/// Record the counters of a finished batch job
pub(crate) fn record_report(report: &ProcessingReport) {
    let job = report.job.clone();
    let kind = report.kind.as_str();

    metrics::counter!(ITEMS_SCORED, "job" => job.clone(), "kind" => kind).increment(report.scored as u64);
    metrics::counter!(ITEMS_FLAGGED, "job" => job.clone(), "kind" => kind).increment(report.flagged as u64);
    metrics::counter!(ITEMS_SKIPPED, "job" => job.clone(), "kind" => kind)
        .increment(report.skipped_empty as u64);
    metrics::counter!(ITEMS_UNREADABLE, "job" => job.clone(), "kind" => kind)
        .increment(report.unreadable as u64);
    metrics::histogram!(BATCH_LATENCY, "job" => job.clone(), "kind" => kind)
        .record(report.latency.as_micros() as f64);

    if !report.is_success() {
        metrics::counter!(BATCH_ERRORS, "job" => job, "kind" => kind).increment(1);
    }
}

/// Record a finished cycle
pub(crate) fn record_cycle() {
    metrics::counter!(CYCLES).increment(1);
}
