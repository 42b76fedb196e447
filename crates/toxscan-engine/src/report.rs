//! Batch and cycle reports

use std::time::Duration;
use toxscan_core::Error;
use toxscan_store::BulkWriteResult;
use tracing::{error, info};

/// Which processor produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Flat,
    Thread,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Thread => "thread",
        }
    }
}

/// Outcome of one batch job.
///
/// Per-item failures are counted; only selection and persistence failures
/// set `error`, and when they do nothing from this batch was committed.
#[derive(Debug)]
pub struct ProcessingReport {
    /// `database.collection`
    pub job: String,

    /// Processor kind
    pub kind: JobKind,

    /// Documents in the selection window (records or threads)
    pub selected: usize,

    /// Items or replies that received a result
    pub scored: usize,

    /// Scored items above the severity threshold
    pub flagged: usize,

    /// Items or replies with no text
    pub skipped_empty: usize,

    /// Items or replies whose classification failed
    pub classification_failures: usize,

    /// Records whose text field is not a string; left pending
    pub unreadable: usize,

    /// Threads marked processed with no scored reply
    pub unscored_threads: usize,

    /// Updates handed to the bulk write
    pub staged_updates: usize,

    /// Bulk write outcome, if one was issued and succeeded
    pub write: Option<BulkWriteResult>,

    /// Batch-level failure
    pub error: Option<Error>,

    /// Wall time of the job
    pub latency: Duration,
}

impl ProcessingReport {
    /// Create an empty report
    pub fn new(kind: JobKind, job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            kind,
            selected: 0,
            scored: 0,
            flagged: 0,
            skipped_empty: 0,
            classification_failures: 0,
            unreadable: 0,
            unscored_threads: 0,
            staged_updates: 0,
            write: None,
            error: None,
            latency: Duration::ZERO,
        }
    }

    /// Create a report for a job that failed before selecting anything
    pub fn failed(kind: JobKind, job: impl Into<String>, error: Error) -> Self {
        let mut report = Self::new(kind, job);
        report.error = Some(error);
        report
    }

    /// Whether the batch completed without a batch-level error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Documents whose marker was written this cycle
    pub fn committed(&self) -> usize {
        self.write.map_or(0, |w| w.matched)
    }
}

/// Aggregate of every job run in one scheduler cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,

    /// Per-job reports, in completion order
    pub reports: Vec<ProcessingReport>,

    /// Wall time of the cycle
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn new(cycle: u64, reports: Vec<ProcessingReport>, elapsed: Duration) -> Self {
        Self {
            cycle,
            reports,
            elapsed,
        }
    }

    /// Total items or replies scored
    pub fn scored(&self) -> usize {
        self.reports.iter().map(|r| r.scored).sum()
    }

    /// Total documents marked processed
    pub fn committed(&self) -> usize {
        self.reports.iter().map(|r| r.committed()).sum()
    }

    /// Total classification failures
    pub fn classification_failures(&self) -> usize {
        self.reports.iter().map(|r| r.classification_failures).sum()
    }

    /// Reports of jobs that failed at batch level
    pub fn failed_jobs(&self) -> impl Iterator<Item = &ProcessingReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }

    /// Whether every job completed
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(ProcessingReport::is_success)
    }

    /// Look up a job's report by label
    pub fn report(&self, job: &str) -> Option<&ProcessingReport> {
        self.reports.iter().find(|r| r.job == job)
    }

    /// Emit the cycle summary and any batch failures
    pub fn log(&self) {
        for report in self.failed_jobs() {
            if let Some(ref e) = report.error {
                error!(
                    cycle = self.cycle,
                    job = %report.job,
                    kind = report.kind.as_str(),
                    error = %e,
                    "Batch job failed, documents stay pending"
                );
            }
        }

        info!(
            cycle = self.cycle,
            jobs = self.reports.len(),
            failed_jobs = self.failed_jobs().count(),
            scored = self.scored(),
            committed = self.committed(),
            classification_failures = self.classification_failures(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Cycle complete"
        );
    }
}
