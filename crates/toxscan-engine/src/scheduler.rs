//! Scheduling loop
//!
//! Runs every configured job once per cycle through a worker pool bounded by
//! `max_workers`, then sleeps for the poll interval. Each job opens its own
//! store connection, so a failing database only fails its own jobs.

use crate::flat::FlatBatchProcessor;
use crate::job::BatchJob;
use crate::metrics;
use crate::report::{CycleReport, JobKind, ProcessingReport};
use crate::thread::ThreadBatchProcessor;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use toxscan_classifiers::Classifier;
use toxscan_core::Error;
use toxscan_store::StoreConnector;
use tracing::{debug, info};

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sleep between cycles, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Jobs run concurrently within a cycle
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_workers: default_max_workers(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_workers() -> usize {
    5
}

/// Drives the batch processors
pub struct Scheduler {
    connector: Arc<dyn StoreConnector>,
    flat: FlatBatchProcessor,
    thread: ThreadBatchProcessor,
    jobs: Vec<BatchJob>,
    config: SchedulerConfig,
    cycles: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler sharing one classifier across all jobs
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        classifier: Arc<dyn Classifier>,
        jobs: Vec<BatchJob>,
        config: SchedulerConfig,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            connector,
            flat: FlatBatchProcessor::new(classifier.clone(), confidence_threshold),
            thread: ThreadBatchProcessor::new(classifier, confidence_threshold),
            jobs,
            config,
            cycles: AtomicU64::new(0),
        }
    }

    /// Cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Run every job once and wait for all of them
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(cycle, jobs = self.jobs.len(), "Starting cycle");

        let reports: Vec<ProcessingReport> = stream::iter(self.jobs.iter().cloned())
            .map(|job| self.spawn_job(job))
            .buffer_unordered(self.config.max_workers.max(1))
            .collect()
            .await;

        let report = CycleReport::new(cycle, reports, start.elapsed());
        report.log();
        metrics::record_cycle();
        report
    }

    /// Run cycles until the future is dropped
    pub async fn run(&self) {
        info!(
            jobs = self.jobs.len(),
            max_workers = self.config.max_workers,
            poll_interval_secs = self.config.poll_interval_secs,
            "Scheduler started"
        );

        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Run one job on its own task so a panic is contained to its report
    async fn spawn_job(&self, job: BatchJob) -> ProcessingReport {
        let label = job.label();
        let kind = match job {
            BatchJob::Flat(_) => JobKind::Flat,
            BatchJob::Thread(_) => JobKind::Thread,
        };

        let connector = self.connector.clone();
        let flat = self.flat.clone();
        let thread = self.thread.clone();

        let handle = tokio::spawn(async move {
            let store = match connector.connect(job.database()).await {
                Ok(store) => store,
                Err(e) => return ProcessingReport::failed(kind, job.label(), e),
            };

            match job {
                BatchJob::Flat(ref flat_job) => flat.process(store.as_ref(), flat_job).await,
                BatchJob::Thread(ref thread_job) => thread.process(store.as_ref(), thread_job).await,
            }
        });

        match handle.await {
            Ok(report) => report,
            Err(e) => ProcessingReport::failed(kind, label, Error::internal(format!("job task failed: {e}"))),
        }
    }
}
