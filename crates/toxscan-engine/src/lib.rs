//! toxscan Engine
//!
//! Incremental toxicity scoring over a document store.
//!
//! Each cycle the [`Scheduler`] runs every configured batch job through a
//! bounded worker pool:
//! - [`FlatBatchProcessor`]: independent records (comments, posts)
//! - [`ThreadBatchProcessor`]: threads whose replies are scored and summarized
//!
//! A job selects a window of unprocessed documents, scores them one by one
//! (a failed score never fails the batch), and persists every result with a
//! single bulk update that also sets the processed marker.

pub mod flat;
pub mod job;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod thread;

pub use flat::FlatBatchProcessor;
pub use job::{BatchJob, FlatJob, ThreadJob};
pub use report::{CycleReport, JobKind, ProcessingReport};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use thread::ThreadBatchProcessor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::job::{BatchJob, FlatJob, ThreadJob};
    pub use crate::report::{CycleReport, ProcessingReport};
    pub use crate::scheduler::{Scheduler, SchedulerConfig};
}
