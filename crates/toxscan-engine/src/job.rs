//! Batch job definitions

use serde::{Deserialize, Serialize};

/// Score independent records of one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatJob {
    /// Database holding the collection
    pub database: String,

    /// Collection to score
    pub collection: String,

    /// Field containing the text to score
    #[serde(default = "default_text_field")]
    pub text_field: String,

    /// Maximum records selected per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Mark empty records `skipped_empty` so they leave the selection window.
    /// When false they stay pending and are re-selected every cycle.
    #[serde(default = "default_true")]
    pub mark_empty: bool,

    /// Records classified concurrently within one batch
    #[serde(default = "default_concurrency")]
    pub classify_concurrency: usize,
}

impl FlatJob {
    /// Create a job with default settings
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        text_field: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            text_field: text_field.into(),
            batch_size: default_batch_size(),
            mark_empty: true,
            classify_concurrency: default_concurrency(),
        }
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the empty-content policy
    pub fn with_mark_empty(mut self, mark_empty: bool) -> Self {
        self.mark_empty = mark_empty;
        self
    }

    /// Set per-batch classification concurrency
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.classify_concurrency = concurrency;
        self
    }

    /// `database.collection`
    pub fn label(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// What happens to records with empty text, for logging
    pub fn empty_policy(&self) -> &'static str {
        if self.mark_empty {
            "mark_skipped"
        } else {
            "leave_pending"
        }
    }
}

/// Score every reply of the threads in one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadJob {
    /// Database holding the collection
    pub database: String,

    /// Collection of thread documents
    pub collection: String,

    /// Maximum threads selected per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Field holding the reply list
    #[serde(default = "default_replies_field")]
    pub replies_field: String,

    /// Field of a reply containing its text
    #[serde(default = "default_reply_text_field")]
    pub reply_text_field: String,

    /// Field of a reply identifying it (logging only)
    #[serde(default = "default_reply_id_field")]
    pub reply_id_field: String,

    /// Replies classified concurrently within one thread
    #[serde(default = "default_concurrency")]
    pub classify_concurrency: usize,
}

impl ThreadJob {
    /// Create a job with default settings
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            batch_size: default_batch_size(),
            replies_field: default_replies_field(),
            reply_text_field: default_reply_text_field(),
            reply_id_field: default_reply_id_field(),
            classify_concurrency: default_concurrency(),
        }
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set per-thread classification concurrency
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.classify_concurrency = concurrency;
        self
    }

    /// `database.collection`
    pub fn label(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// A unit of work dispatched by the scheduler each cycle
#[derive(Debug, Clone)]
pub enum BatchJob {
    Flat(FlatJob),
    Thread(ThreadJob),
}

impl BatchJob {
    /// Database the job connects to
    pub fn database(&self) -> &str {
        match self {
            Self::Flat(job) => &job.database,
            Self::Thread(job) => &job.database,
        }
    }

    /// `database.collection`
    pub fn label(&self) -> String {
        match self {
            Self::Flat(job) => job.label(),
            Self::Thread(job) => job.label(),
        }
    }

    /// Maximum documents selected per cycle
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Flat(job) => job.batch_size,
            Self::Thread(job) => job.batch_size,
        }
    }
}

impl From<FlatJob> for BatchJob {
    fn from(job: FlatJob) -> Self {
        Self::Flat(job)
    }
}

impl From<ThreadJob> for BatchJob {
    fn from(job: ThreadJob) -> Self {
        Self::Thread(job)
    }
}

fn default_text_field() -> String {
    "text".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_replies_field() -> String {
    "posts".to_string()
}

fn default_reply_text_field() -> String {
    "com".to_string()
}

fn default_reply_id_field() -> String {
    "no".to_string()
}
