//! Daemon configuration

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use toxscan_classifiers::{ClassifierBackend, ClassifierConfig};
use toxscan_engine::{BatchJob, FlatJob, SchedulerConfig, ThreadJob};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Document store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Cycle interval and worker pool size
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Batch jobs run every cycle
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Prometheus exporter
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // A missing file means the built-in deployment defaults
        let mut config = if Path::new(config_path).exists() {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        if let Some(key) = &cli.api_key {
            config.classifier.api_key = Some(key.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Reject configurations the scheduler cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        self.classifier.validate()?;

        if self.scheduler.max_workers == 0 {
            bail!("scheduler.max_workers must be greater than zero");
        }

        if self.store.kind == StoreKind::Jsonl && self.store.path.is_none() {
            bail!("store.path is required for the jsonl store");
        }

        if self.store.kind == StoreKind::Mongo && self.store.uri.trim().is_empty() {
            bail!("store.uri is required for the mongo store");
        }

        for job in self.batch_jobs() {
            if job.batch_size() == 0 {
                bail!("job {} has a batch_size of zero", job.label());
            }
        }

        for job in &self.jobs.flat {
            if job.classify_concurrency == 0 {
                bail!("job {} has a classify_concurrency of zero", job.label());
            }
        }
        for job in &self.jobs.threads {
            if job.classify_concurrency == 0 {
                bail!("job {} has a classify_concurrency of zero", job.label());
            }
        }

        Ok(())
    }

    /// Every configured job, flat jobs first
    pub fn batch_jobs(&self) -> Vec<BatchJob> {
        self.jobs
            .flat
            .iter()
            .cloned()
            .map(BatchJob::from)
            .chain(self.jobs.threads.iter().cloned().map(BatchJob::from))
            .collect()
    }

    /// Whether the configured classifier calls out to the network
    pub fn is_remote(&self) -> bool {
        self.classifier.backend == ClassifierBackend::Remote
    }
}

/// Store backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Root directory of the jsonl store
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Connection string of the mongo store
    #[serde(default = "default_mongo_uri")]
    pub uri: String,

    /// Commit each mongo bulk update in a transaction (replica sets only)
    #[serde(default)]
    pub transactions: bool,
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017/".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: None,
            uri: default_mongo_uri(),
            transactions: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// MongoDB deployment at `uri`
    #[default]
    Mongo,
    /// In-process, lost on exit
    Memory,
    /// One JSON-lines file per collection
    Jsonl,
}

/// Batch job lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub flat: Vec<FlatJob>,

    #[serde(default)]
    pub threads: Vec<ThreadJob>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            flat: vec![
                FlatJob::new("redditDB", "comments", "text"),
                FlatJob::new("redditDB", "posts", "text"),
            ],
            threads: vec![ThreadJob::new("fourchanDB", "threads")],
        }
    }
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address to serve `/metrics` on; disabled when unset
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

/// Log output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}
