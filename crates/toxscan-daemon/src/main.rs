//! toxscan
//!
//! Scheduling daemon for incremental toxicity scoring.
//!
//! Every poll interval it selects unscored comments, posts and threads from
//! the configured store, scores them with the configured classifier and
//! writes the results back in one bulk update per job.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use toxscan_classifiers::build_classifier;
use toxscan_engine::{BatchJob, Scheduler};
use toxscan_store::{JsonlStore, MemoryStore, MongoStore, StoreConnector};
use tracing::{info, warn};

mod config;

use config::{DaemonConfig, StoreKind};

#[derive(Parser, Debug)]
#[command(name = "toxscan")]
#[command(about = "Incremental toxicity scoring for stored social media content", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "toxscan.yaml")]
    config: String,

    /// Scoring service API key (overrides the configuration file)
    #[arg(long, env = "TOXSCAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DaemonConfig::load(&cli.config, &cli)?;

    init_tracing(cli.verbose, config.logging.json);
    info!("Starting toxscan");
    info!("Configuration loaded from {}", cli.config);

    if let Some(addr) = config.metrics.listen {
        init_metrics(addr)?;
    }

    let classifier = build_classifier(&config.classifier)?;
    info!(classifier = classifier.name(), "Classifier ready");
    if config.is_remote() {
        info!(
            api_url = %config.classifier.api_url,
            timeout_secs = config.classifier.timeout_secs,
            "Scoring through the remote service"
        );
    }

    let connector: Arc<dyn StoreConnector> = match config.store.kind {
        StoreKind::Mongo => {
            let store = MongoStore::new(&config.store.uri)
                .await
                .map_err(|e| anyhow::anyhow!("invalid store.uri: {}", e))?;
            info!(transactions = config.store.transactions, "Using the mongo store");
            Arc::new(store.with_transactions(config.store.transactions))
        }
        StoreKind::Memory => {
            warn!("Using the in-memory store; results are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Jsonl => {
            let root = config
                .store
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("store.path is required for the jsonl store"))?;
            info!(root = %root.display(), "Using the jsonl store");
            Arc::new(JsonlStore::new(root))
        }
    };

    let jobs = config.batch_jobs();
    for job in &jobs {
        match job {
            BatchJob::Flat(flat) => info!(
                job = %flat.label(),
                batch_size = flat.batch_size,
                text_field = %flat.text_field,
                empty_policy = flat.empty_policy(),
                "Flat job configured"
            ),
            BatchJob::Thread(thread) => info!(
                job = %thread.label(),
                batch_size = thread.batch_size,
                replies_field = %thread.replies_field,
                "Thread job configured"
            ),
        }
    }

    let scheduler = Scheduler::new(
        connector,
        classifier,
        jobs,
        config.scheduler.clone(),
        config.classifier.confidence_threshold,
    );

    if cli.once {
        let report = scheduler.run_cycle().await;
        if !report.is_success() {
            anyhow::bail!("{} job(s) failed", report.failed_jobs().count());
        }
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {},
        _ = shutdown_signal() => {
            warn!("Shutdown signal received, stopping scheduler...");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("toxscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toxscan=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Install the Prometheus exporter with its own HTTP listener
fn init_metrics(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    toxscan_engine::metrics::describe_metrics();

    info!("Metrics exporter listening on http://{}", addr);
    Ok(())
}
