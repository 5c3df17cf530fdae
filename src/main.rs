//! Entry point for the feed ingestion daemon.
//!
//! Reads configuration, wires the logging layers, launches one poller per
//! feed, then parks until a termination signal arrives.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mtw_ingest::cache::RedisStore;
use mtw_ingest::config::Settings;
use mtw_ingest::fetch::BasicClient;
use mtw_ingest::poller::FeedPoller;
use mtw_ingest::supervisor::Supervisor;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "mtw_ingest")]
#[command(about = "Polls GTFS-realtime feeds into a Redis snapshot cache", long_about = None)]
struct Cli {
    /// Base poll interval in seconds (overrides POLL_SEC)
    #[arg(long, value_name = "SECONDS")]
    poll_sec: Option<u64>,

    /// Cache key namespace (overrides CACHE_NAMESPACE)
    #[arg(long, value_name = "PREFIX")]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/mtw_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mtw_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    settings.apply_overrides(cli.poll_sec, cli.namespace)?;

    let store = Arc::new(RedisStore::new(&settings.redis_url)?);

    let mut supervisor = Supervisor::new();
    for feed in settings.feeds() {
        info!(
            feed = %feed.kind,
            url = %feed.url,
            interval_secs = feed.poll_interval.as_secs(),
            delay_secs = feed.initial_delay.as_secs(),
            key = %feed.cache_key,
            "Starting poller"
        );
        let client = BasicClient::new()?;
        supervisor.spawn(FeedPoller::new(feed, client, store.clone()));
    }

    wait_for_signal().await?;

    info!("Shutdown signal received, stopping pollers");
    supervisor.shutdown().await;
    info!("All pollers stopped");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        r = tokio::signal::ctrl_c() => r.context("failed to listen for interrupt")?,
        _ = sigterm.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")
}
