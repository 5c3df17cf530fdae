//! Per-feed polling loop: fetch, decode, trim, publish, sleep, repeat.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info};

use crate::cache::SnapshotStore;
use crate::config::{FeedConfig, FeedKind};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::parse_feed;
use crate::trim::trim;

/// What one cycle produced. Consumed only by the logging at the loop
/// boundary; no failure escapes the poller.
#[derive(Debug)]
pub enum CycleOutcome {
    Published { count: usize, ts: u64 },
    FetchFailed(anyhow::Error),
    DecodeFailed(anyhow::Error),
    PublishFailed(anyhow::Error),
}

/// Owns one feed's schedule. Pollers never touch each other's state; the
/// only thing they share is the store, and each writes a disjoint key.
pub struct FeedPoller<C, S> {
    config: FeedConfig,
    client: C,
    store: S,
}

impl<C: HttpClient, S: SnapshotStore> FeedPoller<C, S> {
    pub fn new(config: FeedConfig, client: C, store: S) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.config.kind
    }

    /// Runs until `shutdown` fires. Every interval tick makes exactly one
    /// poll attempt; a failed cycle sleeps out its interval like a
    /// successful one, with no backoff and no immediate retry.
    ///
    /// Shutdown is only raced against the sleeps, never against a cycle, so
    /// an in-flight publish always completes (or times out) untorn.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !sleep_or_shutdown(self.config.initial_delay, &mut shutdown).await {
            return;
        }

        loop {
            // A signal may have landed while the previous cycle was running.
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => return,
            }

            let outcome = self.cycle().await;
            self.log_outcome(&outcome);

            if !sleep_or_shutdown(self.config.poll_interval, &mut shutdown).await {
                return;
            }
        }
    }

    async fn cycle(&self) -> CycleOutcome {
        let bytes = match fetch_bytes(&self.client, &self.config.url).await {
            Ok(bytes) => bytes,
            Err(e) => return CycleOutcome::FetchFailed(e),
        };

        let feed = match parse_feed(&bytes) {
            Ok(feed) => feed,
            Err(e) => return CycleOutcome::DecodeFailed(e),
        };

        let trimmed = trim(self.config.kind, &feed);
        let count = trimmed.records.len();
        let ts = trimmed.ts;

        match self.store.publish(&self.config.cache_key, &trimmed).await {
            Ok(()) => CycleOutcome::Published { count, ts },
            Err(e) => CycleOutcome::PublishFailed(e),
        }
    }

    fn log_outcome(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Published { count, ts } => {
                info!(count, ts, "Snapshot published");
            }
            CycleOutcome::FetchFailed(e) => error!(error = %e, "Feed fetch failed"),
            CycleOutcome::DecodeFailed(e) => error!(error = %e, "Feed decode failed"),
            CycleOutcome::PublishFailed(e) => error!(error = %e, "Cache publish failed"),
        }
    }
}

/// Sleeps for `duration` unless shutdown fires first. Returns false on
/// shutdown (a closed channel counts: nobody is left to signal us).
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.recv() => false,
    }
}
