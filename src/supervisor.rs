//! Poller lifecycle: spawn one task per feed, fan out shutdown, join.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span, warn};

use crate::cache::SnapshotStore;
use crate::fetch::HttpClient;
use crate::poller::FeedPoller;

/// How long shutdown waits for pollers to unwind before abandoning them.
/// Must exceed the fetch and store timeouts so a healthy poller always makes
/// it out.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Owns the shutdown channel and the poller task handles.
pub struct Supervisor {
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawns one poller task under a span naming its feed. The task
    /// subscribes to the shutdown channel before it starts, so a signal can
    /// never race past it.
    pub fn spawn<C, S>(&mut self, poller: FeedPoller<C, S>)
    where
        C: HttpClient + 'static,
        S: SnapshotStore + 'static,
    {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = info_span!("poll_feed", feed = %poller.kind());
        let handle = tokio::spawn(poller.run(shutdown_rx).instrument(span));
        self.handles.push(handle);
    }

    /// Broadcasts shutdown and joins every poller, bounded by
    /// [`SHUTDOWN_GRACE`]. Tasks still running when the grace elapses are
    /// abandoned to die with the process.
    pub async fn shutdown(self) {
        // Err means every receiver is already gone; nothing left to stop.
        let _ = self.shutdown_tx.send(());

        let join_all = async {
            for handle in self.handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, join_all).await.is_err() {
            warn!("Shutdown grace elapsed with pollers still running");
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
