//! Snapshot publication into the shared cache.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tokio::time::{Duration, timeout};

use crate::trim::TrimmedFeed;

/// How long a published snapshot stays readable without a refresh. Strictly
/// greater than every poll interval, so one missed cycle is invisible to
/// consumers while a sustained outage ages the key out.
pub const CACHE_EXPIRY_SECS: i64 = 180;

/// Bound on every store operation, connect included. Keeps a dead store from
/// holding a poller (and therefore shutdown) hostage.
const OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage seam for the pollers, mirroring the transport seam in `fetch`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn publish(&self, key: &str, feed: &TrimmedFeed) -> Result<()>;
}

#[async_trait]
impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    async fn publish(&self, key: &str, feed: &TrimmedFeed) -> Result<()> {
        (**self).publish(key, feed).await
    }
}

/// Redis-backed store. The connection is established on first publish rather
/// than at construction, so a store that is down at boot degrades to
/// per-cycle publish failures instead of killing the process.
pub struct RedisStore {
    client: redis::Client,
    manager: OnceCell<redis::aio::ConnectionManager>,
}

impl RedisStore {
    /// Validates the URL without connecting. A malformed address is startup
    /// configuration, and fatal; an unreachable one is not.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("invalid Redis URL: {url}"))?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                timeout(OP_TIMEOUT, self.client.get_connection_manager())
                    .await
                    .context("Redis connect timed out")?
                    .context("Redis connect failed")
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl SnapshotStore for RedisStore {
    async fn publish(&self, key: &str, feed: &TrimmedFeed) -> Result<()> {
        let json = serde_json::to_string(&feed.records)?;
        let mut conn = self.connection().await?;

        // Two commands, not one atomic unit; a crash between them leaves the
        // hash without an expiry. Consumers tolerate that today.
        timeout(
            OP_TIMEOUT,
            conn.hset_multiple::<_, _, _, ()>(
                key,
                &[("ts", feed.ts.to_string()), ("json", json)],
            ),
        )
        .await
        .context("Redis write timed out")??;

        timeout(OP_TIMEOUT, conn.expire::<_, ()>(key, CACHE_EXPIRY_SECS))
            .await
            .context("Redis expire timed out")??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_expiry_exceeds_every_poll_interval() {
        let settings = Settings {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "mtw".to_string(),
            poll_secs: 12,
            vehicles_url: "http://feeds.test/vehicles.pb".to_string(),
            trips_url: "http://feeds.test/trips.pb".to_string(),
            alerts_url: "http://feeds.test/alerts.pb".to_string(),
        };

        for feed in settings.feeds() {
            assert!(
                (CACHE_EXPIRY_SECS as u64) > feed.poll_interval.as_secs(),
                "{} interval must stay below the cache expiry",
                feed.kind
            );
        }
    }

    #[test]
    fn test_malformed_redis_url_is_rejected() {
        let err = RedisStore::new("not a url").err().unwrap();
        assert!(err.to_string().contains("invalid Redis URL"));
    }

    #[test]
    fn test_store_construction_does_not_connect() {
        // Port 9 is discard; nothing listens there. Construction must still
        // succeed because the connection is deferred to the first publish.
        assert!(RedisStore::new("redis://127.0.0.1:9").is_ok());
    }
}
