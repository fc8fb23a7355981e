//! Background expiry sweep for [`LocalCache`]

use crate::cache::LocalCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Owned handle to a running sweeper task
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Cache sweeper task did not exit cleanly");
        }
    }
}

/// Spawn a task that removes expired entries every `interval`
pub fn spawn_sweeper<V>(cache: Arc<LocalCache<V>>, interval: Duration) -> SweeperHandle
where
    V: Clone + Send + 'static,
{
    let (shutdown, mut stop) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.sweep_expired();
                    if removed > 0 {
                        debug!(removed, "Swept expired cache entries");
                    }
                }
                _ = stop.changed() => break,
            }
        }
        debug!("Cache sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(LocalCache::new(8, Duration::from_millis(10)));
        cache.set("a", 1u32);
        cache.set("b", 2u32);

        let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Removed without any read touching them
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().misses, 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let cache: Arc<LocalCache<u32>> = Arc::new(LocalCache::new(8, Duration::from_secs(60)));
        let handle = spawn_sweeper(cache, Duration::from_secs(3600));
        // Exits on the signal, without waiting for the next tick
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap();
    }
}
