//! Owned background maintenance task
//!
//! On every tick the leaderboard snapshots the durable corpus if the
//! snapshot interval has elapsed, probes both stores and drops expired
//! ranking metadata. A tick never retries; failures wait for the next one.

use crate::service::Leaderboard;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle to the running maintenance task. Dropping it leaves the task
/// running; call [`MaintenanceHandle::shutdown`] to stop it.
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signal the task to stop and wait for the current tick to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Maintenance task did not exit cleanly");
        }
    }
}

impl Leaderboard {
    /// Start the maintenance loop on the current runtime
    #[must_use]
    pub fn start_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        let board = Arc::clone(self);
        let tick = board.config().maintenance_tick();
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            info!(tick_secs = tick.as_secs(), "Maintenance loop started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => board.run_maintenance_tick().await,
                    _ = stop.changed() => break,
                }
            }
            info!("Maintenance loop stopped");
        });

        MaintenanceHandle { shutdown, task }
    }
}

#[cfg(test)]
mod tests {
    use podium_common::{LeaderboardConfig, PlayerId};
    use podium_store::{DurableStore, MemoryRankingStore, RankingStore, RedbStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::Leaderboard;

    #[tokio::test]
    async fn test_maintenance_snapshots_and_stops() {
        let dir = TempDir::new().unwrap();
        let durable: Arc<dyn DurableStore> =
            Arc::new(RedbStore::open(dir.path().join("podium.db")).unwrap());
        let ranking: Arc<dyn RankingStore> =
            Arc::new(MemoryRankingStore::new(Duration::from_secs(60)));
        let board = Arc::new(
            Leaderboard::new(
                LeaderboardConfig {
                    maintenance_tick_secs: 1,
                    ..LeaderboardConfig::default()
                },
                Arc::clone(&durable),
                ranking,
            )
            .unwrap(),
        );
        board
            .update_score(&PlayerId::new("p1").unwrap(), 10, "alice", "")
            .await
            .unwrap();

        let handle = board.start_maintenance();
        tokio::time::sleep(Duration::from_millis(1_300)).await;

        let snapshot = durable.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.player_count, 1);
        assert!(!board.snapshot_due());

        handle.shutdown().await;
    }
}
