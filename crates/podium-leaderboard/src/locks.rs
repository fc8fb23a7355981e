//! Per-player write serialization
//!
//! Score updates are read-modify-write sequences across two store calls.
//! Each player hashes to one of a fixed set of async mutexes; holding the
//! shard for the whole sequence makes concurrent updates to the same
//! player add up instead of overwriting each other.

use podium_common::PlayerId;
use tokio::sync::{Mutex, MutexGuard};
use xxhash_rust::xxh64::xxh64;

const SHARD_SEED: u64 = 0;

pub struct PlayerLocks {
    shards: Vec<Mutex<()>>,
}

impl PlayerLocks {
    /// Create `shard_count` lock shards (minimum 1)
    #[must_use]
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index for a player
    #[must_use]
    pub fn shard_for(&self, id: &PlayerId) -> usize {
        let hash = xxh64(id.as_str().as_bytes(), SHARD_SEED);
        (hash % self.shards.len() as u64) as usize
    }

    /// Wait for exclusive access to the player's shard
    pub async fn lock(&self, id: &PlayerId) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(id)].lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shard_is_stable() {
        let locks = PlayerLocks::new(16);
        let id = PlayerId::new("player-1").unwrap();
        assert_eq!(locks.shard_for(&id), locks.shard_for(&id));
        assert!(locks.shard_for(&id) < 16);
    }

    #[test]
    fn test_zero_shards_clamped() {
        let locks = PlayerLocks::new(0);
        assert_eq!(locks.shard_count(), 1);
    }

    #[tokio::test]
    async fn test_same_player_is_exclusive() {
        let locks = PlayerLocks::new(4);
        let id = PlayerId::new("p1").unwrap();

        let guard = locks.lock(&id).await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.lock(&id)).await;
        assert!(second.is_err());
        drop(guard);

        let third = tokio::time::timeout(Duration::from_millis(20), locks.lock(&id)).await;
        assert!(third.is_ok());
    }
}
