//! Ranking store contract
//!
//! The ranking store holds a lossy, rebuildable projection of the durable
//! totals, ordered by score descending with the player id as tie-break.

use crate::error::StoreResult;
use async_trait::async_trait;
use podium_common::{PlayerId, RankEntry};

/// Live ordered view used for rank, top-N and neighbor queries
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Set the player's score (full overwrite, not a delta) and display name
    async fn update_score(&self, id: &PlayerId, score: i64, name: &str) -> StoreResult<()>;

    /// 1-based position of the player
    async fn get_rank(&self, id: &PlayerId) -> StoreResult<u64>;

    async fn get_score(&self, id: &PlayerId) -> StoreResult<i64>;

    /// Entries at 0-based positions `[start, end)` in descending-score order.
    ///
    /// Ranks are `start + position + 1`.
    async fn get_range(&self, start: usize, end: usize) -> StoreResult<Vec<RankEntry>>;

    /// Number of distinct scores strictly greater than `score`, plus one
    async fn dense_rank(&self, score: i64) -> StoreResult<u64>;

    /// Drop a player from the projection. Returns `false` if it was absent.
    async fn remove_player(&self, id: &PlayerId) -> StoreResult<bool>;

    /// Number of ranked players
    async fn size(&self) -> StoreResult<usize>;

    /// Every ranked player id, in no particular order
    async fn player_ids(&self) -> StoreResult<Vec<PlayerId>>;

    async fn health_check(&self) -> StoreResult<()>;

    /// Highest `n` players
    async fn get_top_players(&self, n: usize) -> StoreResult<Vec<RankEntry>> {
        self.get_range(0, n).await
    }

    /// A block of at most `window` entries around the player.
    ///
    /// The block starts at `max(0, rank - window/2 - 1)`, so near the top of
    /// the leaderboard it extends further below the player than above.
    async fn get_neighbor_range(&self, id: &PlayerId, window: usize) -> StoreResult<Vec<RankEntry>> {
        let rank = self.get_rank(id).await?;
        let start = neighbor_start(rank, window);
        self.get_range(start, start.saturating_add(window)).await
    }

    /// Drop auxiliary metadata past its expiry. Returns the number removed.
    async fn evict_expired_metadata(&self) -> StoreResult<usize> {
        Ok(0)
    }
}

/// 0-based start offset of the neighbor block for a 1-based rank
#[must_use]
pub fn neighbor_start(rank: u64, window: usize) -> usize {
    usize::try_from(rank)
        .unwrap_or(usize::MAX)
        .saturating_sub(window / 2 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_start() {
        // Top of the leaderboard never goes negative
        assert_eq!(neighbor_start(1, 10), 0);
        assert_eq!(neighbor_start(6, 10), 0);
        assert_eq!(neighbor_start(7, 10), 1);
        assert_eq!(neighbor_start(50, 10), 44);
        assert_eq!(neighbor_start(50, 1), 49);
        assert_eq!(neighbor_start(50, 3), 48);
    }
}
