//! Durable store contract
//!
//! The durable store is the system of record: player totals, the
//! append-only score history and periodic full-corpus snapshots. Every
//! other structure in Podium can be re-derived from it.

use crate::error::StoreResult;
use async_trait::async_trait;
use podium_common::{NewHistoryEntry, Player, PlayerId, ScoreHistoryEntry, SnapshotRecord};

/// Authoritative player storage
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert or update the player row keyed by `id`.
    ///
    /// The creation timestamp of an existing row is preserved; the name and
    /// total are overwritten with the supplied values.
    async fn upsert_player(&self, id: &PlayerId, name: &str, total_score: i64)
    -> StoreResult<Player>;

    /// Append one history entry. The store assigns the sequence and timestamp.
    async fn record_history(&self, entry: NewHistoryEntry) -> StoreResult<ScoreHistoryEntry>;

    /// Point lookup. Absence is reported as `StoreError::NotFound`.
    async fn get_player(&self, id: &PlayerId) -> StoreResult<Player>;

    /// Every player row, in one pass
    async fn get_all_players(&self) -> StoreResult<Vec<Player>>;

    /// Players ordered by total descending, then by last update ascending
    async fn get_top_players(&self, limit: usize) -> StoreResult<Vec<Player>>;

    /// History entries of one player, newest first
    async fn player_history(
        &self,
        id: &PlayerId,
        limit: usize,
    ) -> StoreResult<Vec<ScoreHistoryEntry>>;

    /// Remove a player row and all of its history entries.
    ///
    /// Returns `false` if no row existed.
    async fn delete_player(&self, id: &PlayerId) -> StoreResult<bool>;

    /// Persist an opaque snapshot blob along with its player count
    async fn save_snapshot(&self, data: Vec<u8>, player_count: usize)
    -> StoreResult<SnapshotRecord>;

    /// Most recent snapshot, if any was taken
    async fn latest_snapshot(&self) -> StoreResult<Option<SnapshotRecord>>;

    /// Liveness probe
    async fn health_check(&self) -> StoreResult<()>;
}
