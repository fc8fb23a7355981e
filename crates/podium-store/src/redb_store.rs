//! Durable store backed by redb.
//!
//! Player rows and history entries are stored as JSON strings. Every write
//! is a single write transaction, so an upsert or a cascading delete is
//! atomic from the caller's point of view.

use crate::durable::DurableStore;
use crate::error::{StoreError, StoreResult};
use crate::tables;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podium_common::{NewHistoryEntry, Player, PlayerId, ScoreHistoryEntry, SnapshotRecord};
use redb::{Database, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Snapshot metadata stored next to the blob
#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    player_count: usize,
    created_at: DateTime<Utc>,
}

/// redb-backed implementation of [`DurableStore`]
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::PLAYERS)?;
            let _t = write_txn.open_table(tables::SCORE_HISTORY)?;
            let _t = write_txn.open_table(tables::SNAPSHOT_HEADERS)?;
            let _t = write_txn.open_table(tables::SNAPSHOT_DATA)?;
            let _t = write_txn.open_table(tables::COUNTERS)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened durable store");
        Ok(Self { db })
    }

    fn load_players(&self) -> StoreResult<Vec<Player>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::PLAYERS)?;
        let mut players = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            match serde_json::from_str::<Player>(value.value()) {
                Ok(player) => players.push(player),
                Err(e) => warn!(player_id = key.value(), error = %e, "Skipping undecodable player row"),
            }
        }
        Ok(players)
    }
}

#[async_trait]
impl DurableStore for RedbStore {
    async fn upsert_player(
        &self,
        id: &PlayerId,
        name: &str,
        total_score: i64,
    ) -> StoreResult<Player> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let player = {
            let mut table = write_txn.open_table(tables::PLAYERS)?;
            let existing: Option<Player> = match table.get(id.as_str())? {
                Some(value) => Some(serde_json::from_str(value.value())?),
                None => None,
            };

            let player = Player {
                id: id.clone(),
                name: name.to_string(),
                total_score,
                created_at: existing.map_or(now, |p| p.created_at),
                updated_at: now,
            };
            let json = serde_json::to_string(&player)?;
            table.insert(id.as_str(), json.as_str())?;
            player
        };
        write_txn.commit()?;
        Ok(player)
    }

    async fn record_history(&self, entry: NewHistoryEntry) -> StoreResult<ScoreHistoryEntry> {
        let write_txn = self.db.begin_write()?;
        let recorded = {
            let mut counters = write_txn.open_table(tables::COUNTERS)?;
            let seq = counters.get(tables::HISTORY_SEQ)?.map_or(0, |v| v.value()) + 1;
            counters.insert(tables::HISTORY_SEQ, seq)?;

            let recorded = ScoreHistoryEntry {
                seq,
                player_id: entry.player_id,
                delta: entry.delta,
                final_score: entry.final_score,
                reason: entry.reason,
                created_at: Utc::now(),
            };
            let key = tables::history_key(recorded.player_id.as_str(), seq);
            let json = serde_json::to_string(&recorded)?;
            write_txn
                .open_table(tables::SCORE_HISTORY)?
                .insert(key.as_str(), json.as_str())?;
            recorded
        };
        write_txn.commit()?;
        Ok(recorded)
    }

    async fn get_player(&self, id: &PlayerId) -> StoreResult<Player> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::PLAYERS)?;
        match table.get(id.as_str())? {
            Some(value) => Ok(serde_json::from_str(value.value())?),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get_all_players(&self) -> StoreResult<Vec<Player>> {
        self.load_players()
    }

    async fn get_top_players(&self, limit: usize) -> StoreResult<Vec<Player>> {
        let mut players = self.load_players()?;
        players.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.updated_at.cmp(&b.updated_at))
        });
        players.truncate(limit);
        Ok(players)
    }

    async fn player_history(
        &self,
        id: &PlayerId,
        limit: usize,
    ) -> StoreResult<Vec<ScoreHistoryEntry>> {
        let (lo, hi) = tables::history_range(id.as_str());
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::SCORE_HISTORY)?;

        let mut entries = Vec::new();
        for entry in table.range(lo.as_str()..hi.as_str())?.rev().take(limit) {
            let (_, value) = entry?;
            entries.push(serde_json::from_str(value.value())?);
        }
        Ok(entries)
    }

    async fn delete_player(&self, id: &PlayerId) -> StoreResult<bool> {
        let (lo, hi) = tables::history_range(id.as_str());
        let write_txn = self.db.begin_write()?;
        let existed = {
            let existed = write_txn
                .open_table(tables::PLAYERS)?
                .remove(id.as_str())?
                .is_some();

            let mut history = write_txn.open_table(tables::SCORE_HISTORY)?;
            let to_delete = history
                .range(lo.as_str()..hi.as_str())?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &to_delete {
                history.remove(key.as_str())?;
            }

            debug!(player_id = %id, history = to_delete.len(), "Deleted player");
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    async fn save_snapshot(
        &self,
        data: Vec<u8>,
        player_count: usize,
    ) -> StoreResult<SnapshotRecord> {
        let header = SnapshotHeader {
            player_count,
            created_at: Utc::now(),
        };
        let header_json = serde_json::to_string(&header)?;

        let write_txn = self.db.begin_write()?;
        let seq = {
            let mut headers = write_txn.open_table(tables::SNAPSHOT_HEADERS)?;
            let seq = headers.last()?.map_or(0, |(k, _)| k.value()) + 1;
            headers.insert(seq, header_json.as_str())?;
            write_txn
                .open_table(tables::SNAPSHOT_DATA)?
                .insert(seq, data.as_slice())?;
            seq
        };
        write_txn.commit()?;

        Ok(SnapshotRecord {
            seq,
            player_count,
            created_at: header.created_at,
            data,
        })
    }

    async fn latest_snapshot(&self) -> StoreResult<Option<SnapshotRecord>> {
        let read_txn = self.db.begin_read()?;
        let headers = read_txn.open_table(tables::SNAPSHOT_HEADERS)?;
        let Some((seq, header)) = headers.last()? else {
            return Ok(None);
        };
        let seq = seq.value();
        let header: SnapshotHeader = serde_json::from_str(header.value())?;

        let blobs = read_txn.open_table(tables::SNAPSHOT_DATA)?;
        let data = blobs
            .get(seq)?
            .map(|v| v.value().to_vec())
            .unwrap_or_default();

        Ok(Some(SnapshotRecord {
            seq,
            player_count: header.player_count,
            created_at: header.created_at,
            data,
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::PLAYERS)?;
        let _ = table.len()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("podium.db")).unwrap();
        (dir, store)
    }

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s).unwrap()
    }

    fn history(id: &str, delta: i64, final_score: i64) -> NewHistoryEntry {
        NewHistoryEntry {
            player_id: pid(id),
            delta,
            final_score,
            reason: "match".into(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_player_is_not_found() {
        let (_dir, store) = open_store();
        let err = store.get_player(&pid("ghost")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let (_dir, store) = open_store();
        let first = store.upsert_player(&pid("p1"), "alice", 10).await.unwrap();
        let second = store.upsert_player(&pid("p1"), "alice", 25).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let stored = store.get_player(&pid("p1")).await.unwrap();
        assert_eq!(stored.total_score, 25);
        assert_eq!(stored.name, "alice");
    }

    #[tokio::test]
    async fn test_history_newest_first_and_isolated() {
        let (_dir, store) = open_store();
        store.record_history(history("p1", 50, 50)).await.unwrap();
        store.record_history(history("p10", 7, 7)).await.unwrap();
        store.record_history(history("p1", 20, 70)).await.unwrap();
        store.record_history(history("p1", -5, 65)).await.unwrap();

        let entries = store.player_history(&pid("p1"), 10).await.unwrap();
        let deltas: Vec<i64> = entries.iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![-5, 20, 50]);
        assert!(entries[0].seq > entries[1].seq);

        let limited = store.player_history(&pid("p1"), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].final_score, 65);
    }

    #[tokio::test]
    async fn test_top_players_order() {
        let (_dir, store) = open_store();
        store.upsert_player(&pid("a"), "", 100).await.unwrap();
        store.upsert_player(&pid("b"), "", 300).await.unwrap();
        store.upsert_player(&pid("c"), "", 100).await.unwrap();
        store.upsert_player(&pid("d"), "", 50).await.unwrap();

        let top = store.get_top_players(3).await.unwrap();
        let ids: Vec<&str> = top.iter().map(|p| p.id.as_str()).collect();
        // Equal totals: the earlier update ranks first
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_player_cascades_history() {
        let (_dir, store) = open_store();
        store.upsert_player(&pid("p1"), "alice", 10).await.unwrap();
        store.record_history(history("p1", 10, 10)).await.unwrap();
        store.upsert_player(&pid("p2"), "bob", 5).await.unwrap();
        store.record_history(history("p2", 5, 5)).await.unwrap();

        assert!(store.delete_player(&pid("p1")).await.unwrap());
        assert!(!store.delete_player(&pid("p1")).await.unwrap());

        assert!(store.get_player(&pid("p1")).await.unwrap_err().is_not_found());
        assert!(store.player_history(&pid("p1"), 10).await.unwrap().is_empty());
        assert_eq!(store.player_history(&pid("p2"), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_leaves_no_orphaned_history() {
        let (_dir, store) = open_store();
        store.upsert_player(&pid("p1"), "alice", 0).await.unwrap();
        for i in 1..=40 {
            store.record_history(history("p1", 1, i)).await.unwrap();
        }
        // Shares a key prefix with p1
        store.record_history(history("p10", 7, 7)).await.unwrap();

        assert!(store.delete_player(&pid("p1")).await.unwrap());

        let read_txn = store.db.begin_read().unwrap();
        let table = read_txn.open_table(tables::SCORE_HISTORY).unwrap();
        assert_eq!(table.len().unwrap(), 1);
        assert_eq!(store.player_history(&pid("p10"), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_latest_wins() {
        let (_dir, store) = open_store();
        assert!(store.latest_snapshot().await.unwrap().is_none());

        store.save_snapshot(b"[]".to_vec(), 0).await.unwrap();
        let saved = store.save_snapshot(b"[1]".to_vec(), 1).await.unwrap();

        let latest = store.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.seq, saved.seq);
        assert_eq!(latest.player_count, 1);
        assert_eq!(latest.data, b"[1]".to_vec());
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("podium.db");
        {
            let store = RedbStore::open(&path).unwrap();
            store.upsert_player(&pid("p1"), "alice", 42).await.unwrap();
            store.health_check().await.unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        let players = store.get_all_players().await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].total_score, 42);
    }
}
