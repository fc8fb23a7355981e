//! In-process ranking store
//!
//! Scores live in an order-statistic tree keyed by (score descending,
//! player id ascending). A second tree over the distinct scores, with a
//! per-score player count, answers dense-rank queries in O(log n).
//! Display names are auxiliary metadata with their own expiry.

use crate::error::{StoreError, StoreResult};
use crate::order_stat::OrderStatTree;
use crate::ranking::RankingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use podium_common::{PlayerId, RankEntry};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Ordering key: higher scores first, then player id ascending
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    score: Reverse<i64>,
    id: PlayerId,
}

impl RankKey {
    const fn new(score: i64, id: PlayerId) -> Self {
        Self {
            score: Reverse(score),
            id,
        }
    }
}

struct PlayerMeta {
    name: String,
    touched_at: DateTime<Utc>,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

impl PlayerMeta {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct RankingState {
    order: OrderStatTree<RankKey>,
    scores: HashMap<PlayerId, i64>,
    distinct: OrderStatTree<Reverse<i64>>,
    score_counts: HashMap<i64, usize>,
    metadata: HashMap<PlayerId, PlayerMeta>,
}

impl RankingState {
    fn add_score(&mut self, score: i64) {
        let count = self.score_counts.entry(score).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.distinct.insert(Reverse(score));
        }
    }

    fn drop_score(&mut self, score: i64) {
        if let Some(count) = self.score_counts.get_mut(&score) {
            *count -= 1;
            if *count == 0 {
                self.score_counts.remove(&score);
                self.distinct.remove(&Reverse(score));
            }
        }
    }

    fn remove(&mut self, id: &PlayerId) -> Option<i64> {
        let score = self.scores.remove(id)?;
        self.order.remove(&RankKey::new(score, id.clone()));
        self.drop_score(score);
        self.metadata.remove(id);
        Some(score)
    }

    fn entry(&self, key: &RankKey, rank: u64, now: Instant) -> RankEntry {
        let meta = self
            .metadata
            .get(&key.id)
            .filter(|meta| meta.is_live(now));
        RankEntry {
            player_id: key.id.clone(),
            rank,
            score: key.score.0,
            name: meta.map(|m| m.name.clone()).unwrap_or_default(),
            updated_at: meta.map(|m| m.touched_at),
        }
    }
}

/// [`RankingStore`] held entirely in memory
pub struct MemoryRankingStore {
    state: RwLock<RankingState>,
    metadata_ttl: Duration,
}

impl MemoryRankingStore {
    /// Create an empty store whose display-name metadata expires after `metadata_ttl`
    #[must_use]
    pub fn new(metadata_ttl: Duration) -> Self {
        Self {
            state: RwLock::new(RankingState::default()),
            metadata_ttl,
        }
    }
}

#[async_trait]
impl RankingStore for MemoryRankingStore {
    async fn update_score(&self, id: &PlayerId, score: i64, name: &str) -> StoreResult<()> {
        let now = Instant::now();
        let mut state = self.state.write();

        if let Some(previous) = state.scores.insert(id.clone(), score) {
            state.order.remove(&RankKey::new(previous, id.clone()));
            state.drop_score(previous);
        }
        state.order.insert(RankKey::new(score, id.clone()));
        state.add_score(score);

        state.metadata.insert(
            id.clone(),
            PlayerMeta {
                name: name.to_string(),
                touched_at: Utc::now(),
                expires_at: now.checked_add(self.metadata_ttl),
            },
        );
        Ok(())
    }

    async fn get_rank(&self, id: &PlayerId) -> StoreResult<u64> {
        let state = self.state.read();
        let score = state
            .scores
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let position = state.order.rank(&RankKey::new(score, id.clone()));
        Ok(position as u64 + 1)
    }

    async fn get_score(&self, id: &PlayerId) -> StoreResult<i64> {
        self.state
            .read()
            .scores
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_range(&self, start: usize, end: usize) -> StoreResult<Vec<RankEntry>> {
        let now = Instant::now();
        let state = self.state.read();
        let entries = state
            .order
            .range(start, end)
            .into_iter()
            .enumerate()
            .map(|(i, key)| state.entry(key, (start + i) as u64 + 1, now))
            .collect();
        Ok(entries)
    }

    async fn dense_rank(&self, score: i64) -> StoreResult<u64> {
        let state = self.state.read();
        Ok(state.distinct.rank(&Reverse(score)) as u64 + 1)
    }

    async fn remove_player(&self, id: &PlayerId) -> StoreResult<bool> {
        Ok(self.state.write().remove(id).is_some())
    }

    async fn size(&self) -> StoreResult<usize> {
        Ok(self.state.read().order.len())
    }

    async fn player_ids(&self) -> StoreResult<Vec<PlayerId>> {
        Ok(self.state.read().scores.keys().cloned().collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn evict_expired_metadata(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let mut state = self.state.write();
        let before = state.metadata.len();
        state.metadata.retain(|_, meta| meta.is_live(now));
        let evicted = before - state.metadata.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired ranking metadata");
        }
        Ok(evicted)
    }
}
