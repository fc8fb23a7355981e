//! Leaderboard orchestration
//!
//! Writes go to the durable store first, then are projected into the
//! ranking store, then the cache is invalidated. Only the durable write is
//! authoritative; history and projection failures are logged and reported
//! as degraded steps on the outcome. Reads are served cache-first.

use crate::locks::PlayerLocks;
use crate::policy;
use parking_lot::Mutex;
use podium_cache::{CacheStats, LocalCache};
use podium_common::{
    Error, LeaderboardConfig, NewHistoryEntry, Player, PlayerId, RankEntry, RankingPolicy, Result,
    ScoreHistoryEntry, SnapshotRecord,
};
use podium_store::{DurableStore, RankingStore, StoreResult};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const RANK_KEY_PREFIX: &str = "rank:";
pub const TOP_KEY_PREFIX: &str = "top:";

fn rank_key(id: &PlayerId) -> String {
    format!("{RANK_KEY_PREFIX}{id}")
}

fn top_key(n: usize) -> String {
    format!("{TOP_KEY_PREFIX}{n}")
}

/// Value stored in the local cache
#[derive(Clone, Debug)]
pub enum CachedRank {
    Player(RankEntry),
    Top(Vec<RankEntry>),
}

/// Non-authoritative step of a write that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStep {
    History,
    Projection,
}

/// Result of an accepted score update
#[derive(Clone, Debug, Serialize)]
pub struct ScoreUpdate {
    pub player: Player,
    pub delta: i64,
    /// Steps that failed after the durable write committed
    pub degraded: Vec<DegradedStep>,
}

impl ScoreUpdate {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Turn a degraded outcome into `Error::Degraded`
    pub fn into_strict(self) -> Result<Self> {
        if self.is_degraded() {
            return Err(Error::Degraded(format!(
                "score for {} committed but {:?} failed",
                self.player.id, self.degraded
            )));
        }
        Ok(self)
    }
}

/// Counts from one rebuild pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub players: usize,
    pub projected: usize,
    /// Ranked players removed for having no durable row
    pub pruned: usize,
    pub failed: usize,
}

/// The leaderboard service
pub struct Leaderboard {
    durable: Arc<dyn DurableStore>,
    ranking: Arc<dyn RankingStore>,
    cache: Option<Arc<LocalCache<CachedRank>>>,
    locks: PlayerLocks,
    config: LeaderboardConfig,
    last_snapshot: Mutex<Option<Instant>>,
}

impl Leaderboard {
    /// Build a leaderboard over the given stores.
    ///
    /// Fails with `Error::Configuration` if the configuration is invalid.
    pub fn new(
        config: LeaderboardConfig,
        durable: Arc<dyn DurableStore>,
        ranking: Arc<dyn RankingStore>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = config
            .enable_cache
            .then(|| Arc::new(LocalCache::new(config.cache.capacity, config.cache.ttl())));

        info!(
            ranking_method = %config.ranking_method,
            cache_enabled = config.enable_cache,
            cache_capacity = config.cache.capacity,
            lock_shards = config.lock_shards,
            "Leaderboard initialized"
        );

        Ok(Self {
            durable,
            ranking,
            cache,
            locks: PlayerLocks::new(config.lock_shards),
            config,
            last_snapshot: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    #[must_use]
    pub const fn policy(&self) -> RankingPolicy {
        self.config.ranking_method
    }

    /// The local cache, if enabled
    #[must_use]
    pub const fn cache(&self) -> Option<&Arc<LocalCache<CachedRank>>> {
        self.cache.as_ref()
    }

    // ---- Deadlines ----

    async fn read<T>(&self, op: &str, fut: impl Future<Output = StoreResult<T>>) -> Result<T> {
        with_deadline(self.config.read_timeout(), op, fut).await
    }

    async fn write<T>(&self, op: &str, fut: impl Future<Output = StoreResult<T>>) -> Result<T> {
        with_deadline(self.config.write_timeout(), op, fut).await
    }

    // ---- Writes ----

    /// Apply a score delta to a player.
    ///
    /// Succeeds once the durable write commits. An empty `name` keeps the
    /// player's existing name.
    pub async fn update_score(
        &self,
        id: &PlayerId,
        delta: i64,
        name: &str,
        reason: &str,
    ) -> Result<ScoreUpdate> {
        if delta == 0 {
            return Err(Error::invalid_input("delta must be non-zero"));
        }

        let _guard = self.locks.lock(id).await;

        let current = match self.read("get_player", self.durable.get_player(id)).await {
            Ok(player) => Some(player),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let current_total = current.as_ref().map_or(0, |p| p.total_score);
        let new_total = current_total
            .checked_add(delta)
            .ok_or_else(|| Error::invalid_input("score total would overflow"))?;
        let name = if name.is_empty() {
            current.map(|p| p.name).unwrap_or_default()
        } else {
            name.to_string()
        };

        let player = self
            .write(
                "upsert_player",
                self.durable.upsert_player(id, &name, new_total),
            )
            .await?;

        let mut degraded = Vec::new();

        let entry = NewHistoryEntry {
            player_id: id.clone(),
            delta,
            final_score: new_total,
            reason: reason.to_string(),
        };
        if let Err(e) = self
            .write("record_history", self.durable.record_history(entry))
            .await
        {
            warn!(player_id = %id, delta, error = %e, "Failed to record score history");
            degraded.push(DegradedStep::History);
        }

        if let Err(e) = self
            .write("update_score", self.ranking.update_score(id, new_total, &name))
            .await
        {
            error!(player_id = %id, total = new_total, error = %e, "Failed to project score into ranking store");
            degraded.push(DegradedStep::Projection);
        }

        self.invalidate(id);

        info!(player_id = %id, delta, total = new_total, "Score updated");
        Ok(ScoreUpdate {
            player,
            delta,
            degraded,
        })
    }

    /// Remove a player from both stores.
    ///
    /// Returns `false` if the durable store had no such player.
    pub async fn delete_player(&self, id: &PlayerId) -> Result<bool> {
        let _guard = self.locks.lock(id).await;

        let existed = self
            .write("delete_player", self.durable.delete_player(id))
            .await?;

        if let Err(e) = self
            .write("remove_player", self.ranking.remove_player(id))
            .await
        {
            error!(player_id = %id, error = %e, "Failed to remove player from ranking store");
        }

        self.invalidate(id);
        info!(player_id = %id, existed, "Player deleted");
        Ok(existed)
    }

    fn invalidate(&self, id: &PlayerId) {
        if let Some(cache) = &self.cache {
            cache.delete(&rank_key(id));
            // Any write can shift any rank
            let cleared = cache.clear_by_prefix(TOP_KEY_PREFIX);
            debug!(player_id = %id, cleared, "Invalidated cached ranks");
        }
    }

    // ---- Reads ----

    /// Rank of one player, cache-first
    pub async fn get_player_rank(&self, id: &PlayerId) -> Result<RankEntry> {
        let key = rank_key(id);
        if let Some(CachedRank::Player(entry)) = self.cache_get(&key) {
            return Ok(entry);
        }

        let rank = self.read("get_rank", self.ranking.get_rank(id)).await?;
        let score = self.read("get_score", self.ranking.get_score(id)).await?;

        let (name, updated_at) = match self.read("get_player", self.durable.get_player(id)).await {
            Ok(player) => (player.name, Some(player.updated_at)),
            Err(e) if e.is_not_found() => (String::new(), None),
            Err(e) => return Err(e),
        };

        let rank = match self.policy() {
            RankingPolicy::Standard => rank,
            RankingPolicy::Dense => self.read("dense_rank", self.ranking.dense_rank(score)).await?,
        };

        let entry = RankEntry {
            player_id: id.clone(),
            rank,
            score,
            name,
            updated_at,
        };
        self.cache_set(key, CachedRank::Player(entry.clone()));
        Ok(entry)
    }

    /// Highest `n` players, cache-first by exact `n`
    pub async fn get_top_n(&self, n: usize) -> Result<Vec<RankEntry>> {
        if n == 0 {
            return Err(Error::invalid_input("n must be positive"));
        }

        let key = top_key(n);
        if let Some(CachedRank::Top(entries)) = self.cache_get(&key) {
            return Ok(entries);
        }

        let mut entries = self
            .read("get_top_players", self.ranking.get_top_players(n))
            .await?;
        self.apply_policy(&mut entries).await?;

        self.cache_set(key, CachedRank::Top(entries.clone()));
        Ok(entries)
    }

    /// Block of at most `window` entries around a player. Never cached.
    pub async fn get_player_rank_range(
        &self,
        id: &PlayerId,
        window: usize,
    ) -> Result<Vec<RankEntry>> {
        if window == 0 {
            return Err(Error::invalid_input("window must be positive"));
        }

        let mut entries = self
            .read(
                "get_neighbor_range",
                self.ranking.get_neighbor_range(id, window),
            )
            .await?;
        self.apply_policy(&mut entries).await?;
        Ok(entries)
    }

    async fn apply_policy(&self, entries: &mut [RankEntry]) -> Result<()> {
        if !policy::collapses_ties(self.policy()) {
            return Ok(());
        }
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let first_rank = self
            .read("dense_rank", self.ranking.dense_rank(first.score))
            .await?;
        policy::collapse_dense(entries, first_rank);
        Ok(())
    }

    /// Score history of one player, newest first
    pub async fn get_player_history(
        &self,
        id: &PlayerId,
        limit: usize,
    ) -> Result<Vec<ScoreHistoryEntry>> {
        if limit == 0 {
            return Err(Error::invalid_input("limit must be positive"));
        }
        self.read("player_history", self.durable.player_history(id, limit))
            .await
    }

    pub async fn latest_snapshot(&self) -> Result<Option<SnapshotRecord>> {
        self.read("latest_snapshot", self.durable.latest_snapshot())
            .await
    }

    // ---- Reconciliation ----

    /// Re-derive the ranking store from the durable store.
    ///
    /// Every durable player is projected under its write lock from a fresh
    /// read, so a concurrent update is never overwritten with a stale total.
    /// Ranked ids with no durable row are then removed. Per-player failures
    /// are logged and counted.
    pub async fn rebuild_leaderboard(&self) -> Result<RebuildReport> {
        let started = Instant::now();
        let players = self
            .read("get_all_players", self.durable.get_all_players())
            .await?;

        let mut report = RebuildReport {
            players: players.len(),
            ..RebuildReport::default()
        };

        for listed in &players {
            let _guard = self.locks.lock(&listed.id).await;
            let player = match self.read("get_player", self.durable.get_player(&listed.id)).await {
                Ok(player) => player,
                // Deleted since the listing; the prune pass handles it
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(player_id = %listed.id, error = %e, "Failed to re-read player for rebuild");
                    report.failed += 1;
                    continue;
                }
            };

            match self
                .write(
                    "update_score",
                    self.ranking
                        .update_score(&player.id, player.total_score, &player.name),
                )
                .await
            {
                Ok(()) => report.projected += 1,
                Err(e) => {
                    warn!(player_id = %player.id, error = %e, "Failed to rebuild player");
                    report.failed += 1;
                }
            }
        }

        report.pruned = self.prune_unbacked(&players).await;

        info!(
            players = report.players,
            projected = report.projected,
            pruned = report.pruned,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Leaderboard rebuilt"
        );
        Ok(report)
    }

    /// Remove ranked players that have no durable row. Returns the number removed.
    async fn prune_unbacked(&self, players: &[Player]) -> usize {
        let ranked = match self.read("player_ids", self.ranking.player_ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to list ranked players; skipping prune");
                return 0;
            }
        };

        let durable: HashSet<&PlayerId> = players.iter().map(|p| &p.id).collect();
        let mut pruned = 0;
        for id in ranked.iter().filter(|id| !durable.contains(id)) {
            let _guard = self.locks.lock(id).await;
            match self.read("get_player", self.durable.get_player(id)).await {
                Err(e) if e.is_not_found() => {}
                // Created after the listing
                Ok(_) => continue,
                Err(e) => {
                    warn!(player_id = %id, error = %e, "Failed to check player before prune");
                    continue;
                }
            }

            match self
                .write("remove_player", self.ranking.remove_player(id))
                .await
            {
                Ok(removed) => {
                    if removed {
                        pruned += 1;
                    }
                    self.invalidate(id);
                    debug!(player_id = %id, "Pruned player without durable row");
                }
                Err(e) => warn!(player_id = %id, error = %e, "Failed to prune player"),
            }
        }
        pruned
    }

    /// Serialize every durable player into a new snapshot
    pub async fn take_snapshot(&self) -> Result<SnapshotRecord> {
        let players = self
            .read("get_all_players", self.durable.get_all_players())
            .await?;
        let data = serde_json::to_vec(&players)
            .map_err(|e| Error::Degraded(format!("failed to encode snapshot: {e}")))?;

        let record = self
            .write(
                "save_snapshot",
                self.durable.save_snapshot(data, players.len()),
            )
            .await?;

        *self.last_snapshot.lock() = Some(Instant::now());
        info!(seq = record.seq, player_count = record.player_count, "Leaderboard snapshot created");
        Ok(record)
    }

    /// Whether the snapshot interval has elapsed since the last snapshot
    #[must_use]
    pub fn snapshot_due(&self) -> bool {
        self.last_snapshot
            .lock()
            .is_none_or(|at| at.elapsed() > self.config.snapshot_interval())
    }

    /// One maintenance pass: snapshot if due, probe both stores, drop
    /// expired ranking metadata. Failures are logged and left for the
    /// next pass.
    pub async fn run_maintenance_tick(&self) {
        if self.snapshot_due()
            && let Err(e) = self.take_snapshot().await
        {
            error!(error = %e, "Failed to create leaderboard snapshot");
        }

        if let Err(e) = self.check_durable_health().await {
            error!(error = %e, "Durable store health check failed");
        }
        if let Err(e) = self.check_ranking_health().await {
            error!(error = %e, "Ranking store health check failed");
        }

        match self
            .write("evict_expired_metadata", self.ranking.evict_expired_metadata())
            .await
        {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "Evicted expired ranking metadata"),
            Err(e) => warn!(error = %e, "Failed to evict ranking metadata"),
        }
    }

    // ---- Health and stats ----

    pub async fn check_durable_health(&self) -> Result<()> {
        self.read("health_check", self.durable.health_check()).await
    }

    pub async fn check_ranking_health(&self) -> Result<()> {
        self.read("health_check", self.ranking.health_check()).await
    }

    /// Number of players in the ranking store
    pub async fn ranked_players(&self) -> Result<usize> {
        self.read("size", self.ranking.size()).await
    }

    /// Cache statistics, or `None` when the cache is disabled
    #[must_use]
    pub fn get_cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    fn cache_get(&self, key: &str) -> Option<CachedRank> {
        self.cache.as_ref().and_then(|cache| cache.get(key))
    }

    fn cache_set(&self, key: String, value: CachedRank) {
        if let Some(cache) = &self.cache {
            cache.set(key, value);
        }
    }
}

/// Bound a store call by `deadline`; an elapsed deadline is `StoreUnavailable`.
///
/// The deadline is checked only when the store future yields. Stores that
/// finish their work on the first poll, such as `RedbStore` and
/// `MemoryRankingStore`, complete regardless of it; the bound applies to
/// stores that await real I/O.
async fn with_deadline<T>(
    deadline: Duration,
    op: &str,
    fut: impl Future<Output = StoreResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::store_unavailable(format!(
            "{op} timed out after {deadline:?}"
        ))),
    }
}
