//! Configuration types for Podium
//!
//! `LeaderboardConfig` is deserialized from the optional config file and then
//! overridden by command-line flags / environment variables in the server.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How ranks are assigned to players with equal scores
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPolicy {
    /// Position in the ranking store; ties are not collapsed
    #[default]
    Standard,
    /// Equal scores share a rank; ranks are contiguous
    Dense,
}

impl RankingPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Dense => "dense",
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "dense" => Ok(Self::Dense),
            other => Err(Error::configuration(format!(
                "ranking method must be 'standard' or 'dense', got '{other}'"
            ))),
        }
    }
}

/// Root configuration for the leaderboard engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Ranking policy, fixed for the process lifetime
    pub ranking_method: RankingPolicy,
    /// Serve reads through the local cache
    pub enable_cache: bool,
    /// Local cache configuration
    pub cache: CacheConfig,
    /// Minimum time between full-corpus snapshots (seconds)
    pub snapshot_interval_secs: u64,
    /// Maintenance loop tick (seconds)
    pub maintenance_tick_secs: u64,
    /// Rebuild the ranking store from the durable store at startup
    pub rebuild_on_start: bool,
    /// Deadline for store reads (milliseconds)
    pub read_timeout_ms: u64,
    /// Deadline for store writes (milliseconds)
    pub write_timeout_ms: u64,
    /// Number of per-player write lock shards
    pub lock_shards: usize,
    /// Expiry of auxiliary per-player metadata in the ranking store (seconds)
    pub metadata_ttl_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            ranking_method: RankingPolicy::Standard,
            enable_cache: true,
            cache: CacheConfig::default(),
            snapshot_interval_secs: 60 * 60, // 1 hour
            maintenance_tick_secs: 30,
            rebuild_on_start: false,
            read_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
            lock_shards: 16,
            metadata_ttl_secs: 7 * 24 * 60 * 60, // 7 days
        }
    }
}

impl LeaderboardConfig {
    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::configuration("cache capacity must be positive"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::configuration("cache ttl must be positive"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(Error::configuration("cache sweep interval must be positive"));
        }
        if self.lock_shards == 0 {
            return Err(Error::configuration("lock shard count must be positive"));
        }
        if self.maintenance_tick_secs == 0 {
            return Err(Error::configuration("maintenance tick must be positive"));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(Error::configuration("store timeouts must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    #[must_use]
    pub const fn maintenance_tick(&self) -> Duration {
        Duration::from_secs(self.maintenance_tick_secs)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    #[must_use]
    pub const fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }
}

/// Local rank cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Absolute per-entry time to live (seconds)
    pub ttl_secs: u64,
    /// Interval of the background expiry sweep (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: 5 * 60, // 5 minutes
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LeaderboardConfig::default();
        assert_eq!(config.ranking_method, RankingPolicy::Standard);
        assert_eq!(config.cache.capacity, 10_000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.snapshot_interval(), Duration::from_secs(3600));
        assert_eq!(config.metadata_ttl(), Duration::from_secs(604_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = LeaderboardConfig::default();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = LeaderboardConfig {
            lock_shards: 0,
            ..LeaderboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ranking_policy_parse() {
        assert_eq!("dense".parse::<RankingPolicy>().unwrap(), RankingPolicy::Dense);
        assert_eq!(
            "Standard".parse::<RankingPolicy>().unwrap(),
            RankingPolicy::Standard
        );
        assert!("olympic".parse::<RankingPolicy>().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LeaderboardConfig =
            serde_json::from_str(r#"{"ranking_method":"dense","cache":{"capacity":5}}"#).unwrap();
        assert_eq!(config.ranking_method, RankingPolicy::Dense);
        assert_eq!(config.cache.capacity, 5);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.lock_shards, 16);
    }
}
