//! Command-line arguments and configuration loading
//!
//! Precedence, lowest first: built-in defaults, the optional TOML file,
//! then flags (each flag also reads its environment variable).

use anyhow::{Context, Result};
use clap::Parser;
use podium_common::{LeaderboardConfig, RankingPolicy};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "podium-server")]
#[command(about = "Podium leaderboard service")]
#[command(version)]
pub struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "PODIUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address for the HTTP API
    #[arg(short, long, env = "PODIUM_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Directory holding the durable store
    #[arg(long, env = "PODIUM_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Ranking method: standard or dense
    #[arg(long, env = "RANKING_METHOD")]
    pub ranking_method: Option<RankingPolicy>,

    /// Serve reads through the local cache
    #[arg(long, env = "ENABLE_CACHE")]
    pub enable_cache: Option<bool>,

    /// Local cache capacity (entries)
    #[arg(long, env = "CACHE_SIZE")]
    pub cache_size: Option<usize>,

    /// Local cache entry TTL (e.g. 300, 90s, 5m)
    #[arg(long, env = "CACHE_TTL", value_parser = parse_duration)]
    pub cache_ttl: Option<Duration>,

    /// Number of per-player write lock shards
    #[arg(long, env = "SHARD_COUNT")]
    pub shard_count: Option<usize>,

    /// Rebuild the ranking store from the durable store before serving
    #[arg(long, env = "REBUILD_ON_START")]
    pub rebuild_on_start: Option<bool>,

    /// Minimum time between snapshots (e.g. 3600, 1h)
    #[arg(long, env = "SNAPSHOT_INTERVAL", value_parser = parse_duration)]
    pub snapshot_interval: Option<Duration>,

    /// Deadline for store reads (e.g. 5s, 500ms)
    #[arg(long, env = "READ_TIMEOUT", value_parser = parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Deadline for store writes (e.g. 10s)
    #[arg(long, env = "WRITE_TIMEOUT", value_parser = parse_duration)]
    pub write_timeout: Option<Duration>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Deployment environment; "production" switches logs to JSON
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,
}

impl Args {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Path of the redb file inside the data directory
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("podium.db")
    }

    fn apply(&self, config: &mut LeaderboardConfig) {
        if let Some(method) = self.ranking_method {
            config.ranking_method = method;
        }
        if let Some(enable) = self.enable_cache {
            config.enable_cache = enable;
        }
        if let Some(size) = self.cache_size {
            config.cache.capacity = size;
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache.ttl_secs = ttl.as_secs();
        }
        if let Some(shards) = self.shard_count {
            config.lock_shards = shards;
        }
        if let Some(rebuild) = self.rebuild_on_start {
            config.rebuild_on_start = rebuild;
        }
        if let Some(interval) = self.snapshot_interval {
            config.snapshot_interval_secs = interval.as_secs();
        }
        if let Some(timeout) = self.read_timeout {
            config.read_timeout_ms = millis(timeout);
        }
        if let Some(timeout) = self.write_timeout {
            config.write_timeout_ms = millis(timeout);
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Load the leaderboard configuration from defaults, file and flags
pub fn load_config(args: &Args) -> Result<LeaderboardConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&LeaderboardConfig::default())?);

    if let Some(path) = &args.config {
        builder = builder.add_source(
            config::File::from(path.as_path())
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }

    let mut leaderboard: LeaderboardConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    args.apply(&mut leaderboard);
    leaderboard.validate()?;
    Ok(leaderboard)
}

/// Parse a duration given as bare seconds or with a `ms`, `s`, `m` or `h` suffix
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(3600))),
        other => Err(format!("unknown duration unit '{other}' in '{s}'")),
    }
}
