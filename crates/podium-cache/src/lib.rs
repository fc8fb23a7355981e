//! Podium Cache - local rank result cache
//!
//! A fixed-capacity cache combining LRU eviction with an absolute per-entry
//! TTL. Expired entries are removed lazily on read and proactively by a
//! background sweeper.

pub mod cache;
pub mod sweeper;

pub use cache::{CacheStats, LocalCache};
pub use sweeper::{SweeperHandle, spawn_sweeper};
