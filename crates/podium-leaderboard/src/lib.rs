//! Podium Leaderboard - ranking orchestration
//!
//! Sequences writes across the durable and ranking stores, applies the
//! configured ranking policy, serves reads through the local cache and
//! runs background reconciliation.

pub mod locks;
pub mod maintenance;
pub mod policy;
pub mod service;

pub use locks::PlayerLocks;
pub use maintenance::MaintenanceHandle;
pub use service::{CachedRank, DegradedStep, Leaderboard, RebuildReport, ScoreUpdate};
