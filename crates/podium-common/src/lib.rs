//! Podium Common - Shared types and utilities
//!
//! This crate provides the data model, error definitions, and configuration
//! used across all Podium components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CacheConfig, LeaderboardConfig, RankingPolicy};
pub use error::{Error, Result};
pub use types::*;
