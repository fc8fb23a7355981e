//! Podium Store - Durable and ranking store adapters
//!
//! The durable store is the system of record (redb). The ranking store is
//! an in-memory, order-statistic projection of it that answers rank,
//! top-N and neighbor queries in logarithmic time.

pub mod durable;
pub mod error;
pub mod memory;
pub mod order_stat;
pub mod ranking;
pub mod redb_store;
mod tables;

pub use durable::DurableStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryRankingStore;
pub use order_stat::OrderStatTree;
pub use ranking::{RankingStore, neighbor_start};
pub use redb_store::RedbStore;
