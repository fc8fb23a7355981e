//! Podium server - HTTP surface of the leaderboard
//!
//! Exposed as a library so the router can be exercised in tests without
//! binding a socket.

pub mod http;
pub mod metrics;
pub mod settings;
