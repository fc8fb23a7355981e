//! Core type definitions for Podium
//!
//! This module defines the player identity, the durable records owned by
//! the durable store, and the transient rank view computed on demand.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a player identity, in code points
pub const MAX_PLAYER_ID_CHARS: usize = 64;

/// Opaque player identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Create a new player id (validates length and characters)
    pub fn new(id: impl Into<String>) -> Result<Self, PlayerIdError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create without validation (internal use only, e.g. rows read back from a store)
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn validate(id: &str) -> Result<(), PlayerIdError> {
        if id.is_empty() {
            return Err(PlayerIdError::Empty);
        }

        let chars = id.chars().count();
        if chars > MAX_PLAYER_ID_CHARS {
            return Err(PlayerIdError::TooLong(chars));
        }

        // NUL separates the identity from the sequence number in history keys
        if id.contains('\0') {
            return Err(PlayerIdError::ContainsNul);
        }

        Ok(())
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({:?})", self.0)
    }
}

impl AsRef<str> for PlayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PlayerId {
    type Err = PlayerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Errors that can occur when creating a player id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerIdError {
    #[error("player id must not be empty")]
    Empty,
    #[error("player id must be at most {MAX_PLAYER_ID_CHARS} characters, got {0}")]
    TooLong(usize),
    #[error("player id must not contain NUL characters")]
    ContainsNul,
}

/// Authoritative player row owned by the durable store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    pub total_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One applied delta, as recorded in the append-only history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryEntry {
    /// Store-assigned sequence number (monotonic across all players)
    pub seq: u64,
    pub player_id: PlayerId,
    pub delta: i64,
    pub final_score: i64,
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// History entry before the store assigns its sequence number and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub player_id: PlayerId,
    pub delta: i64,
    pub final_score: i64,
    pub reason: String,
}

/// Computed rank view; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub player_id: PlayerId,
    /// 1-based rank
    pub rank: u64,
    pub score: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Durable point-in-time serialization of the full player set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub seq: u64,
    pub player_count: usize,
    pub created_at: DateTime<Utc>,
    /// Opaque serialized player set (JSON array of `Player`)
    pub data: Vec<u8>,
}

impl SnapshotRecord {
    /// Decode the player set stored in this snapshot
    pub fn players(&self) -> Result<Vec<Player>, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_valid() {
        assert!(PlayerId::new("player-1").is_ok());
        assert!(PlayerId::new("玩家").is_ok());
        assert!(PlayerId::new("x".repeat(MAX_PLAYER_ID_CHARS)).is_ok());
    }

    #[test]
    fn test_player_id_invalid() {
        assert_eq!(PlayerId::new(""), Err(PlayerIdError::Empty));
        assert_eq!(
            PlayerId::new("x".repeat(MAX_PLAYER_ID_CHARS + 1)),
            Err(PlayerIdError::TooLong(MAX_PLAYER_ID_CHARS + 1))
        );
        assert_eq!(PlayerId::new("a\0b"), Err(PlayerIdError::ContainsNul));
    }

    #[test]
    fn test_player_id_counts_code_points_not_bytes() {
        // 64 three-byte characters is still within the limit
        let id = "界".repeat(MAX_PLAYER_ID_CHARS);
        assert!(id.len() > MAX_PLAYER_ID_CHARS);
        assert!(PlayerId::new(id).is_ok());
    }

    #[test]
    fn test_rank_entry_serializes_camel_case_and_omits_empty() {
        let entry = RankEntry {
            player_id: PlayerId::new_unchecked("p1"),
            rank: 1,
            score: 42,
            name: String::new(),
            updated_at: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["rank"], 1);
        assert!(json.get("name").is_none());
        assert!(json.get("updatedAt").is_none());
    }

    #[test]
    fn test_history_entry_serializes_camel_case() {
        let entry = ScoreHistoryEntry {
            seq: 7,
            player_id: PlayerId::new_unchecked("p1"),
            delta: 5,
            final_score: 12,
            reason: "match".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["finalScore"], 12);
        assert!(json.get("final_score").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
