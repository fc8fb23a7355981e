//! Redb table definitions for the durable store.

use redb::TableDefinition;

// Key: player id, Value: JSON(Player)
pub const PLAYERS: TableDefinition<&str, &str> = TableDefinition::new("players");

// Key: "player_id\x00{seq:016x}", Value: JSON(ScoreHistoryEntry)
// The fixed-width hex sequence keeps one player's entries contiguous and in append order.
pub const SCORE_HISTORY: TableDefinition<&str, &str> = TableDefinition::new("score_history");

// Key: snapshot seq, Value: JSON(SnapshotHeader)
pub const SNAPSHOT_HEADERS: TableDefinition<u64, &str> = TableDefinition::new("snapshot_headers");
// Key: snapshot seq, Value: opaque serialized player set
pub const SNAPSHOT_DATA: TableDefinition<u64, &[u8]> = TableDefinition::new("snapshot_data");

// Counters (e.g. the history sequence)
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub const HISTORY_SEQ: &str = "history_seq";

/// History key for one entry
pub fn history_key(player_id: &str, seq: u64) -> String {
    format!("{player_id}\x00{seq:016x}")
}

/// Half-open key range covering every history entry of one player
pub fn history_range(player_id: &str) -> (String, String) {
    (format!("{player_id}\x00"), format!("{player_id}\x01"))
}
