//! Rank policy application for result sequences

use podium_common::{RankEntry, RankingPolicy};

/// Rewrite ranks in an already ordered sequence so equal scores share a
/// rank and ranks stay contiguous. The first entry gets `first_rank`.
pub fn collapse_dense(entries: &mut [RankEntry], first_rank: u64) {
    let mut rank = first_rank;
    let mut previous: Option<i64> = None;
    for entry in entries {
        if previous.is_some_and(|score| score != entry.score) {
            rank += 1;
        }
        entry.rank = rank;
        previous = Some(entry.score);
    }
}

/// Whether sequences need collapsing under `policy`
#[must_use]
pub const fn collapses_ties(policy: RankingPolicy) -> bool {
    matches!(policy, RankingPolicy::Dense)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_common::PlayerId;

    fn entries(scores: &[i64]) -> Vec<RankEntry> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| RankEntry {
                player_id: PlayerId::new_unchecked(format!("p{i}")),
                rank: i as u64 + 1,
                score: *score,
                name: String::new(),
                updated_at: None,
            })
            .collect()
    }

    fn ranks(entries: &[RankEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.rank).collect()
    }

    #[test]
    fn test_dense_collapse() {
        let mut list = entries(&[100, 100, 80, 50, 50, 50]);
        assert_eq!(ranks(&list), vec![1, 2, 3, 4, 5, 6]);
        collapse_dense(&mut list, 1);
        assert_eq!(ranks(&list), vec![1, 1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_dense_collapse_seeded() {
        // A window starting mid-leaderboard keeps globally correct ranks
        let mut list = entries(&[80, 80, 50]);
        collapse_dense(&mut list, 4);
        assert_eq!(ranks(&list), vec![4, 4, 5]);
    }

    #[test]
    fn test_dense_collapse_empty() {
        let mut list = entries(&[]);
        collapse_dense(&mut list, 1);
        assert!(list.is_empty());
    }
}
