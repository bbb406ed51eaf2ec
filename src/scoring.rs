//! Leaderboard computation.
//!
//! Scores are never stored. Every call recomputes the leaderboard from the
//! raw submission log joined with the challenges' flags and point values,
//! so an edited flag or point value is reflected on the next read.

use std::collections::HashMap;

use itertools::Itertools;
use uuid::Uuid;

/// One row fed into the leaderboard: a submission joined with its challenge.
#[derive(Clone, Debug)]
pub struct ScoredSubmission {
    /// The account that submitted the guess
    pub player: Uuid,
    /// The submitted guess
    pub guess: String,
    /// The correct flag of the challenge the guess was submitted for
    pub challenge_flag: String,
    /// The points the challenge is worth
    pub point_value: i64,
    /// The point in time the guess was submitted
    pub submitted_at: chrono::NaiveDateTime,
}

/// A single row of the computed leaderboard.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderboardEntry {
    /// The account this row belongs to
    pub player: Uuid,
    /// Sum of the point values of all correct submissions
    pub score: i64,
    /// Number of correct submissions
    pub challenges_solved: u64,
    /// The point in time of the correct submission that completed this score
    pub last_solve: chrono::NaiveDateTime,
}

/// Fold the submission log of a game into a ranked leaderboard.
///
/// Every submission whose guess matches its challenge's flag counts.
/// Deduplication of repeated solves is the submission gate's job, not
/// ours: if the log contains two correct rows for the same (player,
/// challenge) pair, both are summed.
///
/// The order is deterministic: score descending, ties broken by who
/// completed their score first, then by player uuid.
pub fn compute_leaderboard(
    submissions: impl IntoIterator<Item = ScoredSubmission>,
) -> Vec<LeaderboardEntry> {
    let mut scores: HashMap<Uuid, LeaderboardEntry> = HashMap::new();

    for submission in submissions {
        if submission.guess != submission.challenge_flag {
            continue;
        }

        let entry = scores
            .entry(submission.player)
            .or_insert_with(|| LeaderboardEntry {
                player: submission.player,
                score: 0,
                challenges_solved: 0,
                last_solve: submission.submitted_at,
            });
        entry.score += submission.point_value;
        entry.challenges_solved += 1;
        if submission.submitted_at > entry.last_solve {
            entry.last_solve = submission.submitted_at;
        }
    }

    scores
        .into_values()
        .sorted_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.last_solve.cmp(&b.last_solve))
                .then(a.player.cmp(&b.player))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn t(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    fn submission(player: Uuid, guess: &str, flag: &str, points: i64, at: u32) -> ScoredSubmission {
        ScoredSubmission {
            player,
            guess: guess.to_string(),
            challenge_flag: flag.to_string(),
            point_value: points,
            submitted_at: t(at),
        }
    }

    #[test]
    fn empty_log_yields_empty_leaderboard() {
        assert_eq!(compute_leaderboard([]), vec![]);
    }

    #[test]
    fn only_incorrect_submissions_yield_empty_leaderboard() {
        let player = Uuid::new_v4();
        let rows = vec![
            submission(player, "wrong", "FLAG{x}", 100, 0),
            submission(player, "also wrong", "FLAG{x}", 100, 1),
        ];
        assert_eq!(compute_leaderboard(rows), vec![]);
    }

    #[test]
    fn correct_submissions_accumulate_per_player() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let rows = vec![
            submission(alice, "FLAG{a}", "FLAG{a}", 100, 0),
            submission(alice, "nope", "FLAG{b}", 200, 1),
            submission(alice, "FLAG{b}", "FLAG{b}", 200, 2),
            submission(bob, "FLAG{a}", "FLAG{a}", 100, 3),
        ];

        let board = compute_leaderboard(rows);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].player, alice);
        assert_eq!(board[0].score, 300);
        assert_eq!(board[0].challenges_solved, 2);
        assert_eq!(board[0].last_solve, t(2));
        assert_eq!(board[1].player, bob);
        assert_eq!(board[1].score, 100);
        assert_eq!(board[1].challenges_solved, 1);
    }

    #[test]
    fn ties_are_broken_by_earliest_completion() {
        let fast = Uuid::new_v4();
        let slow = Uuid::new_v4();
        let rows = vec![
            submission(slow, "FLAG{a}", "FLAG{a}", 100, 5),
            submission(fast, "FLAG{a}", "FLAG{a}", 100, 1),
        ];

        let board = compute_leaderboard(rows);
        assert_eq!(board[0].player, fast);
        assert_eq!(board[1].player, slow);
    }

    #[test]
    fn tie_break_uses_the_last_qualifying_solve() {
        // both end up at 300, but a finished earlier
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![
            submission(a, "FLAG{x}", "FLAG{x}", 100, 0),
            submission(a, "FLAG{y}", "FLAG{y}", 200, 3),
            submission(b, "FLAG{y}", "FLAG{y}", 200, 1),
            submission(b, "FLAG{x}", "FLAG{x}", 100, 4),
        ];

        let board = compute_leaderboard(rows);
        assert_eq!(board[0].player, a);
        assert_eq!(board[0].last_solve, t(3));
        assert_eq!(board[1].player, b);
        assert_eq!(board[1].last_solve, t(4));
    }

    #[test]
    fn duplicate_correct_rows_are_summed_not_deduplicated() {
        // can only happen if the submission gate was bypassed,
        // the engine itself must not guess and counts both
        let player = Uuid::new_v4();
        let rows = vec![
            submission(player, "FLAG{x}", "FLAG{x}", 100, 0),
            submission(player, "FLAG{x}", "FLAG{x}", 100, 1),
        ];

        let board = compute_leaderboard(rows);
        assert_eq!(board[0].score, 200);
        assert_eq!(board[0].challenges_solved, 2);
    }

    #[test]
    fn deterministic_order_for_fully_equal_entries() {
        let mut players = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let rows: Vec<_> = players
            .iter()
            .map(|p| submission(*p, "FLAG{x}", "FLAG{x}", 100, 0))
            .collect();

        let board = compute_leaderboard(rows.clone());
        let reversed = compute_leaderboard(rows.into_iter().rev().collect::<Vec<_>>());
        assert_eq!(board, reversed);

        players.sort();
        let order: Vec<_> = board.into_iter().map(|e| e.player).collect();
        assert_eq!(order, players);
    }
}
