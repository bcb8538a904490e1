//! The persistence collaborator: accounts, score ledger, and queries.
//!
//! Ricefield doesn't care WHERE accounts and results live: a database, a
//! JSON file, memory in a test. It defines the [`PersistenceGateway`] trait
//! with exactly the operations the game needs, and the server is generic
//! over it.
//!
//! # Failure policy
//!
//! Every method returns `Result<_, GatewayError>`. Callers treat an error as
//! "storage is unreachable right now": they log it and degrade (a login is
//! refused, a leaderboard comes back empty, a finished match stays
//! unpersisted). Nothing in the game state is rolled back because storage
//! failed.

use std::future::Future;

use chrono::{DateTime, Utc};
use ricefield_protocol::{
    LeaderboardRow, MatchHistoryRow, MatchId, MatchResult, Username,
};
use serde::{Deserialize, Serialize};

/// Errors reported by a [`PersistenceGateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The backing store refused or could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be (de)serialized.
    #[error("corrupt storage data: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The named account does not exist.
    #[error("unknown user {0}")]
    UnknownUser(Username),
}

/// The final tally of one match, handed to the gateway when it ends.
///
/// `players` and `scores` are in match order: index 0 is the lobby host.
/// `winner` is `None` for a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub players: [Username; 2],
    pub scores: [u32; 2],
    pub winner: Option<Username>,
    pub duration_secs: u64,
    pub played_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Returns the index of `player` in this match, if they took part.
    pub fn seat_of(&self, player: &str) -> Option<usize> {
        self.players.iter().position(|p| p.as_str() == player)
    }

    /// The result of this match from `player`'s point of view.
    pub fn result_for(&self, player: &str) -> Option<MatchResult> {
        self.seat_of(player)?;
        Some(match &self.winner {
            None => MatchResult::Draw,
            Some(w) if w.as_str() == player => MatchResult::Win,
            Some(_) => MatchResult::Loss,
        })
    }

    /// Builds the history row `player` sees for this match.
    pub fn history_row_for(&self, player: &str) -> Option<MatchHistoryRow> {
        let me = self.seat_of(player)?;
        let them = 1 - me;
        Some(MatchHistoryRow {
            match_id: self.match_id,
            opponent: self.players[them].clone(),
            result: self.result_for(player)?,
            my_score: self.scores[me],
            opponent_score: self.scores[them],
            duration_secs: self.duration_secs,
            played_at: self.played_at,
        })
    }
}

/// Storage operations the game core depends on.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one gateway is shared (behind an `Arc`) by
///   every connection task and every match watcher for the whole life of
///   the server.
/// - Every returned future is `Send` so it can be awaited inside
///   `tokio::spawn`ed tasks.
///
/// Implementations may be written with plain `async fn`:
///
/// ```rust
/// use ricefield_protocol::{LeaderboardRow, MatchHistoryRow, Username};
/// use ricefield_session::{GatewayError, MatchRecord, PersistenceGateway};
///
/// /// Refuses everything. Handy for exercising failure paths.
/// struct Offline;
///
/// impl PersistenceGateway for Offline {
///     async fn authenticate(&self, _: &str, _: &str) -> Result<bool, GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
///     async fn register(&self, _: &Username, _: &str) -> Result<bool, GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
///     async fn current_score(&self, _: &Username) -> Result<u64, GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
///     async fn record_match_result(&self, _: &MatchRecord) -> Result<(), GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
///     async fn leaderboard(&self, _: usize) -> Result<Vec<LeaderboardRow>, GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
///     async fn match_history(
///         &self,
///         _: &Username,
///         _: usize,
///     ) -> Result<Vec<MatchHistoryRow>, GatewayError> {
///         Err(GatewayError::Unavailable("offline".into()))
///     }
/// }
/// ```
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Checks a username/password pair. `Ok(false)` means "wrong
    /// credentials or unknown user"; the two are not distinguished.
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// Creates an account. `Ok(false)` means the name is taken.
    fn register(
        &self,
        username: &Username,
        password: &str,
    ) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// The user's persisted total score.
    fn current_score(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<u64, GatewayError>> + Send;

    /// Adds each player's match score to their total, bumps games played
    /// for both and games won for the winner, and appends the match to the
    /// history ledger.
    fn record_match_result(
        &self,
        record: &MatchRecord,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Players with at least one game, best win rate first (ties broken by
    /// total score), at most `limit` rows.
    fn leaderboard(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LeaderboardRow>, GatewayError>> + Send;

    /// The user's matches, newest first, at most `limit` rows.
    fn match_history(
        &self,
        username: &Username,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MatchHistoryRow>, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(winner: Option<&str>) -> MatchRecord {
        MatchRecord {
            match_id: MatchId(1),
            players: [Username::new("amy"), Username::new("bob")],
            scores: [50, 20],
            winner: winner.map(Username::new),
            duration_secs: 64,
            played_at: Utc::now(),
        }
    }

    #[test]
    fn test_result_for_winner_and_loser() {
        let rec = record(Some("amy"));
        assert_eq!(rec.result_for("amy"), Some(MatchResult::Win));
        assert_eq!(rec.result_for("bob"), Some(MatchResult::Loss));
        assert_eq!(rec.result_for("zed"), None);
    }

    #[test]
    fn test_result_for_draw() {
        let rec = record(None);
        assert_eq!(rec.result_for("amy"), Some(MatchResult::Draw));
        assert_eq!(rec.result_for("bob"), Some(MatchResult::Draw));
    }

    #[test]
    fn test_history_row_for_swaps_perspective() {
        let rec = record(Some("amy"));
        let row = rec.history_row_for("bob").expect("bob played");
        assert_eq!(row.opponent.as_str(), "amy");
        assert_eq!(row.result, MatchResult::Loss);
        assert_eq!(row.my_score, 20);
        assert_eq!(row.opponent_score, 50);
        assert_eq!(row.duration_secs, 64);
    }
}
