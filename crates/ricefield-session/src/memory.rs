//! In-memory persistence: the account/score ledger and a gateway over it.
//!
//! [`Ledger`] holds the actual data and rules (password hashing, score
//! accounting, leaderboard ordering). It is plain synchronous code with no
//! locking; [`InMemoryGateway`] and [`FileGateway`](crate::FileGateway)
//! each wrap one in a `RwLock` and differ only in whether they write it
//! to disk afterwards.

use std::collections::BTreeMap;

use rand::Rng;
use ricefield_protocol::{LeaderboardRow, MatchHistoryRow, Username};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::{GatewayError, MatchRecord, PersistenceGateway};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One stored account.
///
/// The password is never stored, only `sha256(salt || password)` with a
/// fresh random salt per account, both hex-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Account {
    salt: String,
    password_hash: String,
    total_score: u64,
    games_played: u32,
    games_won: u32,
}

/// Every account plus the append-only list of finished matches.
///
/// `BTreeMap` rather than `HashMap` so that the JSON snapshot written by
/// the file gateway is stable and diffable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Ledger {
    accounts: BTreeMap<Username, Account>,
    matches: Vec<MatchRecord>,
}

impl Ledger {
    pub(crate) fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub(crate) fn authenticate(&self, username: &str, password: &str) -> bool {
        self.accounts.get(username).is_some_and(|account| {
            hash_password(&account.salt, password) == account.password_hash
        })
    }

    /// Returns `false` if the name is taken.
    pub(crate) fn register(&mut self, username: &Username, password: &str) -> bool {
        if self.accounts.contains_key(username.as_str()) {
            return false;
        }
        let salt = generate_salt();
        let password_hash = hash_password(&salt, password);
        self.accounts.insert(
            username.clone(),
            Account {
                salt,
                password_hash,
                total_score: 0,
                games_played: 0,
                games_won: 0,
            },
        );
        true
    }

    pub(crate) fn unregister(&mut self, username: &Username) {
        self.accounts.remove(username.as_str());
    }

    pub(crate) fn current_score(&self, username: &Username) -> Result<u64, GatewayError> {
        self.accounts
            .get(username.as_str())
            .map(|account| account.total_score)
            .ok_or_else(|| GatewayError::UnknownUser(username.clone()))
    }

    pub(crate) fn apply(&mut self, record: &MatchRecord) {
        for (seat, player) in record.players.iter().enumerate() {
            let Some(account) = self.accounts.get_mut(player.as_str()) else {
                tracing::warn!(
                    %player,
                    match_id = %record.match_id,
                    "match result for unknown account, totals not updated"
                );
                continue;
            };
            account.total_score += u64::from(record.scores[seat]);
            account.games_played += 1;
            if record.winner.as_ref() == Some(player) {
                account.games_won += 1;
            }
        }
        self.matches.push(record.clone());
    }

    pub(crate) fn leaderboard(&self, limit: usize) -> Vec<LeaderboardRow> {
        let mut rows: Vec<LeaderboardRow> = self
            .accounts
            .iter()
            .filter(|(_, account)| account.games_played > 0)
            .map(|(username, account)| LeaderboardRow {
                username: username.clone(),
                total_score: account.total_score,
                games_played: account.games_played,
                games_won: account.games_won,
            })
            .collect();

        rows.sort_by(|a, b| {
            b.win_rate()
                .total_cmp(&a.win_rate())
                .then(b.total_score.cmp(&a.total_score))
                .then_with(|| a.username.cmp(&b.username))
        });
        rows.truncate(limit);
        rows
    }

    /// Newest first: matches are appended as they finish.
    pub(crate) fn history(&self, username: &Username, limit: usize) -> Vec<MatchHistoryRow> {
        self.matches
            .iter()
            .rev()
            .filter_map(|record| record.history_row_for(username.as_str()))
            .take(limit)
            .collect()
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// InMemoryGateway
// ---------------------------------------------------------------------------

/// A [`PersistenceGateway`] that keeps everything in process memory.
///
/// Data is lost on restart. This is the default for development and the
/// gateway used throughout the test suites.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    ledger: RwLock<Ledger>,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceGateway for InMemoryGateway {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, GatewayError> {
        Ok(self.ledger.read().await.authenticate(username, password))
    }

    async fn register(&self, username: &Username, password: &str) -> Result<bool, GatewayError> {
        Ok(self.ledger.write().await.register(username, password))
    }

    async fn current_score(&self, username: &Username) -> Result<u64, GatewayError> {
        self.ledger.read().await.current_score(username)
    }

    async fn record_match_result(&self, record: &MatchRecord) -> Result<(), GatewayError> {
        self.ledger.write().await.apply(record);
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardRow>, GatewayError> {
        Ok(self.ledger.read().await.leaderboard(limit))
    }

    async fn match_history(
        &self,
        username: &Username,
        limit: usize,
    ) -> Result<Vec<MatchHistoryRow>, GatewayError> {
        Ok(self.ledger.read().await.history(username, limit))
    }
}
