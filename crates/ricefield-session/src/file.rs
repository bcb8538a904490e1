//! A gateway that survives restarts by snapshotting the ledger to JSON.

use std::io;
use std::path::{Path, PathBuf};

use ricefield_protocol::{LeaderboardRow, MatchHistoryRow, Username};
use tokio::sync::RwLock;

use crate::memory::Ledger;
use crate::{GatewayError, MatchRecord, PersistenceGateway};

/// A [`PersistenceGateway`] backed by a single JSON file.
///
/// The whole ledger lives in memory and is rewritten after every mutation:
/// first to a sibling `*.tmp` file, then renamed over the real one, so a
/// crash mid-write leaves the previous snapshot intact. Writes happen while
/// the ledger's write lock is held, which keeps snapshots in mutation order.
#[derive(Debug)]
pub struct FileGateway {
    path: PathBuf,
    ledger: RwLock<Ledger>,
}

impl FileGateway {
    /// Opens the ledger at `path`, starting empty if the file does not
    /// exist yet.
    ///
    /// # Errors
    /// - [`GatewayError::Io`] if the file exists but cannot be read.
    /// - [`GatewayError::Corrupt`] if it is not a valid ledger snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let path = path.into();
        let ledger = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ledger::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            path = %path.display(),
            accounts = ledger.account_count(),
            "ledger loaded"
        );
        Ok(Self {
            path,
            ledger: RwLock::new(ledger),
        })
    }

    /// The file this gateway writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, ledger: &Ledger) -> Result<(), GatewayError> {
        let bytes = serde_json::to_vec_pretty(ledger)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl PersistenceGateway for FileGateway {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, GatewayError> {
        Ok(self.ledger.read().await.authenticate(username, password))
    }

    async fn register(&self, username: &Username, password: &str) -> Result<bool, GatewayError> {
        let mut ledger = self.ledger.write().await;
        if !ledger.register(username, password) {
            return Ok(false);
        }
        // An account that never reached disk must not be usable either.
        if let Err(e) = self.persist(&ledger).await {
            ledger.unregister(username);
            return Err(e);
        }
        Ok(true)
    }

    async fn current_score(&self, username: &Username) -> Result<u64, GatewayError> {
        self.ledger.read().await.current_score(username)
    }

    async fn record_match_result(&self, record: &MatchRecord) -> Result<(), GatewayError> {
        let mut ledger = self.ledger.write().await;
        ledger.apply(record);
        self.persist(&ledger).await
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
