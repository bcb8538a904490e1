//! Server configuration.

use std::path::Path;
use std::time::Duration;

use ricefield_room::MatchConfig;
use ricefield_transport::DEFAULT_MAX_LINE_LENGTH;
use serde::{Deserialize, Serialize};

use crate::RicefieldError;

/// Everything the server needs to start, loadable from a JSON file.
///
/// Every field has a default, so `{}` is a valid config file and a file
/// only has to name what it changes:
///
/// ```json
/// { "bind_addr": "0.0.0.0:9000", "game": { "target_score": 30 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,

    /// Seconds of client silence before the connection is dropped.
    /// `0` disables the check.
    pub idle_timeout_secs: u64,

    /// Longest accepted client line in bytes. Longer lines are skipped.
    pub max_line_length: usize,

    /// Rules for every match this server runs.
    pub game: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".to_string(),
            idle_timeout_secs: 0,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            game: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads a config from a JSON file.
    ///
    /// # Errors
    /// [`RicefieldError::ConfigRead`] / [`RicefieldError::ConfigParse`]
    /// naming the file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RicefieldError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            RicefieldError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }
        })?;
        serde_json::from_str(&text).map_err(|source| RicefieldError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Checks the server settings and the match config.
    pub fn validate(&self) -> Result<(), RicefieldError> {
        if self.max_line_length == 0 {
            return Err(RicefieldError::InvalidConfig(
                "max_line_length must be at least 1".into(),
            ));
        }
        self.game.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8888");
        assert_eq!(config.idle_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(
            &path,
            r#"{ "idle_timeout_secs": 30, "game": { "target_score": 20 } }"#,
        )
        .unwrap();

        let config = ServerConfig::from_json_file(&path).unwrap();

        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.game.target_score, 20);
        assert_eq!(config.game.total_cells, 100);
        assert_eq!(config.bind_addr, "127.0.0.1:8888");
    }

    #[test]
    fn test_from_json_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::from_json_file(dir.path().join("nope.json"));
        assert!(matches!(result, Err(RicefieldError::ConfigRead { .. })));
    }

    #[test]
    fn test_from_json_file_garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, "bind_addr = 1").unwrap();

        let result = ServerConfig::from_json_file(&path);
        assert!(matches!(result, Err(RicefieldError::ConfigParse { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_game_config() {
        let mut config = ServerConfig::default();
        config.game.rice_cells = config.game.total_cells + 1;
        assert!(matches!(config.validate(), Err(RicefieldError::Room(_))));
    }

    #[test]
    fn test_validate_rejects_zero_line_length() {
        let config = ServerConfig {
            max_line_length: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RicefieldError::InvalidConfig(_))
        ));
    }
}
