//! Core protocol types for Ricefield's wire format.
//!
//! Everything in here either travels on the wire as text or is the typed
//! form of something that does: player names, lobby and match ids, the
//! classification of a board cell, and the rows returned by the roster,
//! leaderboard and history queries.
//!
//! Display implementations ARE the wire encoding for these types. The
//! message layer composes them; it never formats their fields itself.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's unique, stable account name.
///
/// This is a "newtype wrapper" around `String`: the compiler will not let
/// a username be passed where a chat message or a password is expected,
/// even though all three are strings underneath.
///
/// `Username::new` accepts anything (used for names that arrive as command
/// targets, which are simply looked up). [`Username::parse`] enforces the
/// account-name rules and is what registration goes through.
///
/// `#[serde(transparent)]` serializes this as the bare string, so it also
/// works as a JSON object key.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Longest accepted account name, in characters.
    pub const MAX_LEN: usize = 32;

    /// Wraps a name without validating it.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validates and wraps an account name.
    ///
    /// A valid name is 1..=32 characters, contains no whitespace, and none
    /// of the protocol's field separators (`,` `:` `;`). A name containing a
    /// separator would corrupt every roster line it appears in.
    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        let len = name.chars().count();
        if len == 0 || len > Self::MAX_LEN {
            return Err(ProtocolError::InvalidUsername(format!(
                "length must be 1..={}",
                Self::MAX_LEN
            )));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | ':' | ';'))
        {
            return Err(ProtocolError::InvalidUsername(
                "must not contain whitespace or , : ;".into(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lets a `HashMap<Username, _>` be queried with a plain `&str`.
impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of a pre-match lobby. Travels as `LOBBY_<n>`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl LobbyId {
    const PREFIX: &'static str = "LOBBY_";
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

/// Accepts both the wire form (`LOBBY_7`) and the bare number (`7`).
impl FromStr for LobbyId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix(Self::PREFIX).unwrap_or(s);
        digits
            .parse()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId(s.to_string()))
    }
}

/// Identifier of a match. Travels as `GAME_<n>`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl MatchId {
    const PREFIX: &'static str = "GAME_";
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for MatchId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix(Self::PREFIX).unwrap_or(s);
        digits
            .parse()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server message produced by match logic.
///
/// Match rules return a list of `(Recipient, ServerMessage)` pairs instead
/// of sending anything themselves; the engine resolves the recipients to
/// outbound channels. This keeps the rules pure and testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Both players of the match.
    All,

    /// One specific player.
    Player(Username),

    /// Everyone except the named player (in a two-player match: the
    /// opponent).
    AllExcept(Username),
}

// ---------------------------------------------------------------------------
// Board cell classification
// ---------------------------------------------------------------------------

/// What a board cell is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrainKind {
    /// Worth +1 the first time it is claimed.
    Rice,
    /// Worth -1 on each resolve, floored at zero.
    Chaff,
}

impl fmt::Display for GrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rice => f.write_str("RICE"),
            Self::Chaff => f.write_str("CHAFF"),
        }
    }
}

/// An item a cell may carry on top of its grain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerupKind {
    #[default]
    None,
    Buff,
    Debuff,
}

impl PowerupKind {
    /// Returns `true` if the cell carries an item.
    pub fn is_some(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// The full classification of a cell, as reported in `GRAIN_RESULT` and
/// `OPPONENT_GRAIN_CLICK`: the grain, suffixed with the powerup if any
/// (`RICE`, `CHAFF_BUFF`, `RICE_DEBUFF`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKind {
    pub grain: GrainKind,
    pub powerup: PowerupKind,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grain)?;
        match self.powerup {
            PowerupKind::None => Ok(()),
            PowerupKind::Buff => f.write_str("_BUFF"),
            PowerupKind::Debuff => f.write_str("_DEBUFF"),
        }
    }
}

// ---------------------------------------------------------------------------
// Match outcomes
// ---------------------------------------------------------------------------

/// The outcome field of a `GAME_ENDED` line.
///
/// Normal completion reports the winner's name (or `DRAW`) identically to
/// both players. A forfeit is reported per recipient: the quitter sees
/// `QUIT_LOSS`, the remaining player sees `QUIT_WIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Winner(Username),
    Draw,
    QuitWin,
    QuitLoss,
}

impl fmt::Display for EndOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner(name) => write!(f, "{name}"),
            Self::Draw => f.write_str("DRAW"),
            Self::QuitWin => f.write_str("QUIT_WIN"),
            Self::QuitLoss => f.write_str("QUIT_LOSS"),
        }
    }
}

/// A match result from one player's point of view, used in history rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchResult {
    Win,
    Loss,
    Draw,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => f.write_str("WIN"),
            Self::Loss => f.write_str("LOSS"),
            Self::Draw => f.write_str("DRAW"),
        }
    }
}

// ---------------------------------------------------------------------------
// Query rows
// ---------------------------------------------------------------------------

/// Whether a user can currently be invited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    /// Not in a lobby or match.
    Free,
    /// In a lobby or a match.
    Busy,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("FREE"),
            Self::Busy => f.write_str("BUSY"),
        }
    }
}

/// One entry of the `ONLINE_USERS` roster: `user,score,STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    pub username: Username,
    pub total_score: u64,
    pub status: PresenceStatus,
}

impl fmt::Display for OnlineUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.username, self.total_score, self.status)
    }
}

/// One leaderboard entry: `user,total,played,won,winRate` with the win rate
/// as a percentage printed to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub username: Username,
    pub total_score: u64,
    pub games_played: u32,
    pub games_won: u32,
}

impl LeaderboardRow {
    /// Percentage of games won, or 0 for a player with no games.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.games_won) * 100.0 / f64::from(self.games_played)
        }
    }
}

impl fmt::Display for LeaderboardRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{:.2}",
            self.username,
            self.total_score,
            self.games_played,
            self.games_won,
            self.win_rate()
        )
    }
}

/// One match-history entry from the requesting player's point of view:
/// `matchId,opponent,WIN|LOSS|DRAW,myScore,opponentScore,durationSecs,playedAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchHistoryRow {
    pub match_id: MatchId,
    pub opponent: Username,
    pub result: MatchResult,
    pub my_score: u32,
    pub opponent_score: u32,
    pub duration_secs: u64,
    pub played_at: DateTime<Utc>,
}

impl fmt::Display for MatchHistoryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Timestamp carries tenths of a second: `2024-05-01 13:45:10.3`.
        write!(
            f,
            "{},{},{},{},{},{},{}.{}",
            self.match_id,
            self.opponent,
            self.result,
            self.my_score,
            self.opponent_score,
            self.duration_secs,
            self.played_at.format("%Y-%m-%d %H:%M:%S"),
            self.played_at.timestamp_subsec_millis() / 100
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    // =====================================================================
    // Username
    // =====================================================================

    #[test]
    fn test_username_parse_valid_name_accepted() {
        let name = Username::parse("alice_01").expect("valid name");
        assert_eq!(name.as_str(), "alice_01");
        assert_eq!(name.to_string(), "alice_01");
    }

    #[test]
    fn test_username_parse_empty_rejected() {
        assert!(matches!(
            Username::parse(""),
            Err(ProtocolError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_username_parse_too_long_rejected() {
        let long = "a".repeat(Username::MAX_LEN + 1);
        assert!(Username::parse(&long).is_err());
        let exact = "a".repeat(Username::MAX_LEN);
        assert!(Username::parse(&exact).is_ok());
    }

    #[test]
    fn test_username_parse_separator_or_space_rejected() {
        for bad in ["a,b", "a:b", "a;b", "a b", "tab\tname"] {
            assert!(Username::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_username_borrow_str_allows_map_lookup_by_str() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Username::new("bob"), 7);
        assert_eq!(map.get("bob"), Some(&7));
    }

    #[test]
    fn test_username_serializes_as_bare_string() {
        let json = serde_json::to_string(&Username::new("carol")).unwrap();
        assert_eq!(json, "\"carol\"");
    }

    // =====================================================================
    // LobbyId / MatchId
    // =====================================================================

    #[test]
    fn test_lobby_id_display_uses_prefix() {
        assert_eq!(LobbyId(3).to_string(), "LOBBY_3");
    }

    #[test]
    fn test_lobby_id_from_str_accepts_prefixed_and_bare() {
        assert_eq!("LOBBY_12".parse::<LobbyId>().unwrap(), LobbyId(12));
        assert_eq!("12".parse::<LobbyId>().unwrap(), LobbyId(12));
    }

    #[test]
    fn test_lobby_id_from_str_garbage_rejected() {
        assert!(matches!(
            "LOBBY_x".parse::<LobbyId>(),
            Err(ProtocolError::InvalidId(_))
        ));
        assert!("".parse::<LobbyId>().is_err());
    }

    #[test]
    fn test_match_id_display_and_parse() {
        assert_eq!(MatchId(9).to_string(), "GAME_9");
        assert_eq!("GAME_9".parse::<MatchId>().unwrap(), MatchId(9));
    }

    // =====================================================================
    // CellKind / outcomes
    // =====================================================================

    #[test]
    fn test_cell_kind_display_all_combinations() {
        let cases = [
            (GrainKind::Rice, PowerupKind::None, "RICE"),
            (GrainKind::Rice, PowerupKind::Buff, "RICE_BUFF"),
            (GrainKind::Rice, PowerupKind::Debuff, "RICE_DEBUFF"),
            (GrainKind::Chaff, PowerupKind::None, "CHAFF"),
            (GrainKind::Chaff, PowerupKind::Buff, "CHAFF_BUFF"),
            (GrainKind::Chaff, PowerupKind::Debuff, "CHAFF_DEBUFF"),
        ];
        for (grain, powerup, expected) in cases {
            assert_eq!(CellKind { grain, powerup }.to_string(), expected);
        }
    }

    #[test]
    fn test_end_outcome_display() {
        assert_eq!(EndOutcome::Winner(Username::new("amy")).to_string(), "amy");
        assert_eq!(EndOutcome::Draw.to_string(), "DRAW");
        assert_eq!(EndOutcome::QuitWin.to_string(), "QUIT_WIN");
        assert_eq!(EndOutcome::QuitLoss.to_string(), "QUIT_LOSS");
    }

    // =====================================================================
    // Rows
    // =====================================================================

    #[test]
    fn test_online_user_display() {
        let row = OnlineUser {
            username: Username::new("dan"),
            total_score: 120,
            status: PresenceStatus::Busy,
        };
        assert_eq!(row.to_string(), "dan,120,BUSY");
    }

    #[test]
    fn test_leaderboard_row_win_rate_two_decimals() {
        let row = LeaderboardRow {
            username: Username::new("eve"),
            total_score: 90,
            games_played: 3,
            games_won: 2,
        };
        assert_eq!(row.to_string(), "eve,90,3,2,66.67");
    }

    #[test]
    fn test_leaderboard_row_no_games_zero_rate() {
        let row = LeaderboardRow {
            username: Username::new("fay"),
            total_score: 0,
            games_played: 0,
            games_won: 0,
        };
        assert_eq!(row.win_rate(), 0.0);
    }

    #[test]
    fn test_match_history_row_display_includes_tenths() {
        let played_at = Utc
            .with_ymd_and_hms(2024, 5, 1, 13, 45, 10)
            .unwrap()
            + chrono::Duration::milliseconds(350);
        let row = MatchHistoryRow {
            match_id: MatchId(4),
            opponent: Username::new("gus"),
            result: MatchResult::Win,
            my_score: 50,
            opponent_score: 31,
            duration_secs: 72,
            played_at,
        };
        assert_eq!(
            row.to_string(),
            "GAME_4,gus,WIN,50,31,72,2024-05-01 13:45:10.3"
        );
    }
}
