use std::fmt;

use serde::{Deserialize, Serialize};

/// Trading phase of a market at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    PreMarket,
    Open,
    /// Lunch break between two regular sessions
    Break,
    AfterHours,
    Closed,
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        SessionState::PreMarket,
        SessionState::Open,
        SessionState::Break,
        SessionState::AfterHours,
        SessionState::Closed,
    ];

    /// Regular continuous trading.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Any phase where prices can move.
    pub fn is_trading(&self) -> bool {
        matches!(
            self,
            SessionState::PreMarket | SessionState::Open | SessionState::AfterHours
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::PreMarket => "PRE_MARKET",
            SessionState::Open => "OPEN",
            SessionState::Break => "BREAK",
            SessionState::AfterHours => "AFTER_HOURS",
            SessionState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
