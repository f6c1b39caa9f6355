//! Upstream-reported market states.

use super::state::SessionState;

/// Maps an upstream market-state label to a session state.
///
/// Labels are matched case-insensitively. Unknown labels return `None` and
/// the caller falls back to its own classification.
pub fn parse_upstream_state(label: &str) -> Option<SessionState> {
    let state = match label.trim().to_ascii_uppercase().as_str() {
        "MORNING" | "AFTERNOON" | "TRADING" | "NIGHT_OPEN" | "FUTURE_DAY_OPEN" => {
            SessionState::Open
        }
        "REST" | "LUNCH" | "FUTURE_DAY_BREAK" => SessionState::Break,
        "AUCTION" | "WAITING_OPEN" | "PRE_MARKET_BEGIN" | "FUTURE_DAY_WAIT_OPEN" => {
            SessionState::PreMarket
        }
        "AFTER_HOURS_BEGIN" | "HK_CAS" => SessionState::AfterHours,
        "CLOSED" | "CLOSE" | "PRE_MARKET_END" | "AFTER_HOURS_END" | "NIGHT_END"
        | "FUTURE_DAY_CLOSE" | "HALT" | "SUSPEND" | "NONE" => SessionState::Closed,
        _ => return None,
    };
    Some(state)
}
