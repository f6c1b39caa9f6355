use serde::{Deserialize, Serialize};

use decidra_market_data::SessionState;

/// How an instrument's data is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Market is open: pushed updates when the client supports them, fast polling otherwise.
    Realtime,
    /// Market is not in continuous trading: periodic polling only.
    Snapshot,
}

impl RefreshMode {
    pub fn for_session(state: SessionState) -> Self {
        if state.is_open() {
            RefreshMode::Realtime
        } else {
            RefreshMode::Snapshot
        }
    }
}
