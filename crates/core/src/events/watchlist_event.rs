use serde::{Deserialize, Serialize};

use decidra_market_data::InstrumentId;

/// Tracking changes emitted by the watchlist manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchlistEvent {
    /// The instrument entered its first group.
    InstrumentTracked { instrument: InstrumentId },

    /// The instrument left its last group.
    InstrumentUntracked { instrument: InstrumentId },
}

impl WatchlistEvent {
    pub fn tracked(instrument: InstrumentId) -> Self {
        Self::InstrumentTracked { instrument }
    }

    pub fn untracked(instrument: InstrumentId) -> Self {
        Self::InstrumentUntracked { instrument }
    }

    pub fn instrument(&self) -> &InstrumentId {
        match self {
            Self::InstrumentTracked { instrument } | Self::InstrumentUntracked { instrument } => {
                instrument
            }
        }
    }
}
