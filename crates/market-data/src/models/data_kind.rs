use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Category of data refreshed for an instrument.
///
/// `Quote` is refreshed for every tracked instrument. The detail kinds are
/// only fetched while the instrument is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Quote,
    /// Order book levels
    Depth,
    /// Recent trades
    Ticks,
    /// Broker queue (HK only upstreams)
    BrokerQueue,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Quote,
        DataKind::Depth,
        DataKind::Ticks,
        DataKind::BrokerQueue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Quote => "quote",
            DataKind::Depth => "depth",
            DataKind::Ticks => "ticks",
            DataKind::BrokerQueue => "broker_queue",
        }
    }

    pub fn is_detail(&self) -> bool {
        !matches!(self, DataKind::Quote)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownDataKind(s.to_string()))
    }
}
