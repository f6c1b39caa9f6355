use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::InstrumentCode;
use crate::errors::ParseError;

/// Exchange an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// Hong Kong Exchanges
    Hk,
    /// US equities (NYSE, NASDAQ, AMEX)
    Us,
    /// Shanghai Stock Exchange
    Sh,
    /// Shenzhen Stock Exchange
    Sz,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Hk, Market::Us, Market::Sh, Market::Sz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Hk => "HK",
            Market::Us => "US",
            Market::Sh => "SH",
            Market::Sz => "SZ",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HK" => Ok(Market::Hk),
            "US" => Ok(Market::Us),
            "SH" => Ok(Market::Sh),
            "SZ" => Ok(Market::Sz),
            other => Err(ParseError::UnknownMarket(other.to_string())),
        }
    }
}

/// Identity of a tracked instrument: a market plus the code within it.
///
/// The canonical text form is `MARKET.CODE`, e.g. `HK.00700` or `US.AAPL`.
/// Cloning is cheap; the code is shared.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId {
    market: Market,
    code: InstrumentCode,
}

impl InstrumentId {
    pub fn new(market: Market, code: impl Into<InstrumentCode>) -> Self {
        Self {
            market,
            code: code.into(),
        }
    }

    pub fn market(&self) -> Market {
        self.market
    }

    /// The bare code without the market prefix.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether an upstream `code` field refers to this instrument.
    ///
    /// Upstreams echo either the full `MARKET.CODE` form or the bare code.
    pub fn matches_code(&self, upstream_code: &str) -> bool {
        let upstream_code = upstream_code.trim();
        match upstream_code.split_once('.') {
            Some((market, code)) => {
                market.eq_ignore_ascii_case(self.market.as_str()) && code == &*self.code
            }
            None => upstream_code == &*self.code,
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.market, self.code)
    }
}

impl FromStr for InstrumentId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (market, code) = trimmed
            .split_once('.')
            .ok_or_else(|| ParseError::InvalidInstrumentId(s.to_string()))?;
        if code.is_empty() || code.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidInstrumentId(s.to_string()));
        }
        Ok(Self::new(market.parse()?, Arc::<str>::from(code)))
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: InstrumentId = "HK.00700".parse().unwrap();
        assert_eq!(id.market(), Market::Hk);
        assert_eq!(id.code(), "00700");
        assert_eq!(id.to_string(), "HK.00700");
    }

    #[test]
    fn test_parse_lowercase_market() {
        let id: InstrumentId = "us.AAPL".parse().unwrap();
        assert_eq!(id, InstrumentId::new(Market::Us, "AAPL"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            "00700".parse::<InstrumentId>(),
            Err(ParseError::InvalidInstrumentId("00700".to_string()))
        );
        assert_eq!(
            "HK.".parse::<InstrumentId>(),
            Err(ParseError::InvalidInstrumentId("HK.".to_string()))
        );
        assert_eq!(
            "JP.7203".parse::<InstrumentId>(),
            Err(ParseError::UnknownMarket("JP".to_string()))
        );
    }

    #[test]
    fn test_matches_code() {
        let id = InstrumentId::new(Market::Hk, "00700");
        assert!(id.matches_code("HK.00700"));
        assert!(id.matches_code("00700"));
        assert!(!id.matches_code("US.00700"));
        assert!(!id.matches_code("09988"));
    }

    #[test]
    fn test_serde_as_string() {
        let id = InstrumentId::new(Market::Sh, "600519");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"SH.600519\"");
        let back: InstrumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
