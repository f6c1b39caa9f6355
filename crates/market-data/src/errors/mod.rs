//! Error types for the upstream boundary.
//!
//! This module provides:
//! - [`MarketDataError`]: what an upstream client returns when a call fails
//! - [`ErrorKind`] / [`RefreshError`]: the normalized failure carried inside a
//!   [`RefreshResult`](crate::RefreshResult)
//! - [`ParseError`]: invalid instrument identifiers and market codes

mod kind;

pub use kind::ErrorKind;

use thiserror::Error;

/// Errors surfaced by an upstream market data client.
///
/// Clients return these from their fetch methods. They never reach the
/// scheduler directly: the refresh executor maps every variant to a
/// [`RefreshError`] via [`error_kind`](Self::error_kind).
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The upstream did not answer in time.
    #[error("Timeout: {operation}")]
    Timeout {
        /// The call that timed out
        operation: String,
    },

    /// The upstream answered with an error code.
    #[error("Upstream error {code}: {message}")]
    Upstream {
        /// Upstream return code
        code: i64,
        /// Upstream message
        message: String,
    },

    /// The client does not implement this call.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// The unsupported call
        operation: String,
    },

    /// The client has no live connection to the upstream.
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The upstream quota for this endpoint is exhausted.
    #[error("Rate limited: {endpoint}")]
    RateLimited {
        /// The throttled endpoint
        endpoint: String,
    },
}

impl MarketDataError {
    /// Returns the normalized error kind for this upstream failure.
    ///
    /// Only timeouts keep their identity; everything else the client reports
    /// is an upstream fault.
    ///
    /// # Examples
    ///
    /// ```
    /// use decidra_market_data::errors::{ErrorKind, MarketDataError};
    ///
    /// let error = MarketDataError::Timeout { operation: "quote".to_string() };
    /// assert_eq!(error.error_kind(), ErrorKind::Timeout);
    ///
    /// let error = MarketDataError::Disconnected("socket closed".to_string());
    /// assert_eq!(error.error_kind(), ErrorKind::UpstreamError);
    /// ```
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Upstream { .. }
            | Self::NotSupported { .. }
            | Self::Disconnected(_)
            | Self::RateLimited { .. } => ErrorKind::UpstreamError,
        }
    }

    /// Converts this error into the failure carried by a refresh result.
    pub fn into_refresh_error(self) -> RefreshError {
        RefreshError::new(self.error_kind(), self.to_string())
    }
}

/// A normalized refresh failure: what went wrong, and a short message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RefreshError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human readable detail (never the raw payload)
    pub message: String,
}

impl RefreshError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamError, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldCoercionError, message)
    }
}

/// Errors produced while parsing identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid instrument id '{0}': expected MARKET.CODE")]
    InvalidInstrumentId(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Unknown data kind: {0}")]
    UnknownDataKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_timeout_kind() {
        let error = MarketDataError::Timeout {
            operation: "fetch_quote HK.00700".to_string(),
        };
        assert_eq!(error.error_kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_upstream_faults_map_to_upstream_kind() {
        let errors = vec![
            MarketDataError::Upstream {
                code: -1,
                message: "quota exceeded".to_string(),
            },
            MarketDataError::NotSupported {
                operation: "fetch_ticks".to_string(),
            },
            MarketDataError::Disconnected("OpenD unreachable".to_string()),
            MarketDataError::RateLimited {
                endpoint: "quote".to_string(),
            },
        ];

        for error in errors {
            assert_eq!(error.error_kind(), ErrorKind::UpstreamError, "{}", error);
        }
    }

    #[test]
    fn test_into_refresh_error_keeps_message() {
        let error = MarketDataError::Upstream {
            code: -1,
            message: "unknown stock".to_string(),
        };
        let refresh = error.into_refresh_error();
        assert_eq!(refresh.kind, ErrorKind::UpstreamError);
        assert_eq!(refresh.message, "Upstream error -1: unknown stock");
    }

    #[test]
    fn test_refresh_error_display() {
        let error = RefreshError::malformed("unrecognized shape: string");
        assert_eq!(
            format!("{}", error),
            "MalformedResponse: unrecognized shape: string"
        );
    }
}
