//! Core error types for the decidra refresh engine.

use thiserror::Error;

use decidra_market_data::ParseError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the refresh engine.
///
/// Refresh failures are not errors at this level: they travel inside
/// `RefreshResult::Failed` and drive backoff. This type covers caller
/// mistakes and configuration problems.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid group name: '{0}'")]
    InvalidGroupName(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),
}
