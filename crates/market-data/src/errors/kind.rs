use serde::{Deserialize, Serialize};

/// Classification of a failed refresh.
///
/// Every kind is transient from the scheduler's point of view: the instrument
/// backs off and retries.
///
/// | Kind | Produced by |
/// |------|-------------|
/// | `Timeout` | executor deadline, or a client reporting a timeout |
/// | `UpstreamError` | any other client error, client panics, error-as-value payloads |
/// | `MalformedResponse` | normalizer, unrecognized payload shape |
/// | `FieldCoercionError` | normalizer, a declared field failed to parse |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Timeout,
    UpstreamError,
    MalformedResponse,
    FieldCoercionError,
}

impl ErrorKind {
    /// Whether the failure came from the payload itself rather than the call.
    ///
    /// Shape and coercion failures are logged with the shape descriptor.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::MalformedResponse | Self::FieldCoercionError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::UpstreamError => write!(f, "UpstreamError"),
            Self::MalformedResponse => write!(f, "MalformedResponse"),
            Self::FieldCoercionError => write!(f, "FieldCoercionError"),
        }
    }
}
