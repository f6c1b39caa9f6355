use std::borrow::Cow;
use std::sync::Arc;

/// Bare instrument code within its market (e.g. "00700"), discovered at runtime
pub type InstrumentCode = Arc<str>;

/// Rate limit bucket key - mostly static ("quote", "batch:quote", ...)
pub type EndpointId = Cow<'static, str>;

/// One raw upstream row, keyed by field name
pub type RawRow = serde_json::Map<String, serde_json::Value>;
