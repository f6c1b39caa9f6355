//! Market data models
//!
//! - `types` - Type aliases (InstrumentCode, EndpointId, RawRow)
//! - `instrument` - Instrument identity (InstrumentId) and Market enum
//! - `data_kind` - The categories of data refreshed per instrument
//! - `raw` - Upstream payload shapes before normalization (RawResult)
//! - `record` - Typed rows after normalization (NormalizedRecord, FieldValue)
//! - `result` - Outcome of one refresh attempt (RefreshResult)

mod data_kind;
mod instrument;
mod raw;
mod record;
mod result;
mod types;

pub use data_kind::DataKind;
pub use instrument::{InstrumentId, Market};
pub use raw::RawResult;
pub use record::{FieldValue, NormalizedRecord};
pub use result::RefreshResult;
pub use types::{EndpointId, InstrumentCode, RawRow};
