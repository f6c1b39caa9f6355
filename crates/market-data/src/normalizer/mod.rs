//! Response normalization.
//!
//! Turns whatever an upstream client returned into a [`RefreshResult`]:
//!
//! ```text
//!  RawResult ──► shape rule ──► rows ──► per-field coercion ──► RefreshResult
//!     │                                        │
//!     ├─ Empty / no rows ──────────────────────┼──────────────► Empty
//!     ├─ Error{code,msg} ──────────────────────┼──────────────► Failed(UpstreamError)
//!     └─ Unrecognized ─────────────────────────┘              ► Failed(MalformedResponse)
//!                                  declared field fails ──────► Failed(FieldCoercionError)
//! ```
//!
//! Normalization is pure. Failures are logged with a shape descriptor,
//! never with field values.

mod coerce;
mod demux;
mod schema;

pub use coerce::CoercionFailure;
pub use demux::demultiplex;
pub use schema::{declared_type, schema_for, FieldSpec, FieldType};

use log::warn;
use serde_json::Value;

use crate::errors::RefreshError;
use crate::models::{DataKind, NormalizedRecord, RawResult, RawRow, RefreshResult};

/// Normalizes one upstream payload for `kind`.
///
/// # Examples
///
/// ```
/// use decidra_market_data::models::{DataKind, RawResult, RefreshResult};
/// use decidra_market_data::normalizer::normalize;
/// use serde_json::json;
///
/// let raw = RawResult::from_json(json!({"price": 320.5, "ts": 100}));
/// match normalize(&raw, DataKind::Quote) {
///     RefreshResult::Ok(records) => assert_eq!(records.len(), 1),
///     other => panic!("unexpected {:?}", other),
/// }
///
/// assert_eq!(normalize(&RawResult::Empty, DataKind::Quote), RefreshResult::Empty);
/// ```
pub fn normalize(raw: &RawResult, kind: DataKind) -> RefreshResult {
    let outcome = match raw {
        RawResult::Empty => return RefreshResult::Empty,
        RawResult::Row(row) => convert_rows(std::iter::once(row), kind),
        RawResult::Rows(rows) => convert_rows(rows.iter(), kind),
        RawResult::Table { columns, rows } => convert_table(columns, rows, kind),
        RawResult::Error { code, message } => {
            return RefreshResult::Failed(RefreshError::upstream(format!(
                "upstream returned error {}: {}",
                code, message
            )))
        }
        RawResult::Unrecognized(_) => Err(RefreshError::malformed(format!(
            "unrecognized {} response",
            kind
        ))),
    };

    match outcome {
        Ok(records) => RefreshResult::from_records(records),
        Err(error) => {
            warn!(
                "Failed to normalize {} response (shape {}): {}",
                kind,
                raw.shape(),
                error
            );
            RefreshResult::Failed(error)
        }
    }
}

fn convert_rows<'a>(
    rows: impl Iterator<Item = &'a RawRow>,
    kind: DataKind,
) -> Result<Vec<NormalizedRecord>, RefreshError> {
    rows.enumerate()
        .map(|(index, row)| {
            convert_row(row.iter().map(|(name, value)| (name.as_str(), value)), index, kind)
        })
        .collect()
}

fn convert_table(
    columns: &[String],
    rows: &[Vec<Value>],
    kind: DataKind,
) -> Result<Vec<NormalizedRecord>, RefreshError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() != columns.len() {
                return Err(RefreshError::malformed(format!(
                    "table row {} has {} cells for {} columns",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            convert_row(
                columns.iter().map(String::as_str).zip(row.iter()),
                index,
                kind,
            )
        })
        .collect()
}

fn convert_row<'a>(
    fields: impl Iterator<Item = (&'a str, &'a Value)>,
    index: usize,
    kind: DataKind,
) -> Result<NormalizedRecord, RefreshError> {
    let mut record = NormalizedRecord::new();
    for (name, value) in fields {
        let coerced = coerce::coerce(value, declared_type(kind, name)).map_err(|failure| {
            RefreshError::coercion(format!("row {} field '{}': {}", index, name, failure))
        })?;
        record.insert(name, coerced);
    }
    Ok(record)
}
