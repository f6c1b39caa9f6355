use serde_json::Value;

use super::types::RawRow;

/// An upstream payload before normalization.
///
/// Clients hand back whichever shape the upstream produced. Shapes the
/// normalizer has no rule for land in [`RawResult::Unrecognized`].
#[derive(Clone, Debug, PartialEq)]
pub enum RawResult {
    /// No rows at all (empty list, empty table, null)
    Empty,
    /// A single row
    Row(RawRow),
    /// A list of rows
    Rows(Vec<RawRow>),
    /// Column names plus positional rows
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Error returned as a value instead of raised
    Error { code: i64, message: String },
    Unrecognized(Value),
}

impl RawResult {
    /// Classifies a JSON payload into a raw shape.
    ///
    /// Recognized envelopes:
    /// - `null`, `[]`, `{}` are empty
    /// - an array of objects is a row list
    /// - `{"columns": [...], "rows": [[...], ...]}` (or `"data"`) is a table
    /// - `{"ret_code": n, "ret_msg": "..."}` is an error when `n != 0`; when
    ///   `n == 0` its `data` member is classified instead
    /// - any other object is a single row
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => RawResult::Empty,
            Value::Array(items) => Self::from_array(items),
            Value::Object(map) => Self::from_object(map),
            other => RawResult::Unrecognized(other),
        }
    }

    fn from_array(items: Vec<Value>) -> Self {
        if items.is_empty() {
            return RawResult::Empty;
        }
        if !items.iter().all(Value::is_object) {
            return RawResult::Unrecognized(Value::Array(items));
        }
        RawResult::Rows(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
        )
    }

    fn from_object(mut map: RawRow) -> Self {
        if map.is_empty() {
            return RawResult::Empty;
        }

        if let Some(code) = map.get("ret_code").and_then(Value::as_i64) {
            if code != 0 {
                let message = map
                    .get("ret_msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return RawResult::Error { code, message };
            }
            if let Some(data) = map.remove("data") {
                return Self::from_json(data);
            }
            return RawResult::Empty;
        }

        let is_table = map.get("columns").is_some_and(Value::is_array)
            && (map.contains_key("rows") || map.contains_key("data"));
        if is_table {
            let columns = map.get("columns").and_then(Value::as_array).map(|cols| {
                cols.iter()
                    .map(|c| c.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            });
            let rows = map
                .get("rows")
                .or_else(|| map.get("data"))
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|r| r.as_array().cloned())
                        .collect::<Option<Vec<_>>>()
                });
            return match (columns, rows) {
                (Some(Some(columns)), Some(Some(rows))) => RawResult::Table { columns, rows },
                _ => RawResult::Unrecognized(Value::Object(map)),
            };
        }

        RawResult::Row(map)
    }

    /// Short descriptor of the payload shape, safe to log.
    ///
    /// Never includes field values.
    pub fn shape(&self) -> String {
        match self {
            RawResult::Empty => "empty".to_string(),
            RawResult::Row(row) => format!("row(fields={})", row.len()),
            RawResult::Rows(rows) => format!("rows(count={})", rows.len()),
            RawResult::Table { columns, rows } => {
                format!("table(columns={}, rows={})", columns.len(), rows.len())
            }
            RawResult::Error { code, .. } => format!("error(code={})", code),
            RawResult::Unrecognized(value) => format!("unrecognized({})", json_type(value)),
        }
    }
}

impl From<Value> for RawResult {
    fn from(value: Value) -> Self {
        RawResult::from_json(value)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
