//! Declared field types per data kind.
//!
//! Fields listed here are coerced to their declared type and fail the whole
//! response when they cannot be. Fields the upstream sends that are not
//! listed are passed through with their natural JSON type.

use crate::models::DataKind;

/// Target type of a declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Decimal,
    Integer,
    Timestamp,
    Bool,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Decimal => "decimal",
            FieldType::Integer => "integer",
            FieldType::Timestamp => "timestamp",
            FieldType::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty }
}

use FieldType::{Bool, Decimal, Integer, Text, Timestamp};

const QUOTE_FIELDS: &[FieldSpec] = &[
    field("code", Text),
    field("name", Text),
    field("update_time", Timestamp),
    field("last_price", Decimal),
    field("open_price", Decimal),
    field("high_price", Decimal),
    field("low_price", Decimal),
    field("prev_close_price", Decimal),
    field("volume", Integer),
    field("turnover", Decimal),
    field("turnover_rate", Decimal),
    field("amplitude", Decimal),
    field("change_rate", Decimal),
    field("suspension", Bool),
    field("pre_price", Decimal),
    field("after_price", Decimal),
];

const DEPTH_FIELDS: &[FieldSpec] = &[
    field("code", Text),
    field("side", Text),
    field("level", Integer),
    field("price", Decimal),
    field("volume", Integer),
    field("order_count", Integer),
    field("svr_recv_time", Timestamp),
];

const TICK_FIELDS: &[FieldSpec] = &[
    field("code", Text),
    field("sequence", Integer),
    field("time", Timestamp),
    field("price", Decimal),
    field("volume", Integer),
    field("turnover", Decimal),
    field("ticker_direction", Text),
    field("type", Text),
];

const BROKER_QUEUE_FIELDS: &[FieldSpec] = &[
    field("code", Text),
    field("side", Text),
    field("broker_id", Integer),
    field("broker_name", Text),
    field("broker_pos", Integer),
];

pub fn schema_for(kind: DataKind) -> &'static [FieldSpec] {
    match kind {
        DataKind::Quote => QUOTE_FIELDS,
        DataKind::Depth => DEPTH_FIELDS,
        DataKind::Ticks => TICK_FIELDS,
        DataKind::BrokerQueue => BROKER_QUEUE_FIELDS,
    }
}

pub fn declared_type(kind: DataKind, name: &str) -> Option<FieldType> {
    schema_for(kind)
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.ty)
}
