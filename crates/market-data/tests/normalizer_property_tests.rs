//! Property-based tests for response normalization and session classification.

use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use decidra_market_data::{
    classify, demultiplex, normalize, DataKind, ErrorKind, FieldValue, InstrumentId, Market,
    NormalizedRecord, RawResult, RefreshResult, SessionState, TradingCalendar,
};

// =============================================================================
// Generators
// =============================================================================

fn arb_kind() -> impl Strategy<Value = DataKind> {
    prop_oneof![
        Just(DataKind::Quote),
        Just(DataKind::Depth),
        Just(DataKind::Ticks),
        Just(DataKind::BrokerQueue),
    ]
}

fn arb_market() -> impl Strategy<Value = Market> {
    prop_oneof![
        Just(Market::Hk),
        Just(Market::Us),
        Just(Market::Sh),
        Just(Market::Sz),
    ]
}

/// A price with at most 13 significant digits, so it survives a JSON float.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000, 0u32..=4).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

/// An undeclared scalar field and the value it should normalize to.
fn arb_extra_field() -> impl Strategy<Value = (Value, FieldValue)> {
    prop_oneof![
        any::<i64>().prop_map(|i| (json!(i), FieldValue::Integer(i))),
        "[a-zA-Z0-9 .]{0,12}".prop_map(|s| (json!(s.clone()), FieldValue::Text(s))),
        any::<bool>().prop_map(|b| (json!(b), FieldValue::Bool(b))),
        Just((Value::Null, FieldValue::Null)),
        arb_out_of_range_number().prop_map(|v| {
            let text = v.to_string();
            (v, FieldValue::Text(text))
        }),
    ]
}

/// Magnitudes past what a `Decimal` holds.
fn arb_out_of_range_number() -> impl Strategy<Value = Value> {
    (any::<bool>(), 1u32..10, 29i32..300).prop_map(|(negative, mantissa, exponent)| {
        let sign = if negative { "-" } else { "" };
        serde_json::from_str(&format!("{}{}e{}", sign, mantissa, exponent)).unwrap()
    })
}

fn arb_quote_row() -> impl Strategy<Value = (Map<String, Value>, NormalizedRecord)> {
    (
        "[0-9]{5}",
        arb_price(),
        proptest::collection::btree_map("x_[a-z]{1,8}", arb_extra_field(), 0..5),
    )
        .prop_map(|(code, price, extras)| {
            let mut raw = Map::new();
            let mut expected = NormalizedRecord::new()
                .with("code", format!("HK.{}", code))
                .with("last_price", price);
            raw.insert("code".to_string(), json!(format!("HK.{}", code)));
            let price_value: Value =
                serde_json::from_str(&price.normalize().to_string()).unwrap_or(Value::Null);
            raw.insert("last_price".to_string(), price_value);
            for (name, (value, normalized)) in extras {
                raw.insert(name.clone(), value);
                expected.insert(name, normalized);
            }
            (raw, expected)
        })
}

fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    // 2020-01-01 .. 2030-01-01
    (1_577_836_800i64..1_893_456_000).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Feature: normalizer, Property 1: Well-formed rows normalize without loss**
    ///
    /// Every row becomes one record. Declared prices keep their exact decimal
    /// value and undeclared scalars keep their natural type, or their text when no
    /// decimal can hold them.
    #[test]
    fn prop_rows_normalize_without_loss(
        rows in proptest::collection::vec(arb_quote_row(), 1..8)
    ) {
        let (raw_rows, expected): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let raw = RawResult::Rows(raw_rows);

        let result = normalize(&raw, DataKind::Quote);

        prop_assert_eq!(result, RefreshResult::Ok(expected));
    }

    /// **Feature: normalizer, Property 2: No rows means Empty**
    #[test]
    fn prop_no_rows_is_empty(kind in arb_kind(), columns in proptest::collection::vec("[a-z]{1,6}", 0..4)) {
        prop_assert_eq!(normalize(&RawResult::from_json(json!([])), kind), RefreshResult::Empty);
        prop_assert_eq!(
            normalize(&RawResult::Table { columns, rows: vec![] }, kind),
            RefreshResult::Empty
        );
    }

    /// **Feature: normalizer, Property 3: Error values become UpstreamError**
    #[test]
    fn prop_error_values_fail_as_upstream(
        kind in arb_kind(),
        code in prop_oneof![i64::MIN..0, 1..i64::MAX],
        message in "[a-z ]{0,20}",
    ) {
        let raw = RawResult::from_json(json!({"ret_code": code, "ret_msg": message}));
        let result = normalize(&raw, kind);
        prop_assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::UpstreamError));
    }

    /// **Feature: normalizer, Property 4: Demultiplexing preserves every matched record**
    ///
    /// Each member receives exactly the records carrying its code; members
    /// with none are Empty.
    #[test]
    fn prop_demultiplex_routes_by_code(
        counts in proptest::collection::vec(0usize..4, 1..6)
    ) {
        let members: Vec<InstrumentId> = (0..counts.len())
            .map(|i| InstrumentId::new(Market::Us, format!("SYM{}", i)))
            .collect();
        let mut records = Vec::new();
        for (i, count) in counts.iter().enumerate() {
            for n in 0..*count {
                records.push(
                    NormalizedRecord::new()
                        .with("code", members[i].to_string())
                        .with("n", n as i64),
                );
            }
        }

        let split = demultiplex(RefreshResult::from_records(records), &members);

        prop_assert_eq!(split.len(), members.len());
        for ((id, result), (member, count)) in split.iter().zip(members.iter().zip(counts.iter())) {
            prop_assert_eq!(id, member);
            if *count == 0 {
                prop_assert!(result.is_empty());
            } else {
                prop_assert_eq!(result.records().len(), *count);
            }
        }
    }

    /// **Feature: session, Property 5: Weekends are always closed**
    #[test]
    fn prop_weekends_closed(market in arb_market(), instant in arb_instant()) {
        let calendar = TradingCalendar::with_default_hours();
        let tz = calendar.hours(market).unwrap().timezone;
        let local = instant.with_timezone(&tz);

        let state = classify(market, instant, &calendar);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            prop_assert_eq!(state, SessionState::Closed);
        }
    }

    /// **Feature: session, Property 6: Classification is deterministic**
    #[test]
    fn prop_classification_is_pure(market in arb_market(), instant in arb_instant()) {
        let calendar = TradingCalendar::with_default_hours();
        prop_assert_eq!(
            classify(market, instant, &calendar),
            classify(market, instant, &calendar)
        );
    }
}
