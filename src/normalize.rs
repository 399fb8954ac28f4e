use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::types::{Position, PositionKey, PositionSet};

/// Read a numeric field that may arrive as a number, a numeric string, or null.
fn parse_f64(val: &Value, field: &str) -> Option<f64> {
    val.get(field).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
            .filter(|n| n.is_finite())
    })
}

fn parse_string(val: &Value, field: &str) -> String {
    match val.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Outcome part of the position key: index if present, else label, else `"0"`.
fn outcome_key(val: &Value) -> String {
    match val.get("outcomeIndex") {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return i.to_string();
            }
            // 1.0 and 1 must key the same position
            return match n.as_f64().filter(|f| f.fract() == 0.0) {
                Some(f) => format!("{f:.0}"),
                None => n.to_string(),
            };
        }
        Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
        _ => {}
    }
    match val.get("outcome") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "0".to_string(),
    }
}

/// Coerce one raw data-API position record into a [`Position`].
///
/// Never fails: missing numbers become 0, missing strings become empty.
/// `cashPnl` stays `None` when absent so "no data" is distinguishable from zero.
pub fn normalize_position(raw: &Value) -> Position {
    Position {
        market_id: parse_string(raw, "conditionId"),
        outcome_key: outcome_key(raw),
        outcome: parse_string(raw, "outcome"),
        size: parse_f64(raw, "size").unwrap_or(0.0).max(0.0),
        cash_pnl: parse_f64(raw, "cashPnl"),
        current_price: parse_f64(raw, "curPrice").unwrap_or(0.0).max(0.0),
        average_entry_price: parse_f64(raw, "avgPrice").unwrap_or(0.0).max(0.0),
        title: parse_string(raw, "title"),
        market_slug: parse_string(raw, "slug"),
        event_slug: parse_string(raw, "eventSlug"),
    }
}

/// Normalize a whole raw snapshot, collapsing duplicate keys.
///
/// A repeated key replaces the earlier record in place (last write wins) and
/// logs a warning, since the feed is not expected to repeat a position.
pub fn normalize_snapshot(raw: &[Value]) -> PositionSet {
    let mut index: HashMap<PositionKey, usize> = HashMap::new();
    let mut out: PositionSet = Vec::with_capacity(raw.len());

    for record in raw {
        let pos = normalize_position(record);
        let key = pos.key();
        match index.get(&key) {
            Some(&i) => {
                warn!(
                    "Duplicate position key in snapshot: market={} outcome={}, keeping last",
                    key.market_id, key.outcome_key
                );
                out[i] = pos;
            }
            None => {
                index.insert(key, out.len());
                out.push(pos);
            }
        }
    }
    out
}

/// Keep only positions whose market is in the allow-list.
pub fn retain_allowed(
    positions: &mut PositionSet,
    allow_list: &std::collections::HashSet<String>,
) {
    positions.retain(|p| allow_list.contains(&p.market_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_record() {
        let raw = json!({
            "conditionId": "0xabc",
            "outcomeIndex": 1,
            "outcome": "No",
            "size": "120.5",
            "cashPnl": -3.25,
            "curPrice": 0.42,
            "avgPrice": "0.40",
            "title": "Will it rain?",
            "slug": "will-it-rain",
            "eventSlug": "rain-event"
        });
        let p = normalize_position(&raw);
        assert_eq!(p.market_id, "0xabc");
        assert_eq!(p.outcome_key, "1");
        assert_eq!(p.outcome, "No");
        assert_eq!(p.size, 120.5);
        assert_eq!(p.cash_pnl, Some(-3.25));
        assert_eq!(p.current_price, 0.42);
        assert_eq!(p.average_entry_price, 0.40);
        assert_eq!(p.market_slug, "will-it-rain");
        assert_eq!(p.event_slug, "rain-event");
    }

    #[test]
    fn missing_fields_default() {
        let p = normalize_position(&json!({}));
        assert_eq!(p.market_id, "");
        assert_eq!(p.outcome_key, "0");
        assert_eq!(p.size, 0.0);
        assert_eq!(p.cash_pnl, None);
        assert_eq!(p.current_price, 0.0);
        assert_eq!(p.average_entry_price, 0.0);
        assert!(p.title.is_empty());
    }

    #[test]
    fn null_and_garbage_numbers() {
        let raw = json!({
            "conditionId": "m",
            "size": null,
            "cashPnl": null,
            "curPrice": "abc",
            "avgPrice": true
        });
        let p = normalize_position(&raw);
        assert_eq!(p.size, 0.0);
        assert_eq!(p.cash_pnl, None);
        assert_eq!(p.current_price, 0.0);
        assert_eq!(p.average_entry_price, 0.0);
    }

    #[test]
    fn zero_pnl_is_kept() {
        let p = normalize_position(&json!({ "cashPnl": 0 }));
        assert_eq!(p.cash_pnl, Some(0.0));
    }

    #[test]
    fn outcome_label_used_without_index() {
        let p = normalize_position(&json!({ "conditionId": "m", "outcome": "Yes" }));
        assert_eq!(p.outcome_key, "Yes");
    }

    #[test]
    fn index_zero_wins_over_label() {
        let p = normalize_position(&json!({ "outcomeIndex": 0, "outcome": "Yes" }));
        assert_eq!(p.outcome_key, "0");
    }

    #[test]
    fn whole_float_index_matches_integer() {
        let int = normalize_position(&json!({ "conditionId": "m", "outcomeIndex": 1 }));
        let float = normalize_position(&json!({ "conditionId": "m", "outcomeIndex": 1.0 }));
        assert_eq!(int.outcome_key, "1");
        assert_eq!(float.outcome_key, "1");
        assert_eq!(int.key(), float.key());
    }

    #[test]
    fn negative_size_clamped() {
        let p = normalize_position(&json!({ "size": -5 }));
        assert_eq!(p.size, 0.0);
    }

    #[test]
    fn duplicate_key_last_write_wins() {
        let raw = vec![
            json!({ "conditionId": "m1", "outcomeIndex": 0, "size": 10 }),
            json!({ "conditionId": "m2", "outcomeIndex": 0, "size": 5 }),
            json!({ "conditionId": "m1", "outcomeIndex": 0, "size": 30 }),
        ];
        let set = normalize_snapshot(&raw);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].market_id, "m1");
        assert_eq!(set[0].size, 30.0);
        assert_eq!(set[1].market_id, "m2");
    }

    #[test]
    fn different_outcomes_are_distinct() {
        let raw = vec![
            json!({ "conditionId": "m1", "outcomeIndex": 0, "size": 10 }),
            json!({ "conditionId": "m1", "outcomeIndex": 1, "size": 20 }),
        ];
        assert_eq!(normalize_snapshot(&raw).len(), 2);
    }

    #[test]
    fn allow_list_filter() {
        let mut set = normalize_snapshot(&[
            json!({ "conditionId": "keep", "size": 1 }),
            json!({ "conditionId": "drop", "size": 1 }),
        ]);
        let allow: std::collections::HashSet<String> = ["keep".to_string()].into();
        retain_allowed(&mut set, &allow);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].market_id, "keep");
    }
}
