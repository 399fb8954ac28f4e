use std::collections::HashMap;

use crate::types::{Change, ChangeKind, Position, PositionKey};

/// Minimum absolute share movement for an adjustment to be reported.
const MIN_ADJUST_SHARES: f64 = 1.0;

/// Minimum movement relative to the previous size (floored at one share).
const MIN_ADJUST_RATIO: f64 = 0.01;

/// Index a snapshot by position key. Later entries replace earlier ones.
fn index(positions: &[Position]) -> HashMap<PositionKey, &Position> {
    positions.iter().map(|p| (p.key(), p)).collect()
}

/// Whether a size move from `previous` to `current` clears both noise thresholds.
pub fn is_significant(previous: f64, current: f64) -> bool {
    let delta = (current - previous).abs();
    delta > MIN_ADJUST_SHARES && delta / previous.max(1.0) > MIN_ADJUST_RATIO
}

fn change_from(kind: ChangeKind, pos: &Position, size: f64, previous_size: Option<f64>) -> Change {
    Change {
        kind,
        market_id: pos.market_id.clone(),
        outcome_key: pos.outcome_key.clone(),
        outcome: pos.outcome.clone(),
        title: pos.title.clone(),
        market_slug: pos.market_slug.clone(),
        event_slug: pos.event_slug.clone(),
        size,
        previous_size,
        size_delta: size - previous_size.unwrap_or(0.0),
        cash_pnl: pos.cash_pnl,
        current_price: pos.current_price,
        average_entry_price: pos.average_entry_price,
    }
}

/// Compute the classified changes between two snapshots of one trader.
///
/// Results are grouped opened, then closed, then adjusted. Within a group the
/// order follows the snapshot the entries come from (`current` for opened and
/// adjusted, `previous` for closed). Adjustments below the noise thresholds
/// are dropped.
pub fn reconcile(previous: &[Position], current: &[Position]) -> Vec<Change> {
    let prev_map = index(previous);
    let cur_map = index(current);

    let mut opened = Vec::new();
    let mut closed = Vec::new();
    let mut adjusted = Vec::new();

    for (i, cur) in current.iter().enumerate() {
        let key = cur.key();
        // Skip all but the last occurrence of a repeated key.
        if !std::ptr::eq(cur_map[&key], &current[i]) {
            continue;
        }
        match prev_map.get(&key) {
            None => opened.push(change_from(ChangeKind::Opened, cur, cur.size, None)),
            Some(prev) => {
                if is_significant(prev.size, cur.size) {
                    adjusted.push(change_from(
                        ChangeKind::Adjusted,
                        cur,
                        cur.size,
                        Some(prev.size),
                    ));
                }
            }
        }
    }

    for (i, prev) in previous.iter().enumerate() {
        let key = prev.key();
        if !std::ptr::eq(prev_map[&key], &previous[i]) {
            continue;
        }
        if !cur_map.contains_key(&key) {
            closed.push(change_from(ChangeKind::Closed, prev, 0.0, Some(prev.size)));
        }
    }

    opened.extend(closed);
    opened.extend(adjusted);
    opened
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn pos(market: &str, outcome: &str, size: f64) -> Position {
        Position {
            market_id: market.to_string(),
            outcome_key: outcome.to_string(),
            outcome: "Yes".to_string(),
            size,
            cash_pnl: Some(1.5),
            current_price: 0.55,
            average_entry_price: 0.50,
            title: format!("Market {market}"),
            market_slug: format!("{market}-slug"),
            event_slug: format!("{market}-event"),
        }
    }

    fn kinds(changes: &[Change]) -> Vec<ChangeKind> {
        changes.iter().map(|c| c.kind).collect()
    }

    // ── thresholds ─────────────────────────────────────────────────

    #[test]
    fn significance_thresholds() {
        assert!(!is_significant(100.0, 100.5)); // below both
        assert!(!is_significant(100.0, 101.0)); // delta exactly 1
        assert!(!is_significant(1000.0, 1005.0)); // delta 5 but 0.5%
        assert!(is_significant(50.0, 48.0)); // delta 2, 4%
        assert!(is_significant(0.2, 1.5)); // relative floor at 1 share
        assert!(!is_significant(0.2, 1.1)); // delta 0.9
    }

    // ── reconcile ──────────────────────────────────────────────────

    #[test]
    fn identical_snapshots_yield_nothing() {
        let p = vec![pos("a", "0", 10.0), pos("b", "1", 250.0), pos("c", "0", 0.3)];
        assert!(reconcile(&p, &p).is_empty());
    }

    #[test]
    fn empty_snapshots() {
        assert!(reconcile(&[], &[]).is_empty());
    }

    #[test]
    fn new_trader_single_open() {
        let changes = reconcile(&[], &[pos("a", "0", 42.0)]);
        assert_eq!(changes.len(), 1);
        let c = &changes[0];
        assert_eq!(c.kind, ChangeKind::Opened);
        assert!(approx_eq(c.size, 42.0));
        assert!(approx_eq(c.size_delta, 42.0));
        assert_eq!(c.previous_size, None);
        assert_eq!(c.title, "Market a");
    }

    #[test]
    fn closed_position() {
        let changes = reconcile(&[pos("a", "0", 30.0)], &[]);
        assert_eq!(changes.len(), 1);
        let c = &changes[0];
        assert_eq!(c.kind, ChangeKind::Closed);
        assert!(approx_eq(c.size, 0.0));
        assert_eq!(c.previous_size, Some(30.0));
        assert!(approx_eq(c.size_delta, -30.0));
        assert_eq!(c.event_slug, "a-event");
    }

    #[test]
    fn disjoint_sets() {
        let p1 = vec![pos("a", "0", 1.0), pos("b", "0", 2.0)];
        let p2 = vec![pos("c", "0", 3.0), pos("d", "0", 4.0), pos("e", "0", 5.0)];
        let changes = reconcile(&p1, &p2);
        let opened = changes.iter().filter(|c| c.kind == ChangeKind::Opened).count();
        let closed = changes.iter().filter(|c| c.kind == ChangeKind::Closed).count();
        let adjusted = changes.iter().filter(|c| c.kind == ChangeKind::Adjusted).count();
        assert_eq!((opened, closed, adjusted), (3, 2, 0));
    }

    #[test]
    fn small_move_suppressed() {
        let changes = reconcile(&[pos("a", "0", 100.0)], &[pos("a", "0", 100.5)]);
        assert!(changes.is_empty());
    }

    #[test]
    fn tiny_position_one_share_move_suppressed() {
        // 100% relative change but only 1 share absolute
        let changes = reconcile(&[pos("a", "0", 1.0)], &[pos("a", "0", 2.0)]);
        assert!(changes.is_empty());
    }

    #[test]
    fn reduction_reported_with_sign() {
        let changes = reconcile(&[pos("a", "0", 50.0)], &[pos("a", "0", 48.0)]);
        assert_eq!(changes.len(), 1);
        let c = &changes[0];
        assert_eq!(c.kind, ChangeKind::Adjusted);
        assert!(approx_eq(c.size_delta, -2.0));
        assert_eq!(c.previous_size, Some(50.0));
        assert!(approx_eq(c.size, 48.0));
        assert!(!c.is_buy());
    }

    #[test]
    fn increase_is_buy() {
        let changes = reconcile(&[pos("a", "0", 10.0)], &[pos("a", "0", 25.0)]);
        assert_eq!(changes.len(), 1);
        assert!(approx_eq(changes[0].size_delta, 15.0));
        assert!(changes[0].is_buy());
    }

    #[test]
    fn outcome_switch_is_close_and_open() {
        let changes = reconcile(&[pos("a", "0", 10.0)], &[pos("a", "1", 10.0)]);
        assert_eq!(kinds(&changes), vec![ChangeKind::Opened, ChangeKind::Closed]);
    }

    #[test]
    fn grouping_order() {
        let prev = vec![pos("x", "0", 10.0), pos("adj", "0", 100.0), pos("y", "0", 5.0)];
        let cur = vec![pos("adj", "0", 150.0), pos("new1", "0", 1.0), pos("new2", "0", 2.0)];
        let changes = reconcile(&prev, &cur);
        assert_eq!(
            kinds(&changes),
            vec![
                ChangeKind::Opened,
                ChangeKind::Opened,
                ChangeKind::Closed,
                ChangeKind::Closed,
                ChangeKind::Adjusted,
            ]
        );
        assert_eq!(changes[0].market_id, "new1");
        assert_eq!(changes[1].market_id, "new2");
        assert_eq!(changes[2].market_id, "x");
        assert_eq!(changes[3].market_id, "y");
    }

    #[test]
    fn adjusted_carries_current_fields() {
        let prev = vec![pos("a", "0", 10.0)];
        let mut cur_pos = pos("a", "0", 20.0);
        cur_pos.current_price = 0.75;
        cur_pos.cash_pnl = None;
        let changes = reconcile(&prev, &[cur_pos]);
        assert_eq!(changes.len(), 1);
        assert!(approx_eq(changes[0].current_price, 0.75));
        assert_eq!(changes[0].cash_pnl, None);
    }

    #[test]
    fn delta_invariant_holds() {
        let prev = vec![pos("a", "0", 10.0), pos("b", "0", 7.0)];
        let cur = vec![pos("a", "0", 30.0), pos("c", "0", 4.0)];
        for c in reconcile(&prev, &cur) {
            let expected = c.size - c.previous_size.unwrap_or(0.0);
            assert!(approx_eq(c.size_delta, expected));
        }
    }

    #[test]
    fn deterministic() {
        let prev = vec![pos("a", "0", 10.0), pos("b", "0", 7.0), pos("d", "1", 90.0)];
        let cur = vec![pos("a", "0", 30.0), pos("c", "0", 4.0), pos("d", "1", 80.0)];
        assert_eq!(reconcile(&prev, &cur), reconcile(&prev, &cur));
    }

    #[test]
    fn repeated_key_in_input_uses_last() {
        let cur = vec![pos("a", "0", 5.0), pos("a", "0", 9.0)];
        let changes = reconcile(&[], &cur);
        assert_eq!(changes.len(), 1);
        assert!(approx_eq(changes[0].size, 9.0));
    }
}
