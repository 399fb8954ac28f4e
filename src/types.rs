use serde::{Deserialize, Deserializer, Serialize};

/// A trader's holding in one outcome of one market, after normalization.
///
/// Field names serialize in camelCase; this is also the layout of the
/// persisted state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub market_id: String,
    /// Outcome index if the source provided one, else the outcome label, else `"0"`.
    pub outcome_key: String,
    /// Human-readable outcome label ("Yes", "No", team name...).
    #[serde(default)]
    pub outcome: String,
    pub size: f64,
    /// `None` when the source carried no PnL, distinct from a PnL of zero.
    #[serde(default)]
    pub cash_pnl: Option<f64>,
    pub current_price: f64,
    pub average_entry_price: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub market_slug: String,
    #[serde(default)]
    pub event_slug: String,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            market_id: self.market_id.clone(),
            outcome_key: self.outcome_key.clone(),
        }
    }
}

/// Identity of a position within one trader's snapshot; the diff join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub market_id: String,
    pub outcome_key: String,
}

/// One trader's positions at one poll instant.
pub type PositionSet = Vec<Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Opened,
    Closed,
    Adjusted,
}

/// A classified difference between two snapshots of the same position.
///
/// `size_delta == size - previous_size.unwrap_or(0.0)` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ChangeKind,
    pub market_id: String,
    pub outcome_key: String,
    pub outcome: String,
    pub title: String,
    pub market_slug: String,
    pub event_slug: String,
    /// Current size; zero for closed positions.
    pub size: f64,
    /// Absent for opened positions.
    pub previous_size: Option<f64>,
    pub size_delta: f64,
    pub cash_pnl: Option<f64>,
    pub current_price: f64,
    pub average_entry_price: f64,
}

impl Change {
    /// True for opened positions and increases of an existing one.
    pub fn is_buy(&self) -> bool {
        match self.kind {
            ChangeKind::Opened => true,
            ChangeKind::Closed => false,
            ChangeKind::Adjusted => self.size_delta > 0.0,
        }
    }
}

/// A monitored trader, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trader {
    pub name: String,
    /// Lower-cased proxy wallet address; also the state store key.
    pub wallet: String,
}

/// Gamma sends explicit `null` for fields it has no value for; treat it as missing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A Gamma API event with the fields the allow-list needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub markets: Vec<EventMarket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarket {
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    /// Gamma returns volume as either a number or a numeric string.
    #[serde(default)]
    pub volume: serde_json::Value,
}

/// Flattened market row derived from a list of events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub market_id: String,
    pub question: String,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_tolerates_null_fields() {
        let event: Event = serde_json::from_value(json!({
            "id": "7",
            "title": null,
            "tags": [{ "label": "Politics" }, { "label": null }],
            "markets": [
                { "conditionId": "0xa", "question": "ok" },
                { "conditionId": "0xb", "question": null, "volume": null }
            ]
        }))
        .unwrap();
        assert_eq!(event.title, "");
        assert_eq!(event.tags.len(), 2);
        assert_eq!(event.tags[0].label, "Politics");
        assert_eq!(event.tags[1].label, "");
        assert_eq!(event.markets.len(), 2);
        assert_eq!(event.markets[0].condition_id, "0xa");
        assert_eq!(event.markets[1].question, "");
    }

    #[test]
    fn event_null_collections_are_empty() {
        let event: Event =
            serde_json::from_value(json!({ "id": "8", "tags": null, "markets": null })).unwrap();
        assert!(event.tags.is_empty());
        assert!(event.markets.is_empty());
    }
}
