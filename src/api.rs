use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{Event, MarketSummary};
use crate::{DATA_API_BASE, GAMMA_API_BASE};

/// Page size for the data API positions endpoint.
const POSITIONS_PAGE_SIZE: usize = 500;

/// The data API rejects offsets past this, so stop paginating here.
pub const MAX_POSITIONS: usize = 10_000;

/// Page size for the Gamma events endpoint.
const EVENTS_PAGE_SIZE: usize = 100;

/// Safety cap on the number of events pulled from Gamma.
pub const MAX_EVENTS: usize = 5000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can return a trader's raw position records.
pub trait PositionSource {
    fn positions_of(&self, wallet: &str) -> impl Future<Output = Result<Vec<Value>>>;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// Fetch a URL and require a JSON array body.
async fn get_array(http: &reqwest::Client, url: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
    let resp = http
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error status"))?;
    let body: Value = resp
        .json()
        .await
        .with_context(|| format!("{url} returned invalid JSON"))?;
    match body {
        Value::Array(items) => Ok(items),
        other => {
            let preview: String = other.to_string().chars().take(200).collect();
            bail!("{url} returned a non-array response: {preview}")
        }
    }
}

/// Polymarket data API client (public, no auth required).
#[derive(Clone)]
pub struct DataClient {
    http: reqwest::Client,
    base: String,
}

impl DataClient {
    pub fn new() -> Result<Self> {
        Self::with_base(DATA_API_BASE)
    }

    pub fn with_base(base: &str) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every open position record for `wallet`, following pagination.
    pub async fn fetch_positions(&self, wallet: &str) -> Result<Vec<Value>> {
        let url = format!("{}/positions", self.base);
        let mut all = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = get_array(
                &self.http,
                &url,
                &[
                    ("user", wallet.to_string()),
                    ("sizeThreshold", "0".to_string()),
                    ("limit", POSITIONS_PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;
            let count = page.len();
            all.extend(page);

            if count < POSITIONS_PAGE_SIZE {
                break;
            }
            offset += POSITIONS_PAGE_SIZE;
            if offset >= MAX_POSITIONS {
                warn!("Position cap ({MAX_POSITIONS}) reached for {wallet}, ignoring the rest");
                break;
            }
        }
        all.truncate(MAX_POSITIONS);

        debug!("Fetched {} raw positions for {wallet}", all.len());
        Ok(all)
    }
}

impl PositionSource for DataClient {
    async fn positions_of(&self, wallet: &str) -> Result<Vec<Value>> {
        self.fetch_positions(wallet).await
    }
}

/// Polymarket Gamma API client for event and market metadata.
#[derive(Clone)]
pub struct GammaClient {
    http: reqwest::Client,
    base: String,
}

impl GammaClient {
    pub fn new() -> Result<Self> {
        Self::with_base(GAMMA_API_BASE)
    }

    pub fn with_base(base: &str) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// List active, unclosed events, capped at [`MAX_EVENTS`].
    ///
    /// Records that fail to deserialize are skipped with a warning.
    pub async fn list_open_events(&self) -> Result<Vec<Event>> {
        let url = format!("{}/events", self.base);
        let mut events = Vec::new();
        let mut offset = 0usize;

        while offset < MAX_EVENTS {
            let page = get_array(
                &self.http,
                &url,
                &[
                    ("closed", "false".to_string()),
                    ("active", "true".to_string()),
                    ("limit", EVENTS_PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;
            let count = page.len();

            for raw in page {
                match serde_json::from_value::<Event>(raw) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!("Skipping malformed event record: {e}"),
                }
            }

            if count < EVENTS_PAGE_SIZE {
                break;
            }
            offset += EVENTS_PAGE_SIZE;
        }

        events.truncate(MAX_EVENTS);
        debug!("Fetched {} open events", events.len());
        Ok(events)
    }
}

/// Events carrying a tag whose trimmed label equals `label` exactly.
pub fn events_with_tag(events: &[Event], label: &str) -> Vec<Event> {
    let label = label.trim();
    events
        .iter()
        .filter(|e| e.tags.iter().any(|t| t.label.trim() == label))
        .cloned()
        .collect()
}

fn parse_volume(v: &Value) -> f64 {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .unwrap_or(0.0)
}

/// Flatten events into their markets. Markets without a condition id are dropped.
pub fn markets_of(events: &[Event]) -> Vec<MarketSummary> {
    events
        .iter()
        .flat_map(|e| e.markets.iter())
        .filter(|m| !m.condition_id.is_empty())
        .map(|m| MarketSummary {
            market_id: m.condition_id.clone(),
            question: m.question.clone(),
            volume: parse_volume(&m.volume),
        })
        .collect()
}

/// Market identifiers to restrict monitoring to.
pub fn allow_list(markets: &[MarketSummary]) -> HashSet<String> {
    markets.iter().map(|m| m.market_id.clone()).collect()
}

/// Build the allow-list for `tag` from the currently open events.
pub async fn fetch_allow_list(gamma: &GammaClient, tag: &str) -> Result<HashSet<String>> {
    let events = gamma.list_open_events().await?;
    let tagged = events_with_tag(&events, tag);
    let markets = markets_of(&tagged);
    debug!(
        "Tag \"{tag}\": {} of {} events, {} markets",
        tagged.len(),
        events.len(),
        markets.len()
    );
    Ok(allow_list(&markets))
}
