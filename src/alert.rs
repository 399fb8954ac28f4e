use serde::Serialize;

use crate::types::{Change, ChangeKind, Trader};

const POLYMARKET_BASE: &str = "https://polymarket.com";

const COLOR_BUY: u32 = 0x2E_CC_71;
const COLOR_SELL: u32 = 0xE7_4C_3C;
const COLOR_MIXED: u32 = 0xF1_C4_0F;

/// Discord caps field values at 1024 characters.
const MAX_FIELD_VALUE: usize = 1024;
const MAX_FIELD_NAME: usize = 256;

/// Webhook payload: one embed per trader-cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AlertMessage {
    pub username: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Overall direction of a trader-cycle's changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    NetBuy,
    NetSell,
    Mixed,
}

impl Tone {
    pub fn of(changes: &[Change]) -> Self {
        if changes.iter().all(Change::is_buy) {
            Tone::NetBuy
        } else if changes.iter().all(|c| !c.is_buy()) {
            Tone::NetSell
        } else {
            Tone::Mixed
        }
    }

    pub fn color(self) -> u32 {
        match self {
            Tone::NetBuy => COLOR_BUY,
            Tone::NetSell => COLOR_SELL,
            Tone::Mixed => COLOR_MIXED,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Tone::NetBuy => "buying",
            Tone::NetSell => "selling",
            Tone::Mixed => "rebalancing",
        }
    }
}

/// Direction label shown for a single change.
pub fn direction(change: &Change) -> &'static str {
    match change.kind {
        ChangeKind::Opened => "BUY",
        ChangeKind::Closed => "SELL",
        ChangeKind::Adjusted if change.size_delta > 0.0 => "BUY MORE",
        ChangeKind::Adjusted => "SELL",
    }
}

/// Link to the event page, falling back to the market page.
pub fn market_url(change: &Change) -> Option<String> {
    if !change.event_slug.is_empty() {
        Some(format!("{POLYMARKET_BASE}/event/{}", change.event_slug))
    } else if !change.market_slug.is_empty() {
        Some(format!("{POLYMARKET_BASE}/market/{}", change.market_slug))
    } else {
        None
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn fmt_shares(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn fmt_price(v: f64) -> String {
    format!("{:.1}¢", v * 100.0)
}

fn fmt_signed_usd(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("+${v:.2}")
    }
}

fn field_for(change: &Change) -> EmbedField {
    let title = if change.title.is_empty() {
        change.market_id.as_str()
    } else {
        change.title.as_str()
    };
    let name = if change.outcome.is_empty() {
        format!("{} · {title}", direction(change))
    } else {
        format!("{} {} · {title}", direction(change), change.outcome)
    };

    let mut lines = Vec::new();
    lines.push(match (change.kind, change.previous_size) {
        (ChangeKind::Opened, _) => format!("Shares: {}", fmt_shares(change.size)),
        (_, Some(prev)) => format!(
            "Shares: {} → {} ({}{})",
            fmt_shares(prev),
            fmt_shares(change.size),
            if change.size_delta > 0.0 { "+" } else { "" },
            fmt_shares(change.size_delta)
        ),
        (_, None) => format!("Shares: {}", fmt_shares(change.size)),
    });

    if change.current_price > 0.0 {
        let mut price = format!("Price: {}", fmt_price(change.current_price));
        if change.average_entry_price > 0.0 {
            price.push_str(&format!(" (avg {})", fmt_price(change.average_entry_price)));
        }
        lines.push(price);
    } else if change.average_entry_price > 0.0 {
        lines.push(format!("Avg entry: {}", fmt_price(change.average_entry_price)));
    }

    if change.current_price > 0.0 && change.size > 0.0 {
        lines.push(format!("Value: ~${:.2}", change.current_price * change.size));
    }
    if let Some(pnl) = change.cash_pnl {
        lines.push(format!("PnL: {}", fmt_signed_usd(pnl)));
    }
    if let Some(url) = market_url(change) {
        lines.push(format!("[View market]({url})"));
    }

    EmbedField {
        name: truncate(&name, MAX_FIELD_NAME),
        value: truncate(&lines.join("\n"), MAX_FIELD_VALUE),
        inline: false,
    }
}

/// Build the alert for one trader's changes in one cycle.
///
/// At most `max_entries` changes are rendered; the footer records how many
/// were left out.
pub fn format_alert(trader: &Trader, changes: &[Change], max_entries: usize) -> AlertMessage {
    let tone = Tone::of(changes);
    let fields: Vec<EmbedField> = changes.iter().take(max_entries).map(field_for).collect();
    let omitted = changes.len().saturating_sub(fields.len());

    let footer = (omitted > 0).then(|| EmbedFooter {
        text: format!("+{omitted} more change(s) not shown"),
    });

    let embed = Embed {
        title: format!("{} is {}", trader.name, tone.label()),
        description: format!(
            "{} position change(s) for `{}`",
            changes.len(),
            trader.wallet
        ),
        url: format!("{POLYMARKET_BASE}/profile/{}", trader.wallet),
        color: tone.color(),
        fields,
        footer,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    AlertMessage {
        username: "Position Monitor".to_string(),
        embeds: vec![embed],
    }
}
