use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::types::Trader;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable that overrides `notifications.webhook_url`.
pub const WEBHOOK_URL_VAR: &str = "DISCORD_WEBHOOK_URL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub traders: Vec<TraderConfig>,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// One monitored wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub wallet: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Event tag whose markets form the allow-list. Empty disables filtering.
    #[serde(default)]
    pub tag: String,
    /// Sleep between full poll cycles, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Sleep between consecutive traders within a cycle, in milliseconds.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
    /// Where the per-trader position snapshots are persisted.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Used by leaderboard discovery when populating `traders`; ignored here.
    #[serde(default = "default_top_traders")]
    pub top_traders_count: u32,
    /// Maximum change entries per alert message.
    #[serde(default = "default_max_alert_entries")]
    pub max_alert_entries: usize,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_request_delay() -> u64 {
    1000
}

fn default_state_path() -> String {
    "state.json".to_string()
}

fn default_top_traders() -> u32 {
    20
}

fn default_max_alert_entries() -> usize {
    25
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            tag: String::new(),
            poll_interval_secs: default_poll_interval(),
            request_delay_ms: default_request_delay(),
            state_path: default_state_path(),
            top_traders_count: default_top_traders(),
            max_alert_entries: default_max_alert_entries(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Trimmed tag, or `None` when no allow-list should be built.
    pub fn allow_list_tag(&self) -> Option<&str> {
        let tag = self.tag.trim();
        (!tag.is_empty()).then_some(tag)
    }
}

/// Outbound alert channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Discord-compatible webhook URL. Alerts go to stdout when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject configurations the monitor cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.traders.is_empty() {
            bail!("no traders configured; add at least one [[traders]] entry");
        }
        for (i, trader) in self.traders.iter().enumerate() {
            if trader.wallet.trim().is_empty() {
                bail!("trader #{} has an empty wallet", i + 1);
            }
        }
        if self.settings.max_alert_entries == 0 {
            bail!("settings.max_alert_entries must be at least 1");
        }
        Ok(())
    }

    /// Apply the webhook override from the environment, if set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_URL_VAR)
            && !url.trim().is_empty()
        {
            self.notifications.webhook_url = Some(url.trim().to_string());
        }
    }

    /// Resolved trader list with normalized wallets and display names.
    pub fn traders(&self) -> Vec<Trader> {
        self.traders
            .iter()
            .map(|t| {
                let wallet = t.wallet.trim().to_lowercase();
                let name = t
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| short_wallet(&wallet));
                Trader { name, wallet }
            })
            .collect()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.notifications
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// `0x1234…abcd` form of a wallet address.
pub fn short_wallet(wallet: &str) -> String {
    if wallet.len() <= 10 || !wallet.is_ascii() {
        return wallet.to_string();
    }
    format!("{}…{}", &wallet[..6], &wallet[wallet.len() - 4..])
}
