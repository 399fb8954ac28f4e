use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use polymarket_position_monitor::api::{DataClient, GammaClient, fetch_allow_list};
use polymarket_position_monitor::config::{AppConfig, CONFIG_PATH};
use polymarket_position_monitor::monitor::{Monitor, MonitorSettings, Phase};
use polymarket_position_monitor::reporter::WebhookNotifier;
use polymarket_position_monitor::state::StateStore;

#[derive(Parser)]
#[command(name = "monitor", about = "Polymarket trader position monitor")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the state file path from the config
    #[arg(long)]
    state: Option<PathBuf>,

    /// Run the baseline (if needed) and a single poll cycle, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load and validate config; any problem here is fatal
    let mut config = AppConfig::load(&args.config)?;
    config.apply_env_overrides();
    config.validate()?;
    info!("Loaded config from {}", args.config.display());

    let traders = config.traders();
    let settings = &config.settings;
    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.state_path));

    let store = StateStore::load(&state_path)
        .with_context(|| format!("cannot start with state file {}", state_path.display()))?;
    info!(
        "Loaded state for {} trader(s) from {}",
        store.len(),
        state_path.display()
    );

    // --- Allow-list ---
    let allow_list = match settings.allow_list_tag() {
        Some(tag) => {
            info!("Building market allow-list for tag \"{tag}\"...");
            let gamma = GammaClient::new()?;
            let allowed = fetch_allow_list(&gamma, tag)
                .await
                .with_context(|| format!("failed to build allow-list for tag \"{tag}\""))?;
            if allowed.is_empty() {
                warn!("No open markets carry tag \"{tag}\"; every position will be filtered out");
            } else {
                info!("Allow-list: {} market(s)", allowed.len());
            }
            Some(allowed)
        }
        None => {
            info!("No tag configured, monitoring all markets");
            None
        }
    };

    let notifier = WebhookNotifier::new(config.webhook_url())?;
    if notifier.is_active() {
        info!("Webhook notifications enabled");
    } else {
        info!("Webhook notifications disabled (no URL configured), alerts go to stdout");
    }

    let monitor_settings = MonitorSettings {
        request_delay: settings.request_delay(),
        poll_interval: settings.poll_interval(),
        max_alert_entries: settings.max_alert_entries,
    };
    info!(
        "Starting monitor: {} trader(s), poll={}s, delay={}ms",
        traders.len(),
        settings.poll_interval_secs,
        settings.request_delay_ms,
    );

    let mut monitor = Monitor::new(
        DataClient::new()?,
        notifier,
        store,
        traders,
        allow_list,
        monitor_settings,
    );

    if args.once {
        if monitor.phase() == Phase::Baselining {
            monitor.baseline().await;
        }
        let report = monitor.run_cycle().await;
        info!(
            "Cycle complete: {} polled, {} failed, {} change(s), {} alert(s) sent",
            report.polled, report.failed, report.changes, report.notified
        );
        return Ok(());
    }

    monitor.run().await
}
