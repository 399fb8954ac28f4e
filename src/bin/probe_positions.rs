//! Probe: fetch and normalize one trader's positions.
//!
//! Hits GET https://data-api.polymarket.com/positions?user=<addr> and prints:
//! - Raw record count and the fields of the first record
//! - The normalized snapshot as a table
//! - Optionally, the changes against the persisted state (read-only)

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use std::time::Instant;

use polymarket_position_monitor::api::DataClient;
use polymarket_position_monitor::engine::reconcile;
use polymarket_position_monitor::normalize::normalize_snapshot;
use polymarket_position_monitor::state::StateStore;

#[derive(Parser)]
#[command(name = "probe_positions", about = "Fetch and normalize a trader's positions")]
struct Args {
    /// Trader proxy wallet address
    #[arg(long)]
    wallet: String,

    /// Diff against this state file without modifying it
    #[arg(long)]
    state: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let wallet = args.wallet.trim().to_lowercase();
    let client = DataClient::new()?;

    println!("=== Probe: Positions ===");
    println!("Trader: {wallet}");
    println!();

    let start = Instant::now();
    let raw = client.fetch_positions(&wallet).await?;
    println!("Raw records: {} ({:?})", raw.len(), start.elapsed());
    if let Some(obj) = raw.first().and_then(|v| v.as_object()) {
        println!("Fields present:");
        for key in obj.keys() {
            println!("  - {key}");
        }
    }
    println!();

    let positions = normalize_snapshot(&raw);
    println!("--- Normalized ({}) ---", positions.len());
    println!(
        "{:<50} {:>8} {:>12} {:>8} {:>8} {:>10}",
        "Market", "Outcome", "Size", "Price", "Avg", "PnL"
    );
    println!("{}", "-".repeat(101));
    for p in &positions {
        let title: String = p.title.chars().take(48).collect();
        let pnl = p
            .cash_pnl
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<50} {:>8} {:>12.2} {:>8.4} {:>8.4} {:>10}",
            title, p.outcome_key, p.size, p.current_price, p.average_entry_price, pnl
        );
    }
    println!();

    if let Some(path) = args.state {
        let store = StateStore::load(&path)?;
        if !store.contains(&wallet) {
            println!("Trader not present in {}; every position would be reported as opened.", path.display());
        }
        let changes = reconcile(store.get(&wallet), &positions);
        println!("--- Changes vs {} ({}) ---", path.display(), changes.len());
        for c in &changes {
            println!("{}", serde_json::to_string(c)?);
        }
    }

    Ok(())
}
