use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::alert::format_alert;
use crate::api::PositionSource;
use crate::engine::reconcile;
use crate::normalize::{normalize_snapshot, retain_allowed};
use crate::reporter::Notifier;
use crate::state::StateStore;
use crate::types::{PositionSet, Trader};

/// Where the driver is in its lifecycle. The only transition is
/// `Baselining -> SteadyPolling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No prior state: capture snapshots silently before alerting on anything.
    Baselining,
    /// Diff each fresh snapshot against the stored one and alert on changes.
    SteadyPolling,
}

/// Pacing and formatting knobs for the driver.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Sleep between consecutive traders within a cycle.
    pub request_delay: Duration,
    /// Sleep between full cycles.
    pub poll_interval: Duration,
    pub max_alert_entries: usize,
}

/// Outcome counters for one steady-state cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Traders fetched and reconciled successfully.
    pub polled: usize,
    /// Traders skipped because the fetch failed.
    pub failed: usize,
    /// Traders with at least one change.
    pub changed: usize,
    /// Total changes across all traders.
    pub changes: usize,
    /// Alerts accepted by the notifier.
    pub notified: usize,
}

/// Drives baseline capture and the poll loop over a fixed set of traders.
///
/// Owns the [`StateStore`] and is its only mutator; traders are processed
/// strictly one after another.
pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    store: StateStore,
    traders: Vec<Trader>,
    allow_list: Option<HashSet<String>>,
    settings: MonitorSettings,
    phase: Phase,
}

impl<S: PositionSource, N: Notifier> Monitor<S, N> {
    /// Starts in [`Phase::Baselining`] when `store` is empty, otherwise
    /// resumes directly in [`Phase::SteadyPolling`].
    pub fn new(
        source: S,
        notifier: N,
        store: StateStore,
        traders: Vec<Trader>,
        allow_list: Option<HashSet<String>>,
        settings: MonitorSettings,
    ) -> Self {
        let phase = if store.is_empty() {
            Phase::Baselining
        } else {
            Phase::SteadyPolling
        };
        Self {
            source,
            notifier,
            store,
            traders,
            allow_list,
            settings,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Fetch and normalize one trader's snapshot, scoped to the allow-list.
    async fn fetch_snapshot(&self, trader: &Trader) -> Result<PositionSet> {
        let raw = self.source.positions_of(&trader.wallet).await?;
        let mut positions = normalize_snapshot(&raw);
        if let Some(allow) = &self.allow_list {
            retain_allowed(&mut positions, allow);
        }
        Ok(positions)
    }

    async fn pace(&self, index: usize) {
        if index > 0 && !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }
    }

    /// Capture every trader's current positions without emitting any alerts,
    /// then switch to [`Phase::SteadyPolling`].
    ///
    /// Traders whose fetch fails are skipped; they are treated as new on the
    /// first steady cycle. Returns the number of traders captured. Does nothing
    /// once the monitor is already polling.
    pub async fn baseline(&mut self) -> usize {
        if self.phase != Phase::Baselining {
            return 0;
        }
        info!("Capturing baseline for {} trader(s)...", self.traders.len());

        let traders = self.traders.clone();
        let mut captured = 0;
        for (i, trader) in traders.iter().enumerate() {
            self.pace(i).await;
            match self.fetch_snapshot(trader).await {
                Ok(positions) => {
                    debug!("[{}] Baseline: {} position(s)", trader.name, positions.len());
                    self.store.set(&trader.wallet, positions);
                    captured += 1;
                }
                Err(e) => {
                    warn!("[{}] Baseline fetch failed, skipping: {e:#}", trader.name);
                }
            }
        }

        if let Err(e) = self.store.save() {
            warn!("Failed to persist baseline: {e:#}");
        }
        self.phase = Phase::SteadyPolling;
        info!(
            "Baseline captured for {captured}/{} trader(s)",
            self.traders.len()
        );
        captured
    }

    /// Poll one trader: fetch, reconcile, alert, then record the new snapshot.
    ///
    /// On fetch failure the stored snapshot is left untouched. A failed alert
    /// is logged and does not prevent the snapshot update.
    async fn poll_trader(&mut self, trader: &Trader, report: &mut CycleReport) -> Result<()> {
        let current = self
            .fetch_snapshot(trader)
            .await
            .with_context(|| format!("fetch failed for {}", trader.wallet))?;
        let changes = reconcile(self.store.get(&trader.wallet), &current);
        report.polled += 1;

        if changes.is_empty() {
            debug!("[{}] No changes ({} position(s))", trader.name, current.len());
        } else {
            info!("[{}] {} change(s) detected", trader.name, changes.len());
            report.changed += 1;
            report.changes += changes.len();

            let message = format_alert(trader, &changes, self.settings.max_alert_entries);
            match self.notifier.send(&message).await {
                Ok(()) => report.notified += 1,
                Err(e) => warn!("[{}] Failed to send alert: {e:#}", trader.name),
            }
        }

        self.store.set(&trader.wallet, current);
        Ok(())
    }

    /// Run one full steady-state cycle over all traders, then persist the store.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let traders = self.traders.clone();

        for (i, trader) in traders.iter().enumerate() {
            self.pace(i).await;
            if let Err(e) = self.poll_trader(trader, &mut report).await {
                warn!("[{}] Skipping this cycle: {e:#}", trader.name);
                report.failed += 1;
            }
        }

        if let Err(e) = self.store.save() {
            warn!("Failed to persist state: {e:#}");
        }
        report
    }

    /// Baseline if needed, then poll forever.
    async fn drive(&mut self) {
        if self.phase == Phase::Baselining {
            self.baseline().await;
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        loop {
            let report = self.run_cycle().await;
            info!(
                "Cycle complete: {} polled, {} failed, {} change(s) across {} trader(s), {} alert(s) sent",
                report.polled, report.failed, report.changes, report.changed, report.notified
            );
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Run until Ctrl+C. An interrupted cycle is not persisted.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Monitoring {} trader(s) (interval: {}s). Press Ctrl+C to stop.",
            self.traders.len(),
            self.settings.poll_interval.as_secs()
        );
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
            }
            _ = self.drive() => {}
        }
        Ok(())
    }
}
