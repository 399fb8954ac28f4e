use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::types::{Position, PositionSet};

/// Last-known positions per trader wallet, persisted as a single JSON document.
///
/// The polling driver is the only mutator. It calls [`StateStore::set`] after
/// each successfully processed trader and [`StateStore::save`] once per cycle,
/// so the file on disk always reflects the last completed cycle.
#[derive(Debug, Default)]
pub struct StateStore {
    path: PathBuf,
    traders: HashMap<String, PositionSet>,
}

impl StateStore {
    /// Empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            traders: HashMap::new(),
        }
    }

    /// Load the store from `path`. A missing file yields an empty store;
    /// an unreadable or corrupt one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let traders: HashMap<String, PositionSet> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self { path, traders })
    }

    /// Write the full store atomically (temp file + rename).
    ///
    /// Positions are written sorted by key so the file is stable across runs.
    pub fn save(&self) -> Result<()> {
        let sorted: BTreeMap<&str, Vec<&Position>> = self
            .traders
            .iter()
            .map(|(wallet, positions)| {
                let mut list: Vec<&Position> = positions.iter().collect();
                list.sort_by(|a, b| a.key().cmp(&b.key()));
                (wallet.as_str(), list)
            })
            .collect();
        let json = serde_json::to_string_pretty(&sorted).context("failed to serialize state")?;

        let tmp_path = tmp_path_for(&self.path);
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!("Persisted state for {} trader(s)", self.traders.len());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.traders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.traders.len()
    }

    pub fn contains(&self, wallet: &str) -> bool {
        self.traders.contains_key(wallet)
    }

    /// Last-known positions for `wallet`; empty if the trader was never stored.
    pub fn get(&self, wallet: &str) -> &[Position] {
        self.traders.get(wallet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the stored snapshot for `wallet`.
    pub fn set(&mut self, wallet: &str, positions: PositionSet) {
        self.traders.insert(wallet.to_string(), positions);
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
