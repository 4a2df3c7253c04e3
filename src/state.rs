use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reconcile::{RemoteState, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// State file name inside the state directory
pub const STATE_FILE: &str = "state.json";

// ============================================================================
// State Structures
// ============================================================================

/// Persisted remote state of every applied instance, keyed by instance name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateFile {
    pub instances: BTreeMap<String, InstanceState>,
}

/// Last applied state of one plural resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Kind name, e.g. "network_groups"
    pub kind: String,
    /// Item name -> remote id and last applied attributes
    #[serde(default)]
    pub items: RemoteState,
    /// Last time this instance was written
    pub last_updated: DateTime<Utc>,
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Get the state file path
    pub fn path() -> Result<PathBuf> {
        Ok(paths::state_dir()?.join(STATE_FILE))
    }

    /// Load state from the state directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to the state directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Save state to disk, replacing the previous file in one rename
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Remote state recorded for an instance
    ///
    /// Fails when the instance was last applied with a different kind.
    pub fn items(&self, instance: &str, kind: &ResourceKind) -> Result<RemoteState> {
        match self.instances.get(instance) {
            Some(existing) if existing.kind != kind.name => bail!(
                "Instance '{instance}' holds {} but the document declares {}",
                existing.kind,
                kind.name
            ),
            Some(existing) => Ok(existing.items.clone()),
            None => Ok(RemoteState::new()),
        }
    }

    /// Replace the recorded state of an instance
    pub fn record(&mut self, instance: &str, kind: &ResourceKind, items: RemoteState) {
        self.instances.insert(
            instance.to_string(),
            InstanceState {
                kind: kind.name.to_string(),
                items,
                last_updated: Utc::now(),
            },
        );
    }

    /// Forget an instance, returning whether it existed
    pub fn remove(&mut self, instance: &str) -> bool {
        self.instances.remove(instance).is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
