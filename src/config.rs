//! fmcsync configuration (`config.toml`)
//!
//! ```toml
//! [fmc]
//! url = "https://fmc.example.com"
//! domain_uuid = "e276abec-e0f2-11e3-8169-6d9ed49b625f"
//! token_env = "FMC_TOKEN"
//! timeout_secs = 30
//!
//! [apply]
//! jobs = 4
//! refresh = true
//! deadline_secs = 600
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 500
//! backoff_factor = 2.0
//! max_delay_ms = 10000
//! ```
//!
//! Every section and key is optional; a missing file means defaults.

use anyhow::{Context, Result};
use reconcile::{Cancellation, ExecuteOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fmc: FmcConfig,
    pub apply: ApplyConfig,
    pub retry: RetrySettings,
}

/// Connection settings for the management center
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FmcConfig {
    /// Base URL, e.g. `https://fmc.example.com`
    pub url: String,
    /// Domain UUID used in every object endpoint
    pub domain_uuid: String,
    /// Environment variable holding the `X-auth-access-token`
    pub token_env: String,
    pub timeout_secs: u64,
    /// Page size for list calls
    pub page_limit: usize,
}

impl Default for FmcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            domain_uuid: "e276abec-e0f2-11e3-8169-6d9ed49b625f".to_string(),
            token_env: "FMC_TOKEN".to_string(),
            timeout_secs: 30,
            page_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    pub jobs: usize,
    pub refresh: bool,
    /// Stop starting new operations after this many seconds (0 = no deadline)
    pub deadline_secs: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        let defaults = ExecuteOptions::default();
        Self {
            jobs: defaults.jobs,
            refresh: defaults.refresh,
            deadline_secs: 0,
        }
    }
}

impl ApplyConfig {
    /// Cancellation signal honoring the configured deadline
    pub fn cancellation(&self) -> Cancellation {
        if self.deadline_secs == 0 {
            Cancellation::new()
        } else {
            Cancellation::with_deadline(Duration::from_secs(self.deadline_secs))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: u64::try_from(defaults.max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.backoff_factor.is_finite() && self.backoff_factor >= 1.0,
            "[retry] backoff_factor must be a number >= 1.0, got {}",
            self.backoff_factor
        );
        Ok(())
    }

    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the config directory
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format: {}", path.display()))?;
        config
            .retry
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.fmc.token_env).with_context(|| {
            format!(
                "FMC access token not set: export {} or set [fmc] token_env",
                self.fmc.token_env
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.apply.jobs, 4);
        assert!(config.apply.refresh);
        assert_eq!(config.fmc.token_env, "FMC_TOKEN");
        assert_eq!(config.retry.to_retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[fmc]
url = "https://fmc.lab"

[apply]
jobs = 8

[retry]
max_attempts = 5
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.fmc.url, "https://fmc.lab");
        assert_eq!(config.fmc.timeout_secs, 30);
        assert_eq!(config.apply.jobs, 8);
        assert!(config.apply.refresh);
        let retry = config.retry.to_retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[apply]\njobs = \"many\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_zero_deadline_never_cancels() {
        let apply = ApplyConfig::default();
        assert!(!apply.cancellation().is_cancelled());
    }

    #[test]
    fn test_huge_deadline_does_not_overflow() {
        let apply = ApplyConfig {
            deadline_secs: u64::MAX,
            ..Default::default()
        };
        assert!(!apply.cancellation().is_cancelled());
    }

    #[test]
    fn test_shrinking_backoff_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        for factor in ["-2.0", "0.5", "nan"] {
            fs::write(&path, format!("[retry]\nbackoff_factor = {factor}\n")).unwrap();
            let err = Config::load(Some(&path)).unwrap_err();
            assert!(format!("{err:#}").contains("backoff_factor"), "{err:#}");
        }
    }
}
