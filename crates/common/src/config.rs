//! Harness configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

pub const ENV_BASE_URL: &str = "COURSECHECK_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "COURSECHECK_TIMEOUT_SECS";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root URL of the system under test
    pub base_url: String,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Directory scanned for scenario specs
    pub specs_dir: PathBuf,

    /// Directory results are written to
    pub output_dir: PathBuf,

    /// Browser walkthrough configuration
    pub browser: BrowserConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            headers,
            specs_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            browser: BrowserConfig::default(),
        }
    }
}

/// Browser walkthrough configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// `chromium`, `firefox` or `webkit`
    pub browser: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Fixed wait after navigation for the UI to settle
    pub settle_ms: u64,

    pub screenshot_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            settle_ms: 1000,
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

impl HarnessConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    /// Not validated: callers layer their own overrides on top and call
    /// [`HarnessConfig::validate`] once at the end.
    pub fn load(path: Option<&Path>) -> HarnessResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        toml::from_str(content).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn apply_env<F>(&mut self, lookup: F) -> HarnessResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                HarnessError::Config(format!("{} must be an integer, got '{}'", ENV_TIMEOUT_SECS, secs))
            })?;
            self.set_timeout_secs(secs)?;
        }
        Ok(())
    }

    pub fn set_timeout_secs(&mut self, secs: u64) -> HarnessResult<()> {
        self.timeout_ms = secs
            .checked_mul(1000)
            .ok_or_else(|| HarnessError::Config(format!("timeout of {} seconds is too large", secs)))?;
        Ok(())
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(HarnessError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(HarnessError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
