//! Application configuration for cookiescan.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Site-specific settings (pages, variants)
//! live in [`crate::site`]; this file only tunes the scanner itself.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/cookiescan/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan timing and concurrency
    pub scanning: ScanningConfig,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Report output settings
    pub reports: ReportConfig,
    /// Known tracker list settings
    pub tracking: TrackingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if missing.
    pub fn load_from(config_path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_path = config_path.into();

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `COOKIESCAN_SETTLE_DELAY_MS`: Override the pre-collection settle delay
    /// - `COOKIESCAN_IDLE_TIMEOUT_MS`: Override the network-idle race timeout
    /// - `COOKIESCAN_BUDGET_SECS`: Override the overall wall-clock budget
    /// - `COOKIESCAN_REPORT_DIR`: Override the report output directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `COOKIESCAN_*` environment overrides to an already loaded config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COOKIESCAN_SETTLE_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.scanning.settle_delay_ms = ms;
                tracing::debug!("Override scanning.settle_delay_ms from env: {}", ms);
            }
        }

        if let Ok(val) = std::env::var("COOKIESCAN_IDLE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.scanning.network_idle_timeout_ms = ms;
                tracing::debug!("Override scanning.network_idle_timeout_ms from env: {}", ms);
            }
        }

        if let Ok(val) = std::env::var("COOKIESCAN_BUDGET_SECS") {
            if let Ok(secs) = val.parse() {
                self.scanning.budget_secs = secs;
                tracing::debug!("Override scanning.budget_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("COOKIESCAN_REPORT_DIR") {
            if !val.is_empty() {
                tracing::debug!("Override reports.dir from env: {}", val);
                self.reports.dir = PathBuf::from(val);
            }
        }
    }

    /// Reject values the scanner cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.scanning.budget_high_water) {
            return Err(ConfigError::InvalidValue {
                field: "scanning.budget_high_water".to_string(),
                reason: format!("must be within 0.0..=1.0, got {}", self.scanning.budget_high_water),
            });
        }
        if self.scanning.network_idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.network_idle_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/cookiescan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "cookiescan", "cookiescan")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the default directory holding one TOML file per site.
    ///
    /// Uses XDG base directories: `~/.config/cookiescan/sites`
    pub fn sites_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "cookiescan", "cookiescan")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("sites"))
    }
}

/// Scan timing and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Delay before storage collection so late writes can land
    pub settle_delay_ms: u64,
    /// Upper bound for any network-idle wait
    pub network_idle_timeout_ms: u64,
    /// Maximum tasks in flight per browser (0 = unbounded)
    pub max_concurrent_tasks: usize,
    /// Pause between two site configs
    pub inter_config_delay_ms: u64,
    /// Overall wall-clock budget in seconds (0 = unlimited)
    pub budget_secs: u64,
    /// Fraction of the budget after which no new site config is started
    pub budget_high_water: f64,
}

impl ScanningConfig {
    /// Settle delay as a `Duration`.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Network-idle race timeout as a `Duration`.
    #[must_use]
    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout_ms)
    }

    /// Overall budget, if one is configured.
    #[must_use]
    pub fn budget(&self) -> Option<Duration> {
        (self.budget_secs > 0).then(|| Duration::from_secs(self.budget_secs))
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 8000,
            network_idle_timeout_ms: 15_000,
            max_concurrent_tasks: 0,
            inter_config_delay_ms: 1000,
            budget_secs: 0,
            budget_high_water: 0.9,
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Launch Chromium with `--no-sandbox`
    pub no_sandbox: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Launch timeout in seconds
    pub launch_timeout_secs: u64,
    /// How long to wait for the consent widget when harvesting hashes
    pub consent_wait_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            no_sandbox: true,
            window_width: 1920,
            window_height: 1080,
            launch_timeout_secs: 30,
            consent_wait_timeout_secs: 30,
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory receiving `history.json` and per-run detail files
    pub dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports/json"),
        }
    }
}

/// Known tracker list settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Download the tracker list alongside each scan
    pub enabled: bool,
    /// Plain-text blocklist, one domain per line
    pub blocklist_url: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocklist_url: "https://blocklistproject.github.io/Lists/alt-version/tracking-nl.txt"
                .to_string(),
        }
    }
}
