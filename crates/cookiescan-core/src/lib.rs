//! Cookiescan Core - Foundation crate for the cookiescan consent auditor.
//!
//! This crate provides the shared data model, error handling, configuration
//! management and the per-run context that all other cookiescan crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based application configuration with XDG paths
//! - [`site`] - Site configurations: pages, consent variants and scripted actions
//! - [`loader`] - Site configuration loading from a directory of TOML files
//! - [`types`] - Consent policy types, consent cookies and scan tasks
//! - [`inventory`] - Harvested storage inventory and compliance annotations
//! - [`timing`] - Explicitly passed run context with a timing sink
//!
//! # Example
//!
//! ```rust
//! use cookiescan_core::{AppConfig, RunContext};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.settle_delay_ms, 8000);
//!
//! let ctx = RunContext::new("example");
//! ctx.timer.start("URL generation");
//! ctx.timer.end("URL generation");
//! assert!(ctx.timer.report().contains_key("URL generation"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod site;
pub mod timing;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, ReportConfig, ScanningConfig, TrackingConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use inventory::{
    CertificateSummary, ComplianceData, CookieItem, DomainUsage, FrameSnapshot, InventoryItem,
    MatchedRule, StorageEntry, StorageItem,
};
pub use loader::SiteConfigLoader;
pub use site::{Bundle, PageSpec, ScanAction, SiteConfig, Variant};
pub use timing::{format_duration, RunContext, Timer, TimingRecord};
pub use types::{
    ConsentGroupSetting, ConsentHashes, CookieSpec, FlatItemRule, ItemRule, SameSite, ScanTask,
    StorageKind, CONSENT_COOKIE_NAME,
};
