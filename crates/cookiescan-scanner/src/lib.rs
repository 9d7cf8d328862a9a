//! Cookiescan Scanner - consent variant scanning.
//!
//! This crate turns the pages of a site config into scan tasks, one per
//! consent variant, and runs them in isolated browsing contexts. Each task
//! yields an inventory of every frame's cookies and web storage together
//! with the domains each frame contacted.
//!
//! # Features
//!
//! - Variant expansion into consent cookies carrying harvested group hashes
//! - Headful and headless partitions, each in its own browser process
//! - Concurrent tasks with an optional concurrency limit
//! - Per-frame storage collection where one failing storage kind does not
//!   lose the others
//!
//! # Example
//!
//! ```rust,ignore
//! use cookiescan_scanner::{expand_tasks, CoordinatorSettings, ScanCoordinator};
//! use std::sync::Arc;
//!
//! let tasks = expand_tasks(&site.selected_pages(), &hashes, &settings.group_settings);
//! let coordinator = ScanCoordinator::new(
//!     Arc::new(ChromiumLauncher::new(&config.browser)),
//!     CoordinatorSettings::from(&config.scanning),
//! );
//! let inventory = coordinator.run(&tasks, &ctx).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod collector;
pub mod coordinator;
#[allow(missing_docs)]
pub mod domains;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod variants;

// Re-export commonly used types
pub use collector::collect_frames;
pub use coordinator::{CoordinatorSettings, ScanCoordinator};
pub use domains::DomainTracker;
pub use error::{Result, ScanError, TaskStage};
pub use variants::{consent_cookie, expand_tasks, VariantBundles};
