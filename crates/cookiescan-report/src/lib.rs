//! Cookiescan Report - report assembly and persistence.
//!
//! A finished run is turned into a [`ScanReport`] by [`assemble`]: summary
//! counts, the echoed site config, the policy, every inventory and verdict,
//! timings and a per-domain certificate summary. [`ReportStore`] writes it
//! as JSON next to an append-only run history.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod assembler;
pub mod domains;
pub mod error;
pub mod store;

pub use assembler::{
    assemble, summarize, ConfigEcho, ReportInput, ReportSummary, ScanReport, PROCESSING_TIME,
};
pub use domains::{is_known_tracker, summarize_domains, DomainSummary};
pub use error::{ReportError, Result};
pub use store::{report_filename, HistoryEntry, ReportStore};
