//! Compliance matching for harvested storage inventories.
//!
//! Pure and browser-free: [`pattern`] compiles policy name/host patterns,
//! [`expiration`] buckets cookie lifetimes into policy wording and [`engine`]
//! annotates an inventory with per-item, per-frame and per-task verdicts.

pub mod engine;
pub mod error;
pub mod expiration;
pub mod pattern;

pub use engine::{check_compliance, ComplianceOutcome, FoundItem};
pub use error::{ComplianceError, Result};
pub use expiration::cookie_expiration_text;
pub use pattern::{compile, matches_host, matches_name, rewrite_url, Matcher, PatternKind};
