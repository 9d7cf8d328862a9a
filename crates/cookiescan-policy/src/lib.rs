//! External collaborators of a scan: the consent policy endpoint, the live
//! consent widget that hands out group hashes, and the known tracker list.

pub mod consent;
pub mod error;
pub mod settings;
pub mod trackers;

pub use consent::{harvest_group_hashes, HarvestSettings};
pub use error::{PolicyError, Result};
pub use settings::{PolicyClient, PolicySettings};
pub use trackers::{fetch_tracking_domains, parse_blocklist, DEFAULT_BLOCKLIST_URL};
