//! Browser automation capability interface for consent scans.
//!
//! The scanner only talks to the traits in [`session`] and [`actions`];
//! [`engine`] implements them on top of Chromium via the DevTools protocol.
//! Tests substitute an in-memory implementation.

pub mod actions;
pub mod engine;
pub mod error;
pub mod network;
pub mod scripts;
pub mod session;

pub use actions::{extract_domain, PageActions};
pub use engine::ChromiumLauncher;
pub use error::{BrowserError, Result};
pub use network::{IdleTracker, NetworkEvent, NetworkObserver};
pub use session::{
    BrowserCookie, BrowserLauncher, BrowserPage, BrowserSession, BrowsingContext, FrameRef,
    Visibility,
};
