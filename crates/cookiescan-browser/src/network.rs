//! Network observation: request/response events and network-idle tracking.

use cookiescan_core::CertificateSummary;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// How long the network must stay quiet to count as idle.
pub const IDLE_QUIET_WINDOW: Duration = Duration::from_millis(500);

/// How often [`IdleTracker::wait_for_idle`] re-checks the in-flight set.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A request issued by, or a response delivered to, a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A request is about to be sent
    Request {
        frame_id: Option<String>,
        url: String,
    },
    /// Response headers arrived; `security` is `None` for plain HTTP or
    /// when the browser did not expose TLS details
    Response {
        frame_id: Option<String>,
        url: String,
        security: Option<CertificateSummary>,
    },
}

/// Callback receiving every [`NetworkEvent`] of one page.
pub type NetworkObserver = Arc<dyn Fn(NetworkEvent) + Send + Sync>;

#[derive(Debug)]
struct IdleState {
    inflight: HashSet<String>,
    last_change: Instant,
}

/// Tracks in-flight requests of one page.
///
/// The page is idle once nothing has been in flight for [`IDLE_QUIET_WINDOW`].
#[derive(Debug)]
pub struct IdleTracker {
    state: Mutex<IdleState>,
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IdleState {
                inflight: HashSet::new(),
                last_change: Instant::now(),
            }),
        }
    }

    pub fn request_started(&self, request_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.inflight.insert(request_id.to_string());
        state.last_change = Instant::now();
    }

    /// Record a finished or failed request.
    pub fn request_finished(&self, request_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.inflight.remove(request_id) {
            state.last_change = Instant::now();
        }
    }

    #[must_use]
    pub fn inflight(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inflight
            .len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.inflight.is_empty() && state.last_change.elapsed() >= IDLE_QUIET_WINDOW
    }

    /// Race network idle against `timeout`. Returns `true` if idle was reached.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            while !self.is_idle() {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }
}
