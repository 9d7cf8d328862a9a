use cookiescan_browser::{BrowserError, Visibility};
use std::fmt;
use thiserror::Error;

/// Progress of one scan task.
///
/// A failed task reports the last stage it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Created,
    ContextIsolated,
    Navigated,
    Settled,
    ActionsApplied,
    Collected,
    Closed,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::ContextIsolated => "context-isolated",
            Self::Navigated => "navigated",
            Self::Settled => "settled",
            Self::ActionsApplied => "actions-applied",
            Self::Collected => "collected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to launch {visibility:?} browser: {source}")]
    Launch {
        visibility: Visibility,
        #[source]
        source: BrowserError,
    },

    #[error("task \"{task}\" ({url}) failed after {stage}: {source}")]
    TaskFailed {
        task: String,
        url: String,
        stage: TaskStage,
        #[source]
        source: BrowserError,
    },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failed_display() {
        let err = ScanError::TaskFailed {
            task: "Frontpage with all accepted".to_string(),
            url: "https://www.hel.fi/fi".to_string(),
            stage: TaskStage::ContextIsolated,
            source: BrowserError::NavigationError("net::ERR_NAME_NOT_RESOLVED".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "task \"Frontpage with all accepted\" (https://www.hel.fi/fi) failed after \
             context-isolated: navigation failed: net::ERR_NAME_NOT_RESOLVED"
        );
    }
}
