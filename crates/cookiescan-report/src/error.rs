use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt report history at {path}: {source}")]
    CorruptHistory {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_history_display() {
        let source = serde_json::from_str::<serde_json::Value>("[{").unwrap_err();
        let err = ReportError::CorruptHistory {
            path: PathBuf::from("reports/json/history.json"),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("corrupt report history at reports/json/history.json"));
    }
}
