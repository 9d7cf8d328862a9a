//! JSON report store.
//!
//! Layout of the report directory:
//! - `history.json`: append-only list of `{timeStamp, summary, filename}`
//! - `report-<timeStamp>.json`: full detail of one run
//! - `knownTrackers.json`: the tracker list used by the latest run

use crate::assembler::{ReportSummary, ScanReport};
use crate::error::{ReportError, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HISTORY_FILE: &str = "history.json";
const TRACKERS_FILE: &str = "knownTrackers.json";

/// One line of the run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub time_stamp: String,
    pub summary: ReportSummary,
    /// Detail file name, relative to the report directory
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnownTrackers {
    time_stamp: String,
    domains: Vec<String>,
}

/// Detail file name for a report stamped `time_stamp`.
///
/// Colons are replaced so the name is valid on every filesystem.
#[must_use]
pub fn report_filename(time_stamp: &str) -> String {
    format!("report-{}.json", time_stamp.replace(':', "-"))
}

/// Report directory handle.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the run history; a missing file is an empty history.
    pub async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        let path = self.dir.join(HISTORY_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no report history yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|source| ReportError::CorruptHistory { path, source })
    }

    /// Write the detail file for `report` and append it to the history.
    ///
    /// Returns the path of the detail file.
    pub async fn save(&self, report: &ScanReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut history = self.load_history().await?;
        let filename = report_filename(&report.time_stamp);
        history.push(HistoryEntry {
            time_stamp: report.time_stamp.clone(),
            summary: report.summary.clone(),
            filename: filename.clone(),
        });

        let report_path = self.dir.join(&filename);
        tokio::fs::write(&report_path, serde_json::to_string_pretty(report)?).await?;
        tokio::fs::write(
            self.dir.join(HISTORY_FILE),
            serde_json::to_string_pretty(&history)?,
        )
        .await?;

        info!(path = %report_path.display(), runs = history.len(), "report saved");
        Ok(report_path)
    }

    /// Persist the tracker list used for this run.
    pub async fn save_known_trackers(&self, domains: &[String]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let trackers = KnownTrackers {
            time_stamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            domains: domains.to_vec(),
        };
        let path = self.dir.join(TRACKERS_FILE);
        tokio::fs::write(&path, serde_json::to_string_pretty(&trackers)?).await?;
        debug!(path = %path.display(), domains = domains.len(), "known trackers saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename_has_no_colons() {
        assert_eq!(
            report_filename("2024-05-01T12:00:00.000Z"),
            "report-2024-05-01T12-00-00.000Z.json"
        );
    }
}
