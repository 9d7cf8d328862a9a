//! Error types for the batch driver.

use cookiescan_browser::BrowserError;
use cookiescan_compliance::ComplianceError;
use cookiescan_policy::PolicyError;
use cookiescan_report::ReportError;
use cookiescan_scanner::ScanError;
use thiserror::Error;

/// Failure of one site config run.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Group hashes or policy could not be obtained; the site is skipped
    #[error("policy source failed: {0}")]
    Policy(#[from] PolicyError),

    /// The policy contains a pattern that cannot be compiled; the site is skipped
    #[error("compliance check failed: {0}")]
    Compliance(#[from] ComplianceError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("report could not be written: {0}")]
    Report(#[from] ReportError),
}

impl SiteError {
    /// Whether the whole batch has to stop.
    ///
    /// A browser that cannot be launched is systemic even when the consent
    /// harvest is the first to notice.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::Scan(_)
                | Self::Report(_)
                | Self::Policy(PolicyError::Browser(BrowserError::LaunchError(_)))
        )
    }
}

/// Failure that terminates the batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("site \"{site}\" failed: {source}")]
    Systemic {
        site: String,
        #[source]
        source: SiteError,
    },

    #[error("time budget exhausted, {remaining} site config(s) not started")]
    BudgetExhausted { remaining: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookiescan_browser::Visibility;

    #[test]
    fn test_launch_failure_is_systemic() {
        let err = SiteError::Scan(ScanError::Launch {
            visibility: Visibility::Headless,
            source: BrowserError::LaunchError("no chrome".to_string()),
        });
        assert!(err.is_systemic());
    }

    #[test]
    fn test_policy_failure_is_not_systemic() {
        let err = SiteError::Policy(PolicyError::ConsentCookieMissing {
            url: "https://www.hel.fi/fi".to_string(),
        });
        assert!(!err.is_systemic());
    }

    #[test]
    fn test_harvest_launch_failure_is_systemic() {
        let err = SiteError::Policy(PolicyError::Browser(BrowserError::LaunchError(
            "no chrome".to_string(),
        )));
        assert!(err.is_systemic());
    }
}
