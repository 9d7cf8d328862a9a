//! Run context and timing sink.
//!
//! A [`RunContext`] is created per site config and passed by reference down
//! the call chain instead of relying on a process-wide timer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Instant;

/// Per-run context carrying the timing sink and the run label.
#[derive(Debug)]
pub struct RunContext {
    /// Label used in log lines (site name or main URL)
    pub label: String,
    /// Timing sink for this run
    pub timer: Timer,
}

impl RunContext {
    /// Create a context with a fresh timer.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timer: Timer::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: Instant,
    end: Option<Instant>,
}

/// Labelled stopwatch. Safe to share between concurrent tasks.
#[derive(Debug)]
pub struct Timer {
    origin: Instant,
    spans: Mutex<HashMap<String, Span>>,
}

/// One completed timing, offsets relative to timer creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    /// Start offset in milliseconds
    pub start: f64,
    /// End offset in milliseconds
    pub end: f64,
    /// Elapsed milliseconds
    pub elapsed: f64,
    /// Elapsed time formatted for humans
    pub formatted_elapsed: String,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a timer whose offsets are relative to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            spans: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) timing `label`.
    pub fn start(&self, label: &str) {
        let mut spans = self.spans.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        spans.insert(
            label.to_string(),
            Span {
                start: Instant::now(),
                end: None,
            },
        );
    }

    /// Stop timing `label`, log the elapsed time and return it in milliseconds.
    pub fn end(&self, label: &str) -> Option<f64> {
        let mut spans = self.spans.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(span) = spans.get_mut(label) else {
            tracing::warn!(label, "no start time found for timing label");
            return None;
        };

        let end = Instant::now();
        span.end = Some(end);
        let elapsed = millis(end.duration_since(span.start));
        tracing::info!(label, elapsed = %format_duration(elapsed), "timing");
        Some(elapsed)
    }

    /// Completed timings, keyed by label.
    #[must_use]
    pub fn report(&self) -> BTreeMap<String, TimingRecord> {
        let spans = self.spans.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        spans
            .iter()
            .filter_map(|(label, span)| {
                let end = span.end?;
                let elapsed = millis(end.duration_since(span.start));
                Some((
                    label.clone(),
                    TimingRecord {
                        start: millis(span.start.duration_since(self.origin)),
                        end: millis(end.duration_since(self.origin)),
                        elapsed,
                        formatted_elapsed: format_duration(elapsed),
                    },
                ))
            })
            .collect()
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Format milliseconds as `"1m 30.00s"` or `"1.500s"`.
#[must_use]
pub fn format_duration(milliseconds: f64) -> String {
    let total_seconds = milliseconds / 1000.0;
    let minutes = (total_seconds / 60.0).floor();
    let seconds = total_seconds % 60.0;
    if minutes > 0.0 {
        format!("{minutes}m {seconds:.2}s")
    } else {
        format!("{seconds:.3}s")
    }
}
