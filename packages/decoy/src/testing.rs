//! Testing utilities for code built on decoy.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! decoy = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Asserting on diagnostics
//!
//! The default [`PanicReporter`](crate::PanicReporter) ends the test on the
//! first fatal diagnostic. To assert on the diagnostics themselves, record
//! them instead:
//!
//! ```ignore
//! use std::sync::Arc;
//! use decoy::testing::RecordingReporter;
//! use decoy::{Mocker, PatchTable};
//!
//! let reporter = Arc::new(RecordingReporter::new());
//! let mocker = Mocker::with_reporter(Arc::new(PatchTable::new()), reporter.clone());
//!
//! // ... set up, run the code under test ...
//! mocker.verify();
//!
//! assert!(reporter.contains("Unexpected number of calls"));
//! ```

use std::sync::{Mutex, MutexGuard, Once};

use anyhow::Result;

use crate::report::{Report, Reporter, Severity};

/// A reporter that records every diagnostic and never panics.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_reports(&self) -> MutexGuard<'_, Vec<Report>> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, severity: Severity, message: &str) {
        self.lock_reports().push(Report {
            severity,
            message: message.to_string(),
        });
    }

    /// Every report, in order.
    pub fn reports(&self) -> Vec<Report> {
        self.lock_reports().clone()
    }

    /// Messages of non-fatal reports.
    pub fn failures(&self) -> Vec<String> {
        self.messages_of(Severity::Failure)
    }

    /// Messages of fatal reports.
    pub fn fatals(&self) -> Vec<String> {
        self.messages_of(Severity::Fatal)
    }

    /// Every message, in order.
    pub fn messages(&self) -> Vec<String> {
        self.lock_reports()
            .iter()
            .map(|report| report.message.clone())
            .collect()
    }

    /// True if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock_reports()
            .iter()
            .any(|report| report.message.contains(needle))
    }

    pub fn clear(&self) {
        self.lock_reports().clear();
    }

    /// All reports as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.lock_reports())?)
    }

    fn messages_of(&self, severity: Severity) -> Vec<String> {
        self.lock_reports()
            .iter()
            .filter(|report| report.severity == severity)
            .map(|report| report.message.clone())
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn failure(&self, message: &str) {
        self.record(Severity::Failure, message);
    }

    fn fatal(&self, message: &str) {
        self.record(Severity::Fatal, message);
    }
}

static TRACING: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Filtering follows `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
