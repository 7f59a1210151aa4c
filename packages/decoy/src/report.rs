//! Where diagnostics go.
//!
//! The engine never terminates the process on its own. Everything it finds is
//! handed to a [`Reporter`], which decides what "failure" and "fatal" mean for
//! the surrounding test harness.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::error;

/// Sink for engine diagnostics.
pub trait Reporter: Send + Sync {
    /// A violation; the test keeps running.
    fn failure(&self, message: &str);

    /// A violation that abandons the current test.
    ///
    /// Implementations may return (recording reporters do); the engine then
    /// aborts the operation that raised it.
    fn fatal(&self, message: &str);

    /// Called once when the owning [`Mocker`](crate::Mocker) is dropped,
    /// after verification.
    fn teardown(&self) {}
}

/// How bad a reported diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Failure,
    Fatal,
}

/// One reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
}

/// Default reporter for `#[test]` functions.
///
/// Failures are logged and collected; the test fails when the mocker is torn
/// down. Fatal diagnostics panic on the spot, which ends a Rust test the way
/// a fatal assertion would.
#[derive(Debug, Default)]
pub struct PanicReporter {
    failures: Mutex<Vec<String>>,
}

impl PanicReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_failures(&self) -> MutexGuard<'_, Vec<String>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> Vec<String> {
        self.lock_failures().clone()
    }
}

impl Reporter for PanicReporter {
    fn failure(&self, message: &str) {
        error!(severity = "failure", "{}", message);
        self.lock_failures().push(message.to_string());
    }

    fn fatal(&self, message: &str) {
        error!(severity = "fatal", "{}", message);
        panic!("{}", message);
    }

    fn teardown(&self) {
        let failures = std::mem::take(&mut *self.lock_failures());
        if failures.is_empty() || std::thread::panicking() {
            return;
        }
        panic!(
            "{} mock failure(s):\n  {}",
            failures.len(),
            failures.join("\n  ")
        );
    }
}
