//! Structured error types for decoy.
//!
//! `MockError` is the full diagnostic taxonomy of the engine. Every variant's
//! `Display` text is the exact message handed to the [`Reporter`], so tests
//! can pattern-match on the variant while humans read the message.
//!
//! # Classes
//!
//! | Class | Variants | Reported as |
//! |-------|----------|-------------|
//! | Setup | `Unresolvable`, `AlreadyRedirected` | fatal |
//! | Usage | `IncompleteSetup`, `ModeMismatch`, `SealedNotCalled`, `NoOpenExpectation`, `ZeroTimes` | fatal |
//! | Unregistered call | `NeverSetup` | fatal |
//! | Call count | `CallCount` | failure |
//! | Call shape | `ParamCount`, `VariadicCount`, `ReturnCount`, `ReturnType` | failure (`ReturnCount` is fatal for mocks) |
//! | Value mismatch | `ParamMismatch`, `PredicateFailed` | failure |
//! | User code | `Panicked` | failure |
//!
//! [`Reporter`]: crate::Reporter

use thiserror::Error;

use crate::expectation::Mode;

/// Every diagnostic the engine can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    // =========================================================================
    // Setup
    // =========================================================================
    /// The callable has no stable identity (fn pointer, capturing closure).
    #[error("Cannot resolve a stable identity for [{name}]: {reason}")]
    Unresolvable { name: String, reason: String },

    /// The target is already redirected by another live session on the
    /// same redirection facility.
    #[error(
        "Function or method [{name}] is already redirected by another session. \
         A target can be set up by one Mocker at a time."
    )]
    AlreadyRedirected { name: String },

    // =========================================================================
    // Usage
    // =========================================================================
    /// A builder session was opened and never finalized.
    #[error(
        "A former setup for function or method [{name}] was incomplete. \
         Did you miss calling once/twice/times in the end?"
    )]
    IncompleteSetup { name: String },

    /// The same target was set up both as a mock and as a stub.
    #[error(
        "A former setup for function or method [{name}] was a {former} but current setup is a {current}. \
         Mixing Stub and Mock for the same function or method is not supported."
    )]
    ModeMismatch {
        name: String,
        former: Mode,
        current: Mode,
    },

    /// The target was sealed with `not_called`.
    #[error(
        "A former setup for function or method [{name}] was to be not called, \
         therefore no more Mock or Stub can be setup for it now."
    )]
    SealedNotCalled { name: String },

    /// A continuation was called on a builder whose session is closed.
    #[error("Unexpected call to {operation} without setting up an anticipated function or method")]
    NoOpenExpectation { operation: &'static str },

    /// `times(0)` was requested.
    #[error(
        "Function or method [{name}] cannot be mocked for zero times using times. \
         Try using not_called instead."
    )]
    ZeroTimes { name: String },

    // =========================================================================
    // Dispatch
    // =========================================================================
    /// A redirected call reached the engine for a target it does not know.
    #[error("The underlying function or method {name} was never setup")]
    NeverSetup { name: String },

    /// Expected and actual call counts differ.
    #[error("[{name}] Unexpected number of calls: expect {expected}, actual {actual}")]
    CallCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The call carried a different number of arguments than expected.
    #[error("[{name}] Invalid number of parameters at call #{call}: expect {expected}, actual {actual}")]
    ParamCount {
        name: String,
        call: usize,
        expected: usize,
        actual: usize,
    },

    /// The variadic tail carried a different number of elements than expected.
    #[error(
        "[{name}] Invalid number of variadic parameters at call #{call}: expect {expected}, actual {actual}"
    )]
    VariadicCount {
        name: String,
        call: usize,
        expected: usize,
        actual: usize,
    },

    /// The registered returns do not match the declared return arity.
    #[error("[{name}] Invalid number of returns at call #{call}: expect {expected}, actual {actual}")]
    ReturnCount {
        name: String,
        call: usize,
        expected: usize,
        actual: usize,
    },

    /// A registered return value has a different type than the declared slot.
    #[error(
        "[{name}] Invalid type of return #{position} at call #{call}: expect {expected}, actual {actual}"
    )]
    ReturnType {
        name: String,
        call: usize,
        position: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// A literal (or nil) expectation did not equal the actual argument.
    #[error(
        "[{name}] Parameter mismatch at call #{call} parameter #{position}: expect {expected}, actual {actual}"
    )]
    ParamMismatch {
        name: String,
        call: usize,
        position: usize,
        expected: String,
        actual: String,
    },

    /// A predicate matcher returned false.
    #[error("[{name}] Parameter mismatch at call #{call} parameter #{position}: predicate failed on actual {actual}")]
    PredicateFailed {
        name: String,
        call: usize,
        position: usize,
        actual: String,
    },

    /// A side effect or matcher panicked during dispatch.
    #[error("[{name}] Mocker panicking recovered: {message}")]
    Panicked { name: String, message: String },
}

impl MockError {
    /// Returns true for errors about the shape of a call rather than its values.
    pub fn is_call_shape(&self) -> bool {
        matches!(
            self,
            MockError::ParamCount { .. }
                | MockError::VariadicCount { .. }
                | MockError::ReturnCount { .. }
                | MockError::ReturnType { .. }
        )
    }

    /// Returns true for misuse of the fluent setup API.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            MockError::IncompleteSetup { .. }
                | MockError::ModeMismatch { .. }
                | MockError::SealedNotCalled { .. }
                | MockError::NoOpenExpectation { .. }
                | MockError::ZeroTimes { .. }
        )
    }
}
