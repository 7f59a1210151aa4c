//! Expectations and per-target bookkeeping.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::matcher::Param;
use crate::patch::PatchHandle;
use crate::side_effect::SideEffect;
use crate::target::Target;
use crate::value::ReturnValue;

/// How a target's calls are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Parameters and call count are verified.
    Mock,
    /// Only returns and side effects; extra calls reuse the last expectation.
    Stub,
    /// Any call at all is a violation.
    NotCalled,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Mock => "Mock",
            Mode::Stub => "Stub",
            Mode::NotCalled => "NotCalled",
        })
    }
}

/// One anticipated invocation.
///
/// Built by the fluent setup API and frozen once committed; the registry
/// shares it by `Arc` between every call slot it was committed for.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    params: SmallVec<[Param; 4]>,
    returns: SmallVec<[ReturnValue; 2]>,
    side_effects: Vec<SideEffect>,
}

impl Expectation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expected parameters; empty means "no parameters expected".
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> &[ReturnValue] {
        &self.returns
    }

    pub fn side_effects(&self) -> &[SideEffect] {
        &self.side_effects
    }

    pub(crate) fn set_params(&mut self, params: impl IntoIterator<Item = Param>) {
        self.params = params.into_iter().collect();
    }

    pub(crate) fn set_returns(&mut self, returns: impl IntoIterator<Item = ReturnValue>) {
        self.returns = returns.into_iter().collect();
    }

    pub(crate) fn add_side_effects(&mut self, effects: impl IntoIterator<Item = SideEffect>) {
        self.side_effects.extend(effects);
    }
}

/// What the dispatcher should do with the call that was just counted.
#[derive(Debug)]
pub(crate) enum Selection {
    /// More calls than anticipated; already marked as reported.
    Overflow { expected: usize, actual: usize },
    Matched {
        call: usize,
        mode: Mode,
        expectation: Arc<Expectation>,
        /// A stub ran past its registrations and reuses the last one.
        clamped: bool,
    },
}

/// Accumulated state for one target during a session.
#[derive(Debug)]
pub(crate) struct TargetEntry {
    pub(crate) target: Target,
    pub(crate) mode: Mode,
    pub(crate) expected: usize,
    pub(crate) actual: usize,
    pub(crate) expectations: Vec<Arc<Expectation>>,
    pub(crate) reported: bool,
    pub(crate) patch: Option<PatchHandle>,
}

impl TargetEntry {
    pub(crate) fn new(target: Target, mode: Mode) -> Self {
        Self {
            target,
            mode,
            expected: 0,
            actual: 0,
            expectations: Vec::new(),
            reported: false,
            patch: None,
        }
    }

    /// Commit `expectation` for the next `times` calls.
    pub(crate) fn append(&mut self, expectation: Expectation, times: usize) {
        let expectation = Arc::new(expectation);
        self.expectations
            .extend(std::iter::repeat(expectation).take(times));
        self.expected += times;
    }

    /// Seal the entry: any call is an overflow, later setups are refused.
    pub(crate) fn seal_not_called(&mut self) {
        self.mode = Mode::NotCalled;
        self.expected = 0;
        self.expectations = vec![Arc::new(Expectation::default())];
    }

    /// Count one call and pick the expectation that governs it.
    pub(crate) fn next_call(&mut self) -> Selection {
        self.actual += 1;
        let call = self.actual;

        if call <= self.expected {
            if let Some(expectation) = self.expectations.get(call - 1) {
                return Selection::Matched {
                    call,
                    mode: self.mode,
                    expectation: Arc::clone(expectation),
                    clamped: false,
                };
            }
        }

        match (self.mode, self.expectations.last()) {
            (Mode::Stub, Some(last)) => Selection::Matched {
                call,
                mode: Mode::Stub,
                expectation: Arc::clone(last),
                clamped: true,
            },
            _ => {
                self.reported = true;
                Selection::Overflow {
                    expected: self.expected,
                    actual: call,
                }
            }
        }
    }

    /// True when teardown should report a count mismatch for this entry.
    pub(crate) fn has_count_violation(&self) -> bool {
        !self.reported && self.mode != Mode::Stub && self.expected != self.actual
    }
}
