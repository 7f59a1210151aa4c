//! Handling of redirected calls.
//!
//! A redirected call is counted against its target entry under the registry
//! lock, then everything that runs user code (matchers and side effects)
//! happens after the lock is released, inside a panic boundary. Return values
//! are synthesized last, against the return slots the call declared.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace};

use crate::error::MockError;
use crate::expectation::{Expectation, Mode, Selection, TargetEntry};
use crate::matcher::{Param, Verdict};
use crate::registry::Inner;
use crate::target::Target;
use crate::value::{Outputs, ReturnSlot, ReturnValue, Value};

/// One intercepted invocation: actual arguments plus the declared return shape.
#[derive(Debug, Clone, Default)]
pub struct Call {
    args: Vec<Value>,
    variadic: Option<Vec<Value>>,
    returns: Vec<ReturnSlot>,
}

impl Call {
    /// A call with fixed arguments only and no declared returns.
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Mark the call as variadic, with `tail` as the elements of its
    /// trailing repeated argument.
    pub fn with_variadic(mut self, tail: Vec<Value>) -> Self {
        self.variadic = Some(tail);
        self
    }

    pub fn returning(mut self, slots: Vec<ReturnSlot>) -> Self {
        self.returns = slots;
        self
    }

    /// Declare the return slots of a typed return shape.
    pub fn returning_outputs<R: Outputs>(self) -> Self {
        self.returning(R::slots())
    }

    /// Fixed (non-variadic) arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn variadic(&self) -> Option<&[Value]> {
        self.variadic.as_deref()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    pub fn returns(&self) -> &[ReturnSlot] {
        &self.returns
    }

    /// Fixed arguments followed by each variadic element.
    pub fn flattened(&self) -> Vec<&Value> {
        self.args
            .iter()
            .chain(self.variadic.iter().flatten())
            .collect()
    }

    /// The zero value of every declared return slot.
    pub fn zero_values(&self) -> Vec<Value> {
        self.returns.iter().map(ReturnSlot::zero).collect()
    }
}

/// Run one redirected call against the registry.
///
/// `Err` means the call was aborted after a fatal report and no return
/// values could be produced.
pub(crate) fn dispatch(inner: &Inner, target: &Target, call: &Call) -> Result<Vec<Value>, MockError> {
    let name = target.name();
    let selection = {
        let mut state = inner.lock_state();
        state
            .entries
            .get_mut(&target.id())
            .map(TargetEntry::next_call)
    };

    let (number, mode, expectation) = match selection {
        None => {
            let err = MockError::NeverSetup {
                name: name.to_string(),
            };
            inner.fatal(&err);
            return Err(err);
        }
        Some(Selection::Overflow { expected, actual }) => {
            inner.failure(&MockError::CallCount {
                name: name.to_string(),
                expected,
                actual,
            });
            return Ok(call.zero_values());
        }
        Some(Selection::Matched {
            call: number,
            mode,
            expectation,
            clamped,
        }) => {
            if clamped {
                debug!(function = %name, call = number, "stub ran past its registrations, reusing the last one");
            }
            (number, mode, expectation)
        }
    };

    trace!(function = %name, call = number, args = ?call.flattened(), "dispatching call");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if mode == Mode::Mock {
            verify_params(name, number, expectation.params(), call, &mut |err| {
                if err.is_call_shape() {
                    inner.mark_reported(target);
                }
                inner.failure(&err);
            });
        }

        let args = call.flattened();
        for effect in expectation.side_effects() {
            effect.execute(number, &args);
        }
    }));

    if let Err(payload) = outcome {
        inner.failure(&MockError::Panicked {
            name: name.to_string(),
            message: extract_panic_message(payload.as_ref()),
        });
        return Ok(call.zero_values());
    }

    synthesize_returns(inner, target, number, mode, &expectation, call)
}

/// Compare a call's arguments against the expected parameters, handing
/// each error to `report` as soon as it is found.
///
/// Count mismatches are reported once without element comparison; value
/// mismatches accumulate, one per position. A matcher that panics stops the
/// comparison, but every error found before it has been reported already.
pub(crate) fn verify_params(
    name: &str,
    call: usize,
    expected: &[Param],
    actual: &Call,
    report: &mut impl FnMut(MockError),
) {
    let fixed = actual.args();

    let Some(tail) = actual.variadic() else {
        if expected.len() != fixed.len() {
            report(MockError::ParamCount {
                name: name.to_string(),
                call,
                expected: expected.len(),
                actual: fixed.len(),
            });
        } else {
            compare_positions(name, call, 1, expected, fixed, report);
        }
        return;
    };

    if expected.len() < fixed.len() {
        report(MockError::ParamCount {
            name: name.to_string(),
            call,
            expected: expected.len(),
            actual: fixed.len() + tail.len(),
        });
        return;
    }

    let (head, rest) = expected.split_at(fixed.len());
    compare_positions(name, call, 1, head, fixed, report);

    if rest.len() != tail.len() {
        report(MockError::VariadicCount {
            name: name.to_string(),
            call,
            expected: rest.len(),
            actual: tail.len(),
        });
    } else {
        compare_positions(name, call, fixed.len() + 1, rest, tail, report);
    }
}

fn compare_positions(
    name: &str,
    call: usize,
    first_position: usize,
    expected: &[Param],
    actual: &[Value],
    report: &mut impl FnMut(MockError),
) {
    for (offset, (expected, actual)) in expected.iter().zip(actual).enumerate() {
        let position = first_position + offset;
        match expected.verdict(actual) {
            Verdict::Match => {}
            Verdict::Mismatch => report(MockError::ParamMismatch {
                name: name.to_string(),
                call,
                position,
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            }),
            Verdict::PredicateFailed => report(MockError::PredicateFailed {
                name: name.to_string(),
                call,
                position,
                actual: format!("{:?}", actual),
            }),
        }
    }
}

fn synthesize_returns(
    inner: &Inner,
    target: &Target,
    call: usize,
    mode: Mode,
    expectation: &Expectation,
    actual: &Call,
) -> Result<Vec<Value>, MockError> {
    let slots = actual.returns();
    let registered = expectation.returns();

    if registered.len() != slots.len() {
        let err = MockError::ReturnCount {
            name: target.name().to_string(),
            call,
            expected: slots.len(),
            actual: registered.len(),
        };
        if mode == Mode::Mock {
            inner.mark_reported(target);
            inner.fatal(&err);
            return Err(err);
        }
        inner.failure(&err);
        return Ok(actual.zero_values());
    }

    let values = slots
        .iter()
        .zip(registered)
        .enumerate()
        .map(|(index, (slot, value))| fill_slot(inner, target, call, index + 1, slot, value))
        .collect();
    Ok(values)
}

fn fill_slot(
    inner: &Inner,
    target: &Target,
    call: usize,
    position: usize,
    slot: &ReturnSlot,
    value: &ReturnValue,
) -> Value {
    match value {
        None => slot.zero(),
        Some(value) if slot.accepts(value) => value.clone(),
        Some(value) => {
            inner.failure(&MockError::ReturnType {
                name: target.name().to_string(),
                call,
                position,
                expected: slot.type_name(),
                actual: value.type_name(),
            });
            slot.zero()
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn extract_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<anyhow::Error>() {
        err.to_string()
    } else if let Some(err) = payload.downcast_ref::<MockError>() {
        err.to_string()
    } else {
        "unknown panic".to_string()
    }
}
