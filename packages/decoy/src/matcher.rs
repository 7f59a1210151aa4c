//! Expected parameters: literals, nil, and matchers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::{Arg, Nil, Value};

/// Predicate over an erased argument.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A comparison strategy used in place of a literal expected argument.
#[derive(Clone)]
pub enum Matcher {
    /// Always matches; never inspects the actual value.
    Anything,
    /// Matches iff the predicate returns true.
    Matches(Predicate),
}

impl Matcher {
    /// Compare an actual argument against this matcher.
    pub fn compare(&self, actual: &Value) -> bool {
        match self {
            Matcher::Anything => true,
            Matcher::Matches(predicate) => predicate(actual),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Anything => f.write_str("anything()"),
            Matcher::Matches(_) => f.write_str("matches(..)"),
        }
    }
}

/// Wildcard matcher: accepts any value at its position, nil and zero included.
pub fn anything() -> Matcher {
    Matcher::Anything
}

/// Predicate matcher over a typed argument.
///
/// The argument is downcast to `T` before the predicate runs. A type mismatch
/// panics inside the intercepted call, which the dispatcher reports like any
/// other panic in user-supplied code.
pub fn matches<T, F>(predicate: F) -> Matcher
where
    T: Any,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Matcher::Matches(Arc::new(move |actual: &Value| match actual.downcast_ref::<T>() {
        Some(actual) => predicate(actual),
        None => panic!(
            "matcher expects {}, got {}",
            std::any::type_name::<T>(),
            actual.type_name()
        ),
    }))
}

// =============================================================================
// Expected parameters
// =============================================================================

/// One expected parameter of an [`Expectation`](crate::Expectation).
#[derive(Clone)]
pub enum Param {
    /// Exact: compared by structural equality.
    Value(Value),
    /// The actual must be the zero value of its type.
    Nil,
    /// Delegate to a matcher.
    Matcher(Matcher),
}

/// Outcome of comparing one expected parameter with one actual argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch,
    PredicateFailed,
}

impl Param {
    pub fn verdict(&self, actual: &Value) -> Verdict {
        match self {
            Param::Value(expected) if expected == actual => Verdict::Match,
            Param::Value(_) => Verdict::Mismatch,
            Param::Nil if actual.is_zero() => Verdict::Match,
            Param::Nil => Verdict::Mismatch,
            Param::Matcher(matcher @ Matcher::Matches(_)) => {
                if matcher.compare(actual) {
                    Verdict::Match
                } else {
                    Verdict::PredicateFailed
                }
            }
            Param::Matcher(Matcher::Anything) => Verdict::Match,
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(value) => fmt::Debug::fmt(value, f),
            Param::Nil => fmt::Debug::fmt(&Nil, f),
            Param::Matcher(matcher) => fmt::Debug::fmt(matcher, f),
        }
    }
}

/// Conversion into an expected parameter. Used by [`params!`](crate::params).
pub trait IntoParam {
    fn into_param(self) -> Param;
}

impl<T: Arg> IntoParam for T {
    fn into_param(self) -> Param {
        Param::Value(Value::new(self))
    }
}

impl IntoParam for Value {
    fn into_param(self) -> Param {
        Param::Value(self)
    }
}

impl IntoParam for Nil {
    fn into_param(self) -> Param {
        Param::Nil
    }
}

impl IntoParam for Matcher {
    fn into_param(self) -> Param {
        Param::Matcher(self)
    }
}

impl IntoParam for Param {
    fn into_param(self) -> Param {
        self
    }
}

/// Build a list of expected parameters from literals, [`Nil`] and matchers.
///
/// ```
/// use decoy::{anything, matches, params, Nil};
/// let expected = params![1, anything(), matches(|v: &u32| *v > 3), Nil];
/// assert_eq!(expected.len(), 4);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Param>::new()
    };
    ($($param:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoParam::into_param($param)),+]
    };
}
