//! Callbacks fired while an intercepted call is dispatched.
//!
//! Side effects are arbitrary test code: assertions on arguments, counters,
//! or state mutation the real target would have performed. They run without
//! the registry lock held, so they may call other intercepted targets.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A callback attached to an expectation.
///
/// Call and parameter indices are 1-based. A call index of 0 means "every call".
#[derive(Clone)]
pub enum SideEffect {
    /// Fires once for the whole call.
    General {
        call: usize,
        effect: Arc<dyn Fn() + Send + Sync>,
    },
    /// Fires with the argument at position `param`.
    Param {
        call: usize,
        param: usize,
        effect: Arc<dyn Fn(&Value) + Send + Sync>,
    },
}

impl SideEffect {
    /// True when this side effect is gated to fire on call number `call`.
    pub fn applies_to(&self, call: usize) -> bool {
        let gate = match self {
            SideEffect::General { call, .. } | SideEffect::Param { call, .. } => *call,
        };
        gate == 0 || gate == call
    }

    /// Run the side effect for call number `call` with the flattened
    /// argument list (fixed arguments, then each variadic element).
    pub fn execute(&self, call: usize, args: &[&Value]) {
        if !self.applies_to(call) {
            return;
        }
        match self {
            SideEffect::General { effect, .. } => effect(),
            SideEffect::Param { param, effect, .. } => {
                if let Some(value) = param.checked_sub(1).and_then(|index| args.get(index).copied()) {
                    effect(value);
                }
            }
        }
    }
}

impl fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::General { call, .. } => {
                f.debug_struct("General").field("call", call).finish_non_exhaustive()
            }
            SideEffect::Param { call, param, .. } => f
                .debug_struct("Param")
                .field("call", call)
                .field("param", param)
                .finish_non_exhaustive(),
        }
    }
}

/// A side effect that fires for the whole call.
///
/// `call` 0 fires on every call, otherwise only on that (1-based) call.
pub fn general_side_effect<F>(call: usize, effect: F) -> SideEffect
where
    F: Fn() + Send + Sync + 'static,
{
    SideEffect::General {
        call,
        effect: Arc::new(effect),
    }
}

/// A side effect that receives the argument at (1-based) position `param`.
///
/// The argument is downcast to `T`; a mismatch panics inside the call and is
/// reported by the dispatcher.
pub fn param_side_effect<T, F>(call: usize, param: usize, effect: F) -> SideEffect
where
    T: Any,
    F: Fn(&T) + Send + Sync + 'static,
{
    SideEffect::Param {
        call,
        param,
        effect: Arc::new(move |value: &Value| match value.downcast_ref::<T>() {
            Some(value) => effect(value),
            None => panic!(
                "side effect for parameter #{} expects {}, got {}",
                param,
                std::any::type_name::<T>(),
                value.type_name()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    fn flag() -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (flag.clone(), flag)
    }

    #[test]
    fn test_general_skips_when_call_index_does_not_match() {
        let (executed, seen) = flag();
        let effect = general_side_effect(1, move || seen.store(true, Ordering::SeqCst));

        effect.execute(2, &[&Value::new(fastrand::i32(..))]);

        assert!(!executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_general_fires_when_call_index_matches() {
        let (executed, seen) = flag();
        let effect = general_side_effect(1, move || seen.store(true, Ordering::SeqCst));

        effect.execute(1, &[]);

        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_general_with_zero_fires_on_every_call() {
        let effect = general_side_effect(0, || {});
        assert!(effect.applies_to(1));
        assert!(effect.applies_to(17));
    }

    #[test]
    fn test_param_skips_when_call_index_does_not_match() {
        let (executed, seen) = flag();
        let effect = param_side_effect(1, 1, move |_: &i32| seen.store(true, Ordering::SeqCst));

        effect.execute(3, &[&Value::new(fastrand::i32(..))]);

        assert!(!executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_param_skips_when_position_is_absent() {
        let (executed, seen) = flag();
        let effect = param_side_effect(1, 2, move |_: &i32| seen.store(true, Ordering::SeqCst));

        effect.execute(1, &[&Value::new(fastrand::i32(..))]);

        assert!(!executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_param_receives_argument_at_position() {
        let received = Arc::new(AtomicI32::new(0));
        let sink = received.clone();
        let dummy_first = fastrand::i32(1..100);
        let dummy_second = fastrand::i32(100..200);
        let effect = param_side_effect(0, 2, move |value: &i32| sink.store(*value, Ordering::SeqCst));

        effect.execute(5, &[&Value::new(dummy_first), &Value::new(dummy_second)]);

        assert_eq!(received.load(Ordering::SeqCst), dummy_second);
    }

    #[test]
    fn test_param_index_zero_never_fires() {
        let (executed, seen) = flag();
        let effect = param_side_effect(0, 0, move |_: &i32| seen.store(true, Ordering::SeqCst));

        effect.execute(1, &[&Value::new(1_i32)]);

        assert!(!executed.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "side effect for parameter #1 expects")]
    fn test_param_type_mismatch_panics() {
        let effect = param_side_effect(0, 1, |_: &String| {});
        effect.execute(1, &[&Value::new(1_u8)]);
    }
}
