//! # Decoy
//!
//! A test-double engine for plain Rust functions and methods: register the
//! calls a target should receive, the values it should return and the side
//! effects it should run, then let the engine check every intercepted call
//! and reconcile call counts when the test ends.
//!
//! ## Core Concepts
//!
//! - A **target** is a function item, a method item (`Type::method`) or a
//!   non-capturing closure. Its identity is the type of the item itself.
//! - A **mock** verifies parameters and call count. A **stub** only supplies
//!   returns and side effects, and keeps reusing its last registration.
//! - An **expectation** is one anticipated call: expected parameters,
//!   return values and side effects. `times(n)` commits one expectation for
//!   the next `n` calls; chaining several setups gives each call its own.
//! - The [`Mocker`] is the registry for one test. Dropping it verifies the
//!   session and reverts its redirections.
//!
//! ## Architecture
//!
//! ```text
//! test ── mock(f)/stub(f) ─► builder ── once/twice/times ─► Mocker (registry)
//!                                                              │ install
//!                                                              ▼
//! code under test ── intercept!(patches, f, ..) ─► PatchTable ─► dispatch
//!                                                              │
//!                     params checked ◄── expectation #n ◄──────┘
//!                     side effects run
//!                     returns synthesized
//!
//! drop(mocker) ─► verify: expected vs actual per target ─► Reporter
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Calls consume expectations in order** - the n-th call uses the n-th
//!    committed expectation
//! 2. **One open setup at a time** - starting a setup while another is
//!    unfinished is reported as an incomplete setup
//! 3. **A target keeps its mode** - mixing mock and stub on one target, or
//!    setting up a `not_called` target again, is refused
//! 4. **No lock across user code** - matchers and side effects run with the
//!    registry unlocked and may call other intercepted targets
//! 5. **Panics stay inside the call** - a panicking side effect or matcher is
//!    reported and the call returns zero values
//!
//! ## Example
//!
//! ```
//! use decoy::{anything, intercept, param_side_effect, params, values, Mocker, PatchTable};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Order {
//!     id: u64,
//!     total: u32,
//! }
//!
//! fn charge(order: Order, currency: String) -> bool {
//!     if let Some(charged) = intercept!(PatchTable::global(), charge, (order, currency) -> bool) {
//!         return charged;
//!     }
//!     unimplemented!("payment gateway")
//! }
//!
//! fn checkout(orders: &[Order]) -> usize {
//!     orders
//!         .iter()
//!         .filter(|order| charge((*order).clone(), "EUR".to_string()))
//!         .count()
//! }
//!
//! let mocker = Mocker::new(PatchTable::global().clone());
//! let first = Order { id: 1, total: 20 };
//!
//! mocker
//!     .mock(charge)
//!     .expects(params![first.clone(), "EUR".to_string()])
//!     .returns(values![true])
//!     .once();
//! mocker
//!     .mock(charge)
//!     .expects(params![anything(), anything()])
//!     .returns(values![false])
//!     .side_effects([param_side_effect(0, 1, |order: &Order| assert_eq!(order.id, 2))])
//!     .once();
//!
//! assert_eq!(checkout(&[first, Order { id: 2, total: 5 }]), 1);
//! ```
//!
//! ## Redirection
//!
//! Rust has no portable way to rewrite a function at runtime, so the target
//! cooperates: its body starts with [`intercept!`], which consults a
//! [`PatchTable`]. Any other facility can be plugged in by implementing
//! [`Redirect`].

// Core modules
mod builder;
mod dispatch;
mod error;
mod expectation;
mod matcher;
mod patch;
mod registry;
mod report;
mod side_effect;
mod target;
mod value;
mod verify;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;



// Re-export the setup API
pub use builder::{MockExpects, MockSetup, Returning, StubSetup};
pub use registry::{Mocker, MockerBuilder, MockerConfig};

// Re-export parameters, matchers and side effects
pub use matcher::{anything, matches, IntoParam, Matcher, Param, Predicate};
pub use side_effect::{general_side_effect, param_side_effect, SideEffect};

// Re-export values
pub use value::{Arg, IntoReturn, Nil, Outputs, ReturnSlot, ReturnValue, Value};

// Re-export expectations and identities
pub use expectation::{Expectation, Mode};
pub use target::{Callable, FnItemResolver, IdentityResolver, Target, TargetId};

// Re-export redirection
pub use dispatch::Call;
pub use patch::{Dispatch, PatchHandle, PatchTable, Redirect};

// Re-export reporting and error types
pub use error::MockError;
pub use report::{PanicReporter, Report, Reporter, Severity};

#[cfg(any(test, feature = "testing"))]
pub use testing::RecordingReporter;
