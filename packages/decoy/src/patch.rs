//! Call redirection.
//!
//! Rust cannot rewrite a compiled function's entry point at runtime, so
//! redirection is cooperative: the function being doubled consults a
//! [`PatchTable`] at its top (usually through [`intercept!`](crate::intercept))
//! and returns the dispatcher's values when a patch is installed.
//!
//! ```
//! use decoy::{intercept, params, values, Mocker, PatchTable};
//!
//! fn exchange_rate(from: String, to: String) -> f64 {
//!     if let Some(rate) = intercept!(PatchTable::global(), exchange_rate, (from, to) -> f64) {
//!         return rate;
//!     }
//!     unimplemented!("remote lookup")
//! }
//!
//! let mocker = Mocker::new(PatchTable::global().clone());
//! mocker
//!     .mock(exchange_rate)
//!     .expects(params!["EUR".to_string(), "USD".to_string()])
//!     .returns(values![1.25_f64])
//!     .once();
//!
//! assert_eq!(exchange_rate("EUR".into(), "USD".into()), 1.25);
//! ```

use std::sync::{Arc, LazyLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::Call;
use crate::error::MockError;
use crate::target::{Target, TargetId};
use crate::value::{Outputs, Value};

/// The function a redirected call is handed to.
pub type Dispatch = Arc<dyn Fn(&Call) -> Result<Vec<Value>, MockError> + Send + Sync>;

/// Identifies one installed redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchHandle {
    id: Uuid,
    target: TargetId,
}

impl PatchHandle {
    pub fn target(&self) -> TargetId {
        self.target
    }
}

/// A facility that can send a target's calls to a dispatcher.
pub trait Redirect: Send + Sync {
    /// Route every future call of `target` to `dispatch`.
    ///
    /// Returns `None` when `target` is already redirected; the existing
    /// dispatcher stays in place and only its owner may revert it.
    fn install(&self, target: &Target, dispatch: Dispatch) -> Option<PatchHandle>;

    /// Restore one target. Stale handles are ignored.
    fn revert(&self, handle: PatchHandle);

    /// Restore every target.
    fn revert_all(&self);
}

struct Patch {
    handle: PatchHandle,
    name: String,
    dispatch: Dispatch,
}

static GLOBAL: LazyLock<Arc<PatchTable>> = LazyLock::new(|| Arc::new(PatchTable::new()));

/// In-process redirection table keyed by target identity.
#[derive(Default)]
pub struct PatchTable {
    patches: DashMap<TargetId, Patch>,
}

impl PatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table.
    pub fn global() -> &'static Arc<PatchTable> {
        &GLOBAL
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn is_patched<F: 'static>(&self, callable: &F) -> bool {
        self.patches.contains_key(&TargetId::of(callable))
    }

    /// Hand `call` to the dispatcher installed for `callable`.
    ///
    /// `None` means the callable is not redirected and its real body should
    /// run.
    pub fn redirect<F: 'static>(
        &self,
        callable: &F,
        call: &Call,
    ) -> Option<Result<Vec<Value>, MockError>> {
        // Release the shard lock before dispatching; side effects may call
        // other redirected functions or install new patches.
        let dispatch = self
            .patches
            .get(&TargetId::of(callable))
            .map(|patch| Arc::clone(&patch.dispatch))?;
        Some(dispatch(call))
    }

    /// Typed form of [`redirect`](Self::redirect).
    ///
    /// Builds the call's return slots from `R`. A dispatcher error (already
    /// reported by the engine) or an unusable result yields `R::default()`.
    pub fn call<F: 'static, R: Outputs>(
        &self,
        callable: &F,
        args: Vec<Value>,
        variadic: Option<Vec<Value>>,
    ) -> Option<R> {
        let mut call = Call::new(args).returning_outputs::<R>();
        if let Some(tail) = variadic {
            call = call.with_variadic(tail);
        }

        let outputs = match self.redirect(callable, &call)? {
            Ok(values) => R::from_values(values).unwrap_or_else(|| {
                warn!(
                    function = std::any::type_name::<F>(),
                    "dispatcher returned values that do not fit the declared returns"
                );
                R::default()
            }),
            Err(err) => {
                debug!(error = %err, "dispatch aborted, returning zero values");
                R::default()
            }
        };
        Some(outputs)
    }
}

impl Redirect for PatchTable {
    fn install(&self, target: &Target, dispatch: Dispatch) -> Option<PatchHandle> {
        match self.patches.entry(target.id()) {
            Entry::Occupied(_) => {
                debug!(function = %target, "target already patched, refusing install");
                None
            }
            Entry::Vacant(vacant) => {
                debug!(function = %target, "installing patch");
                let handle = PatchHandle {
                    id: Uuid::new_v4(),
                    target: target.id(),
                };
                vacant.insert(Patch {
                    handle,
                    name: target.name().to_string(),
                    dispatch,
                });
                Some(handle)
            }
        }
    }

    fn revert(&self, handle: PatchHandle) {
        if let Some((_, patch)) = self
            .patches
            .remove_if(&handle.target, |_, patch| patch.handle == handle)
        {
            debug!(function = %patch.name, "reverted patch");
        }
    }

    fn revert_all(&self) {
        debug!(patches = self.patches.len(), "reverting all patches");
        self.patches.clear();
    }
}

impl std::fmt::Debug for PatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .patches
            .iter()
            .map(|patch| patch.name.clone())
            .collect();
        f.debug_struct("PatchTable")
            .field("patches", &names)
            .finish()
    }
}

/// Route a call through a [`PatchTable`].
///
/// Evaluates to `Some(returns)` when the function is redirected and `None`
/// when its real body should run. Every argument is cloned into a
/// [`Value`](crate::Value), so argument types must be owned
/// [`Arg`](crate::Arg) types.
///
/// ```ignore
/// // fixed arguments, one return value
/// intercept!(patches, billing::charge, (account, amount) -> Receipt)
/// // variadic tail (any slice or Vec), two return values
/// intercept!(patches, log::write, (level; parts) -> (usize, bool))
/// // no return value; a method passes its receiver explicitly
/// intercept!(patches, Cache::evict, (self.clone(), key))
/// ```
#[macro_export]
macro_rules! intercept {
    (@args $($arg:expr),*) => {
        ::std::vec![$($crate::Value::new(::std::clone::Clone::clone(&$arg))),*]
    };
    (@tail $tail:expr) => {
        ::std::option::Option::Some(
            ($tail)
                .iter()
                .cloned()
                .map($crate::Value::new)
                .collect::<::std::vec::Vec<_>>(),
        )
    };

    // several return values
    ($patches:expr, $target:path, ($($arg:expr),* $(,)?) -> ($first:ty, $($rest:ty),+ $(,)?)) => {
        ($patches).call::<_, ($first, $($rest),+)>(
            &$target,
            $crate::intercept!(@args $($arg),*),
            ::std::option::Option::None,
        )
    };
    ($patches:expr, $target:path, ($($arg:expr),* ; $tail:expr) -> ($first:ty, $($rest:ty),+ $(,)?)) => {
        ($patches).call::<_, ($first, $($rest),+)>(
            &$target,
            $crate::intercept!(@args $($arg),*),
            $crate::intercept!(@tail $tail),
        )
    };

    // one return value
    ($patches:expr, $target:path, ($($arg:expr),* $(,)?) -> $ret:ty) => {
        ($patches)
            .call::<_, ($ret,)>(
                &$target,
                $crate::intercept!(@args $($arg),*),
                ::std::option::Option::None,
            )
            .map(|(value,)| value)
    };
    ($patches:expr, $target:path, ($($arg:expr),* ; $tail:expr) -> $ret:ty) => {
        ($patches)
            .call::<_, ($ret,)>(
                &$target,
                $crate::intercept!(@args $($arg),*),
                $crate::intercept!(@tail $tail),
            )
            .map(|(value,)| value)
    };

    // no return value
    ($patches:expr, $target:path, ($($arg:expr),* $(,)?)) => {
        ($patches).call::<_, ()>(
            &$target,
            $crate::intercept!(@args $($arg),*),
            ::std::option::Option::None,
        )
    };
    ($patches:expr, $target:path, ($($arg:expr),* ; $tail:expr)) => {
        ($patches).call::<_, ()>(
            &$target,
            $crate::intercept!(@args $($arg),*),
            $crate::intercept!(@tail $tail),
        )
    };
}
