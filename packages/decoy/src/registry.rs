//! The registry: one [`Mocker`] per test.
//!
//! A `Mocker` owns every target entry of a test session behind a single
//! lock, the reporter diagnostics go to, the redirection facility dispatchers
//! are installed on, and the resolver that turns callables into targets.
//! Dropping it verifies the session and reverts its redirections.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::builder::{MockSetup, Session, StubSetup};
use crate::dispatch::{self, Call};
use crate::error::MockError;
use crate::expectation::{Expectation, Mode, TargetEntry};
use crate::patch::{Dispatch, PatchTable, Redirect};
use crate::report::{PanicReporter, Reporter};
use crate::target::{Callable, FnItemResolver, IdentityResolver, Target, TargetId};
use crate::verify;

/// Session behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockerConfig {
    /// Verify when the mocker is dropped.
    pub verify_on_drop: bool,
    /// Report a setup left open at teardown as an incomplete setup.
    pub report_open_setup_at_teardown: bool,
}

impl Default for MockerConfig {
    fn default() -> Self {
        Self {
            verify_on_drop: true,
            report_open_setup_at_teardown: true,
        }
    }
}

impl MockerConfig {
    /// Read overrides from `DECOY_VERIFY_ON_DROP` and `DECOY_REPORT_OPEN_SETUP`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            verify_on_drop: env_flag("DECOY_VERIFY_ON_DROP")
                .context("DECOY_VERIFY_ON_DROP must be a boolean")?
                .unwrap_or(defaults.verify_on_drop),
            report_open_setup_at_teardown: env_flag("DECOY_REPORT_OPEN_SETUP")
                .context("DECOY_REPORT_OPEN_SETUP must be a boolean")?
                .unwrap_or(defaults.report_open_setup_at_teardown),
        })
    }
}

fn env_flag(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(raw) => parse_flag(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognized flag value {:?}", other),
    }
}

// =============================================================================
// Shared state
// =============================================================================

/// The builder session currently open, if any.
#[derive(Debug)]
pub(crate) struct OpenSession {
    pub(crate) token: u64,
    pub(crate) target: Target,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) entries: HashMap<TargetId, TargetEntry>,
    pub(crate) open: Option<OpenSession>,
    next_token: u64,
}

impl RegistryState {
    fn open_session(&mut self, target: Target, mode: Mode) -> Session {
        self.next_token += 1;
        let token = self.next_token;
        self.open = Some(OpenSession {
            token,
            target: target.clone(),
        });
        Session::new(token, target, mode)
    }

    pub(crate) fn is_open(&self, token: u64) -> bool {
        self.open.as_ref().is_some_and(|open| open.token == token)
    }
}

pub(crate) struct Inner {
    state: Mutex<RegistryState>,
    reporter: Arc<dyn Reporter>,
    redirect: Arc<dyn Redirect>,
    resolver: Arc<dyn IdentityResolver>,
    config: MockerConfig,
}

impl Inner {
    /// Acquire the registry lock, recovering from poison if necessary.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("registry mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn failure(&self, err: &MockError) {
        self.reporter.failure(&err.to_string());
    }

    pub(crate) fn fatal(&self, err: &MockError) {
        self.reporter.fatal(&err.to_string());
    }

    pub(crate) fn mark_reported(&self, target: &Target) {
        if let Some(entry) = self.lock_state().entries.get_mut(&target.id()) {
            entry.reported = true;
        }
    }
}

// =============================================================================
// Mocker
// =============================================================================

/// Expectation registry for one test.
///
/// ```
/// use decoy::{params, values, Mocker, PatchTable};
///
/// fn square(x: i64) -> i64 {
///     decoy::intercept!(PatchTable::global(), square, (x) -> i64).unwrap_or(x * x)
/// }
///
/// let mocker = Mocker::new(PatchTable::global().clone());
/// mocker.mock(square).expects(params![3_i64]).returns(values![10_i64]).once();
/// mocker.mock(square).expects(params![4_i64]).returns(values![17_i64]).once();
///
/// assert_eq!(square(3), 10);
/// assert_eq!(square(4), 17);
/// assert_eq!(mocker.calls(&square), 2);
/// ```
pub struct Mocker {
    inner: Arc<Inner>,
}

impl Mocker {
    /// A mocker on `patches` that panics on failures at teardown.
    pub fn new(patches: Arc<PatchTable>) -> Self {
        Self::builder().with_redirect(patches).build()
    }

    /// A mocker on `patches` reporting to `reporter`.
    pub fn with_reporter(patches: Arc<PatchTable>, reporter: Arc<dyn Reporter>) -> Self {
        Self::builder()
            .with_redirect(patches)
            .with_reporter(reporter)
            .build()
    }

    pub fn builder() -> MockerBuilder {
        MockerBuilder::default()
    }

    pub fn config(&self) -> &MockerConfig {
        &self.inner.config
    }

    /// Start a mock setup: parameters and call count are verified.
    pub fn mock<F: 'static>(&self, target: F) -> MockSetup<'_> {
        MockSetup::new(self, self.setup(&target, Mode::Mock))
    }

    /// Start a stub setup: only returns and side effects matter, and calls
    /// past the last registration reuse it.
    pub fn stub<F: 'static>(&self, target: F) -> StubSetup<'_> {
        StubSetup::new(self, self.setup(&target, Mode::Stub))
    }

    /// Calls `target` received so far; 0 when it was never set up.
    pub fn calls<F: 'static>(&self, target: &F) -> usize {
        self.with_entry(target, |entry| entry.actual)
    }

    /// Calls registered for `target` so far; 0 when it was never set up.
    pub fn expected_calls<F: 'static>(&self, target: &F) -> usize {
        self.with_entry(target, |entry| entry.expected)
    }

    /// Reconcile the session now.
    ///
    /// Reports every count mismatch, clears all entries and reverts this
    /// mocker's redirections. Running it again on an empty session is a
    /// no-op.
    pub fn verify(&self) {
        let teardown = {
            let mut state = self.inner.lock_state();
            verify::reconcile(&mut state, self.inner.config.report_open_setup_at_teardown)
        };
        debug!(
            failures = teardown.failures.len(),
            patches = teardown.patches.len(),
            "session verified"
        );

        for handle in teardown.patches {
            self.inner.redirect.revert(handle);
        }
        for failure in &teardown.failures {
            self.inner.failure(failure);
        }
    }

    fn with_entry<F: 'static>(&self, target: &F, read: impl FnOnce(&TargetEntry) -> usize) -> usize {
        let Ok(target) = self.inner.resolver.resolve(Callable::of(target)) else {
            return 0;
        };
        self.inner
            .lock_state()
            .entries
            .get(&target.id())
            .map_or(0, read)
    }

    // =========================================================================
    // Builder plumbing
    // =========================================================================

    pub(crate) fn setup<F: 'static>(&self, callable: &F, mode: Mode) -> Option<Session> {
        let target = match self.inner.resolver.resolve(Callable::of(callable)) {
            Ok(target) => target,
            Err(err) => {
                self.inner.fatal(&err);
                return None;
            }
        };

        let opened = {
            let mut state = self.inner.lock_state();
            if let Some(stale) = state.open.take() {
                Err(MockError::IncompleteSetup {
                    name: stale.target.name().to_string(),
                })
            } else {
                match state.entries.get(&target.id()).map(|entry| entry.mode) {
                    Some(Mode::NotCalled) => Err(MockError::SealedNotCalled {
                        name: target.name().to_string(),
                    }),
                    Some(former) if former != mode => Err(MockError::ModeMismatch {
                        name: target.name().to_string(),
                        former,
                        current: mode,
                    }),
                    _ => Ok(state.open_session(target, mode)),
                }
            }
        };

        match opened {
            Ok(session) => {
                debug!(function = %session.target(), %mode, "setup opened");
                Some(session)
            }
            Err(err) => {
                self.inner.fatal(&err);
                None
            }
        }
    }

    pub(crate) fn is_open(&self, session: &Session) -> bool {
        self.inner.lock_state().is_open(session.token())
    }

    pub(crate) fn report_no_open_expectation(&self, operation: &'static str) {
        self.inner
            .fatal(&MockError::NoOpenExpectation { operation });
    }

    /// Commit `expectation` for the next `times` calls and install the
    /// dispatcher. Closes the session either way.
    pub(crate) fn commit(&self, session: Session, expectation: Expectation, times: usize, operation: &'static str) {
        let committed = {
            let mut state = self.inner.lock_state();
            if !state.is_open(session.token()) {
                Err(MockError::NoOpenExpectation { operation })
            } else {
                state.open = None;
                if times == 0 {
                    Err(MockError::ZeroTimes {
                        name: session.target().name().to_string(),
                    })
                } else {
                    self.admit(&mut state, &session).map(|entry| {
                        entry.append(expectation, times);
                        entry.expected
                    })
                }
            }
        };

        match committed {
            Ok(expected) => debug!(function = %session.target(), times, expected, "expectation committed"),
            Err(err) => self.inner.fatal(&err),
        }
    }

    /// Seal the session's target so that any call is a violation.
    pub(crate) fn seal_not_called(&self, session: Session) {
        let sealed = {
            let mut state = self.inner.lock_state();
            if state.is_open(session.token()) {
                state.open = None;
                self.admit(&mut state, &session).map(TargetEntry::seal_not_called)
            } else {
                Err(MockError::NoOpenExpectation {
                    operation: "not_called",
                })
            }
        };

        match sealed {
            Ok(()) => debug!(function = %session.target(), "sealed as not called"),
            Err(err) => self.inner.fatal(&err),
        }
    }

    /// The session target's entry, created and redirected on first commit.
    ///
    /// A target already redirected by another session is refused and no
    /// entry is created for it.
    fn admit<'s>(&self, state: &'s mut RegistryState, session: &Session) -> Result<&'s mut TargetEntry, MockError> {
        let target = session.target();
        match state.entries.entry(target.id()) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let handle = self
                    .inner
                    .redirect
                    .install(target, self.dispatcher(target.clone()))
                    .ok_or_else(|| MockError::AlreadyRedirected {
                        name: target.name().to_string(),
                    })?;
                let mut entry = TargetEntry::new(target.clone(), session.mode());
                entry.patch = Some(handle);
                Ok(vacant.insert(entry))
            }
        }
    }

    fn dispatcher(&self, target: Target) -> Dispatch {
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |call: &Call| match registry.upgrade() {
            Some(inner) => dispatch::dispatch(&inner, &target, call),
            None => Err(MockError::NeverSetup {
                name: target.name().to_string(),
            }),
        })
    }
}

impl Drop for Mocker {
    fn drop(&mut self) {
        if self.inner.config.verify_on_drop {
            self.verify();
        }
        self.inner.reporter.teardown();
    }
}

impl std::fmt::Debug for Mocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Mocker")
            .field("entries", &state.entries.len())
            .field("open", &state.open.as_ref().map(|open| open.target.name()))
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`Mocker`] with custom collaborators.
///
/// Defaults: [`PanicReporter`], the process-wide [`PatchTable`],
/// [`FnItemResolver`] and [`MockerConfig::default`].
#[derive(Default)]
pub struct MockerBuilder {
    reporter: Option<Arc<dyn Reporter>>,
    redirect: Option<Arc<dyn Redirect>>,
    resolver: Option<Arc<dyn IdentityResolver>>,
    config: MockerConfig,
}

impl MockerBuilder {
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_redirect(mut self, redirect: Arc<dyn Redirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_config(mut self, config: MockerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Mocker {
        let redirect: Arc<dyn Redirect> = match self.redirect {
            Some(redirect) => redirect,
            None => PatchTable::global().clone(),
        };
        Mocker {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState::default()),
                reporter: self
                    .reporter
                    .unwrap_or_else(|| Arc::new(PanicReporter::new())),
                redirect,
                resolver: self.resolver.unwrap_or_else(|| Arc::new(FnItemResolver)),
                config: self.config,
            }),
        }
    }
}
