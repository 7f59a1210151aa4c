//! Fluent setup of expectations.
//!
//! Each state of a setup is its own type, so only the next legal step can be
//! called:
//!
//! ```text
//! mock(f) ─ expects(..) ─ returns(..) ─┬─ side_effects(..)* ─ once | twice | times(n)
//!        └─ not_called()               │
//! stub(f) ─────────────── returns(..) ─┘
//! ```
//!
//! A setup holds a session token from the registry. The registry allows one
//! open session at a time; a setup whose session was closed by someone else
//! (a newer setup, or verification) reports "no open expectation" on its
//! next step. A setup that was refused at its start stays inert, the refusal
//! having been reported already.

use crate::expectation::{Expectation, Mode};
use crate::matcher::Param;
use crate::registry::Mocker;
use crate::side_effect::SideEffect;
use crate::target::Target;
use crate::value::ReturnValue;

/// A registry session handed to one setup.
#[derive(Debug)]
pub(crate) struct Session {
    token: u64,
    target: Target,
    mode: Mode,
}

impl Session {
    pub(crate) fn new(token: u64, target: Target, mode: Mode) -> Self {
        Self { token, target, mode }
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }
}

#[derive(Debug)]
enum Link {
    Open(Session),
    Aborted,
}

#[derive(Debug)]
struct Draft<'m> {
    mocker: &'m Mocker,
    link: Link,
    expectation: Expectation,
}

impl<'m> Draft<'m> {
    fn new(mocker: &'m Mocker, session: Option<Session>) -> Self {
        Self {
            mocker,
            link: session.map_or(Link::Aborted, Link::Open),
            expectation: Expectation::new(),
        }
    }

    /// Detach if the session was closed behind this setup's back.
    fn step(mut self, operation: &'static str) -> Self {
        if let Link::Open(session) = &self.link {
            if !self.mocker.is_open(session) {
                self.mocker.report_no_open_expectation(operation);
                self.link = Link::Aborted;
            }
        }
        self
    }

    fn is_open(&self) -> bool {
        matches!(self.link, Link::Open(_))
    }

    fn params(self, params: impl IntoIterator<Item = Param>) -> Self {
        let mut draft = self.step("expects");
        if draft.is_open() {
            draft.expectation.set_params(params);
        }
        draft
    }

    fn returns(self, values: impl IntoIterator<Item = ReturnValue>) -> Self {
        let mut draft = self.step("returns");
        if draft.is_open() {
            draft.expectation.set_returns(values);
        }
        draft
    }

    fn side_effects(self, effects: impl IntoIterator<Item = SideEffect>) -> Self {
        let mut draft = self.step("side_effects");
        if draft.is_open() {
            draft.expectation.add_side_effects(effects);
        }
        draft
    }

    fn commit(self, times: usize) {
        if let Link::Open(session) = self.link {
            self.mocker.commit(session, self.expectation, times, "times");
        }
    }

    fn seal(self) {
        if let Link::Open(session) = self.link {
            self.mocker.seal_not_called(session);
        }
    }
}

/// A mock setup right after [`Mocker::mock`].
#[derive(Debug)]
#[must_use = "a setup registers nothing until once, twice, times or not_called is called"]
pub struct MockSetup<'m>(Draft<'m>);

impl<'m> MockSetup<'m> {
    pub(crate) fn new(mocker: &'m Mocker, session: Option<Session>) -> Self {
        Self(Draft::new(mocker, session))
    }

    /// Expected parameters, in order: literals, [`Nil`](crate::Nil) or
    /// matchers. See [`params!`](crate::params).
    pub fn expects(self, params: impl IntoIterator<Item = Param>) -> MockExpects<'m> {
        MockExpects(self.0.params(params))
    }

    /// Seal the target: any call fails, and it cannot be set up again in
    /// this session.
    pub fn not_called(self) {
        self.0.step("not_called").seal();
    }
}

/// A mock setup with its parameters recorded.
#[derive(Debug)]
#[must_use = "a setup registers nothing until once, twice or times is called"]
pub struct MockExpects<'m>(Draft<'m>);

impl<'m> MockExpects<'m> {
    /// Values to return, one per declared return; [`Nil`](crate::Nil) is the
    /// zero value. See [`values!`](crate::values).
    pub fn returns(self, values: impl IntoIterator<Item = ReturnValue>) -> Returning<'m> {
        Returning(self.0.returns(values))
    }
}

/// A stub setup right after [`Mocker::stub`].
#[derive(Debug)]
#[must_use = "a setup registers nothing until once, twice or times is called"]
pub struct StubSetup<'m>(Draft<'m>);

impl<'m> StubSetup<'m> {
    pub(crate) fn new(mocker: &'m Mocker, session: Option<Session>) -> Self {
        Self(Draft::new(mocker, session))
    }

    pub fn returns(self, values: impl IntoIterator<Item = ReturnValue>) -> Returning<'m> {
        Returning(self.0.returns(values))
    }
}

/// A setup ready to be committed.
#[derive(Debug)]
#[must_use = "a setup registers nothing until once, twice or times is called"]
pub struct Returning<'m>(Draft<'m>);

impl<'m> Returning<'m> {
    /// Attach side effects; may be called repeatedly, effects accumulate
    /// and run in registration order.
    pub fn side_effects(self, effects: impl IntoIterator<Item = SideEffect>) -> Self {
        Self(self.0.side_effects(effects))
    }

    pub fn once(self) {
        self.times(1)
    }

    pub fn twice(self) {
        self.times(2)
    }

    /// Commit the expectation for the next `count` calls.
    ///
    /// Zero is refused; use [`MockSetup::not_called`].
    pub fn times(self, count: usize) {
        self.0.step("times").commit(count)
    }
}
