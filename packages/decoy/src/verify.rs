//! Teardown reconciliation.

use tracing::debug;

use crate::error::MockError;
use crate::expectation::TargetEntry;
use crate::patch::PatchHandle;
use crate::registry::RegistryState;

/// What a teardown found and what it has to undo.
#[derive(Debug, Default)]
pub(crate) struct Teardown {
    pub(crate) failures: Vec<MockError>,
    pub(crate) patches: Vec<PatchHandle>,
}

/// Reconcile expected against actual counts and clear the registry.
///
/// Entries already reported during the session and stubs are exempt from
/// the count check. Failures come out sorted by target name so a session
/// always reports in the same order.
pub(crate) fn reconcile(state: &mut RegistryState, report_open_setup: bool) -> Teardown {
    let mut teardown = Teardown::default();

    if let Some(open) = state.open.take() {
        if report_open_setup {
            teardown.failures.push(MockError::IncompleteSetup {
                name: open.target.name().to_string(),
            });
        }
    }

    let mut entries: Vec<TargetEntry> = state.entries.drain().map(|(_, entry)| entry).collect();
    entries.sort_by(|a, b| a.target.name().cmp(b.target.name()));

    for entry in entries {
        debug!(
            function = %entry.target,
            mode = %entry.mode,
            expected = entry.expected,
            actual = entry.actual,
            "reconciling"
        );
        if entry.has_count_violation() {
            teardown.failures.push(MockError::CallCount {
                name: entry.target.name().to_string(),
                expected: entry.expected,
                actual: entry.actual,
            });
        }
        teardown.patches.extend(entry.patch);
    }

    teardown
}
