//! Run-scoped progress reporting.
//!
//! Each component receives an `Arc<dyn SyncObserver>` when it is built, so
//! every run owns its own sink. [`TracingObserver`] forwards events to
//! `tracing`; tests plug in a recorder.

use tracing::{error, info, warn};

use crate::report::OperationOutcome;
use crate::snapshot::SnapshotWarning;

/// Receives progress events from the engine.
///
/// All methods have empty defaults so an observer only implements what it
/// cares about.
pub trait SyncObserver: Send + Sync {
    fn login_failed(&self, _label: &str, _reason: &str) {}

    fn snapshot_built(&self, _label: &str, _counts: SnapshotCounts) {}

    fn snapshot_degraded(&self, _label: &str, _warning: &SnapshotWarning) {}

    fn plan_built(&self, _label: &str, _pending: usize, _satisfied: usize) {}

    fn operation_finished(&self, _label: &str, _outcome: &OperationOutcome) {}

    fn run_finished(&self, _synchronized: usize, _skipped: usize) {}
}

/// Sizes of one snapshot's collections, for progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub subscriptions: usize,
    pub blocked_communities: usize,
    pub blocked_persons: usize,
    pub has_settings: bool,
}

/// Observer that writes every event as a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn login_failed(&self, label: &str, reason: &str) {
        error!(account = label, reason, "login failed; account excluded from this run");
    }

    fn snapshot_built(&self, label: &str, counts: SnapshotCounts) {
        info!(
            account = label,
            subscriptions = counts.subscriptions,
            blocked_communities = counts.blocked_communities,
            blocked_persons = counts.blocked_persons,
            settings = counts.has_settings,
            "read current state"
        );
    }

    fn snapshot_degraded(&self, label: &str, warning: &SnapshotWarning) {
        warn!(
            account = label,
            category = %warning.category,
            detail = %warning.detail,
            "state read degraded; treating category as empty"
        );
    }

    fn plan_built(&self, label: &str, pending: usize, satisfied: usize) {
        info!(account = label, pending, satisfied, "plan built");
    }

    fn operation_finished(&self, label: &str, outcome: &OperationOutcome) {
        if outcome.outcome.is_failed() {
            warn!(
                account = label,
                category = %outcome.category,
                target = %outcome.target,
                outcome = %outcome.outcome,
                "operation failed"
            );
        } else {
            info!(
                account = label,
                category = %outcome.category,
                target = %outcome.target,
                outcome = %outcome.outcome,
                "operation finished"
            );
        }
    }

    fn run_finished(&self, synchronized: usize, skipped: usize) {
        info!(synchronized, skipped, "sync run complete");
    }
}
