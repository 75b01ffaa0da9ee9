//! Per-operation outcomes and the end-of-run report.
//!
//! Nothing here is persisted; a [`SyncReport`] is handed back to the caller
//! and rendered by the CLI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Category;
use crate::plan::ReconciliationPlan;
use crate::snapshot::SnapshotWarning;

/// Target string recorded for settings operations.
pub const SETTINGS_TARGET: &str = "profile settings";

/// Failure reason recorded when a portable URL has no local id.
pub const UNRESOLVED: &str = "unresolved";

/// Failure reason for every operation of an instance whose task panicked.
pub const TASK_PANICKED: &str = "instance task panicked";

/// Failure reason for an instance whose task was cancelled.
pub const TASK_CANCELLED: &str = "instance task was cancelled";

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    AlreadySatisfied,
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::AlreadySatisfied => write!(f, "already satisfied"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of one operation, with what it targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub category: Category,
    /// Actor URL, or [`SETTINGS_TARGET`].
    pub target: String,
    pub outcome: Outcome,
}

impl OperationOutcome {
    pub fn new(category: Category, target: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            category,
            target: target.into(),
            outcome,
        }
    }
}

/// Counts of each outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub applied: usize,
    pub already_satisfied: usize,
    pub failed: usize,
}

impl CategoryTally {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::AlreadySatisfied => self.already_satisfied += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.already_satisfied + self.failed
    }

    fn add(&mut self, other: &CategoryTally) {
        self.applied += other.applied;
        self.already_satisfied += other.already_satisfied;
        self.failed += other.failed;
    }
}

// ---------------------------------------------------------------------------
// Per-instance report
// ---------------------------------------------------------------------------

/// Everything that happened to one authenticated instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceReport {
    pub label: String,
    pub site: String,
    /// Categories whose state could not be read.
    pub warnings: Vec<SnapshotWarning>,
    /// In plan order, satisfied items first.
    pub outcomes: Vec<OperationOutcome>,
}

impl InstanceReport {
    /// Start a report from a plan: warnings plus one `AlreadySatisfied` per
    /// item the instance already had.
    pub fn seeded(plan: &ReconciliationPlan, warnings: Vec<SnapshotWarning>) -> Self {
        let outcomes = plan
            .satisfied
            .iter()
            .map(|item| {
                OperationOutcome::new(item.category, item.target.clone(), Outcome::AlreadySatisfied)
            })
            .collect();
        Self {
            label: plan.label.clone(),
            site: plan.site.clone(),
            warnings,
            outcomes,
        }
    }

    /// Report for an instance whose execution never finished: every pending
    /// operation is recorded as failed with `reason`, whether or not it
    /// reached the instance before the task stopped.
    pub fn aborted(plan: &ReconciliationPlan, warnings: Vec<SnapshotWarning>, reason: &str) -> Self {
        let mut report = Self::seeded(plan, warnings);
        report.outcomes.extend(plan.ops.iter().map(|op| {
            OperationOutcome::new(op.category(), op.target(), Outcome::Failed(reason.to_string()))
        }));
        report
    }

    pub fn tally(&self, category: Category) -> CategoryTally {
        let mut tally = CategoryTally::default();
        for outcome in self.outcomes.iter().filter(|o| o.category == category) {
            tally.record(&outcome.outcome);
        }
        tally
    }

    pub fn totals(&self) -> CategoryTally {
        let mut tally = CategoryTally::default();
        for outcome in &self.outcomes {
            tally.record(&outcome.outcome);
        }
        tally
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_failed())
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// An account left out of the run because it could not log in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedAccount {
    pub label: String,
    pub site: String,
    pub reason: String,
}

/// One failed operation, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry<'a> {
    pub label: &'a str,
    pub category: Category,
    pub target: &'a str,
    pub reason: &'a str,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: String,
    pub completed_at: Option<String>,
    pub dry_run: bool,
    /// The plans that were (or, in a dry run, would have been) executed.
    pub plans: Vec<ReconciliationPlan>,
    pub instances: Vec<InstanceReport>,
    pub skipped: Vec<SkippedAccount>,
}

impl SyncReport {
    pub fn instance(&self, label: &str) -> Option<&InstanceReport> {
        self.instances.iter().find(|r| r.label == label)
    }

    /// Tallies summed over every instance, keyed by category.
    pub fn tally_by_category(&self) -> BTreeMap<Category, CategoryTally> {
        let mut tallies: BTreeMap<Category, CategoryTally> = BTreeMap::new();
        for report in &self.instances {
            for category in Category::ALL {
                tallies
                    .entry(category)
                    .or_default()
                    .add(&report.tally(category));
            }
        }
        tallies
    }

    pub fn failures(&self) -> Vec<FailureEntry<'_>> {
        self.instances
            .iter()
            .flat_map(|report| {
                report.failures().map(move |o| FailureEntry {
                    label: &report.label,
                    category: o.category,
                    target: &o.target,
                    reason: match &o.outcome {
                        Outcome::Failed(reason) => reason.as_str(),
                        _ => "",
                    },
                })
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.instances.iter().any(|r| r.failures().next().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(label: &str, outcomes: Vec<OperationOutcome>) -> InstanceReport {
        InstanceReport {
            label: label.into(),
            site: format!("https://{}.example", label.to_lowercase()),
            warnings: Vec::new(),
            outcomes,
        }
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Applied.to_string(), "applied");
        assert_eq!(
            Outcome::Failed(UNRESOLVED.into()).to_string(),
            "failed: unresolved"
        );
    }

    #[test]
    fn test_outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::Failed("HTTP 500".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "failed", "reason": "HTTP 500" })
        );
        let json = serde_json::to_value(Outcome::AlreadySatisfied).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "already_satisfied" }));
    }

    #[test]
    fn test_instance_tallies() {
        let r = report(
            "Main",
            vec![
                OperationOutcome::new(Category::Subscriptions, "https://x/c/a", Outcome::Applied),
                OperationOutcome::new(
                    Category::Subscriptions,
                    "https://x/c/b",
                    Outcome::Failed(UNRESOLVED.into()),
                ),
                OperationOutcome::new(
                    Category::BlockedPersons,
                    "https://x/u/c",
                    Outcome::AlreadySatisfied,
                ),
            ],
        );

        let subs = r.tally(Category::Subscriptions);
        assert_eq!((subs.applied, subs.already_satisfied, subs.failed), (1, 0, 1));
        assert_eq!(r.tally(Category::BlockedPersons).already_satisfied, 1);
        assert_eq!(r.tally(Category::Settings).total(), 0);
        assert_eq!(r.totals().total(), 3);
        assert_eq!(r.failures().count(), 1);
    }

    #[test]
    fn test_run_failures_and_category_totals() {
        let run = SyncReport {
            started_at: "2024-01-01T00:00:00Z".into(),
            completed_at: None,
            dry_run: false,
            plans: Vec::new(),
            instances: vec![
                report(
                    "Main",
                    vec![OperationOutcome::new(
                        Category::Subscriptions,
                        "https://x/c/a",
                        Outcome::Applied,
                    )],
                ),
                report(
                    "Alt",
                    vec![OperationOutcome::new(
                        Category::Subscriptions,
                        "https://x/c/z",
                        Outcome::Failed(UNRESOLVED.into()),
                    )],
                ),
            ],
            skipped: Vec::new(),
        };

        assert!(run.has_failures());
        let failures = run.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "Alt");
        assert_eq!(failures[0].target, "https://x/c/z");
        assert_eq!(failures[0].reason, "unresolved");

        let totals = run.tally_by_category();
        assert_eq!(totals[&Category::Subscriptions].applied, 1);
        assert_eq!(totals[&Category::Subscriptions].failed, 1);
        assert_eq!(totals[&Category::Settings].total(), 0);
        assert!(run.instance("Alt").is_some());
        assert!(run.instance("Nope").is_none());
    }
}
