//! Top-level reconciliation run.
//!
//! The [`SyncEngine`] drives one run through its phases:
//!
//! 1. Log in and read state on every account, skipping accounts that fail.
//! 2. Abort if no account authenticated.
//! 3. Compute the target state under the configured policy.
//! 4. Build one plan per authenticated instance.
//! 5. Execute the plans (unless this is a dry run) and collect the report.
//!
//! Instances are independent of one another, so phases 1 and 5 may run as
//! concurrent tasks, one lane per host. Results are always gathered in
//! account order.
//!
//! A lock flag prevents overlapping runs on the same engine.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::client::InstanceClient;
use crate::errors::SyncError;
use crate::executor::PlanExecutor;
use crate::models::{Account, AuthToken, Category};
use crate::observer::{SyncObserver, TracingObserver};
use crate::plan::{build_plan, ReconciliationPlan};
use crate::policy::{compute_target, Policy};
use crate::report::{InstanceReport, SkippedAccount, SyncReport, TASK_CANCELLED, TASK_PANICKED};
use crate::snapshot::{AuthStatus, InstanceSnapshot, SnapshotBuilder, SnapshotWarning};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub policy: Policy,
    /// Exact label of the account whose settings (and, under copy-from-source,
    /// lists) define the target.
    pub source_label: String,
    /// Categories to reconcile; the rest are ignored entirely.
    pub categories: Vec<Category>,
    /// Pause before and after every resolve or mutation on an instance.
    pub request_delay: Duration,
    /// Upper bound for any single network call.
    pub call_timeout: Duration,
    /// Run instances as concurrent tasks.
    pub concurrent: bool,
    /// Build plans but issue no mutations.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: Policy::Union,
            source_label: crate::config::DEFAULT_SOURCE_ACCOUNT.to_string(),
            categories: Category::ALL.to_vec(),
            request_delay: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
            concurrent: true,
            dry_run: false,
        }
    }
}

/// An account paired with the client that talks to its instance.
#[derive(Clone)]
pub struct AccountClient {
    pub account: Account,
    pub client: Arc<dyn InstanceClient>,
}

impl AccountClient {
    pub fn new(account: Account, client: Arc<dyn InstanceClient>) -> Self {
        Self { account, client }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The reconciliation engine.
pub struct SyncEngine {
    options: SyncOptions,
    observer: Arc<dyn SyncObserver>,
    /// Set while a run is in progress.
    running: Arc<AtomicBool>,
    started_at: std::sync::Mutex<Option<String>>,
}

impl SyncEngine {
    pub fn new(options: SyncOptions, observer: Arc<dyn SyncObserver>) -> Self {
        debug!(policy = %options.policy, source = %options.source_label, "initializing sync engine");
        Self {
            options,
            observer,
            running: Arc::new(AtomicBool::new(false)),
            started_at: std::sync::Mutex::new(None),
        }
    }

    /// Engine that reports progress through `tracing`.
    pub fn with_tracing(options: SyncOptions) -> Self {
        Self::new(options, Arc::new(TracingObserver))
    }

    /// Check if a run is currently in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute one full run over `accounts`.
    ///
    /// Per-account and per-operation failures are recorded in the report, as
    /// is an instance whose task panicked. Only an empty account list, zero authenticated accounts, or an
    /// overlapping run produce an error, and none of these leave any
    /// mutation behind.
    pub async fn run(&self, accounts: Vec<AccountClient>) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let started_at = self
                .started_at
                .lock()
                .ok()
                .and_then(|s| s.clone())
                .unwrap_or_default();
            return Err(SyncError::AlreadyRunning { started_at });
        }
        let _guard = RunLockGuard(self.running.clone());

        let started_at = Utc::now().to_rfc3339();
        if let Ok(mut slot) = self.started_at.lock() {
            *slot = Some(started_at.clone());
        }

        let mut report = self.run_phases(accounts, started_at).await?;
        report.completed_at = Some(Utc::now().to_rfc3339());
        Ok(report)
    }

    async fn run_phases(
        &self,
        accounts: Vec<AccountClient>,
        started_at: String,
    ) -> Result<SyncReport, SyncError> {
        if accounts.is_empty() {
            return Err(SyncError::NoAccounts);
        }
        let attempted = accounts.len();
        info!(
            accounts = attempted,
            policy = %self.options.policy,
            dry_run = self.options.dry_run,
            "starting sync run"
        );

        // 1. Snapshots.
        let builder = SnapshotBuilder::new(self.options.call_timeout, self.observer.clone());
        let snapshot_tasks = accounts
            .iter()
            .map(|entry| {
                let builder = builder.clone();
                let entry = entry.clone();
                InstanceTask {
                    label: entry.account.label.clone(),
                    site: entry.account.site.clone(),
                    future: async move {
                        builder.build(&entry.account, entry.client.as_ref()).await
                    },
                }
            })
            .collect();
        let built: Vec<(InstanceSnapshot, Option<AuthToken>)> = self
            .gather(snapshot_tasks)
            .await
            .into_iter()
            .zip(&accounts)
            .map(|(result, entry)| {
                result.unwrap_or_else(|reason| {
                    (InstanceSnapshot::aborted(&entry.account, reason), None)
                })
            })
            .collect();

        // 2. At least one instance must be usable.
        if !built.iter().any(|(snapshot, _)| snapshot.is_authenticated()) {
            return Err(SyncError::NoAuthenticatedInstances { attempted });
        }

        // 3. Target.
        let snapshots: Vec<InstanceSnapshot> = built.iter().map(|(s, _)| s.clone()).collect();
        let target = compute_target(self.options.policy, &snapshots, &self.options.source_label);
        if target.settings.is_none() && self.options.categories.contains(&Category::Settings) {
            info!(
                source = %self.options.source_label,
                "source account has no readable settings; settings will not be synchronized"
            );
        }

        // 4. Plans, paired with what executing them needs.
        let mut skipped = Vec::new();
        let mut work: Vec<PlanWork> = Vec::new();
        for ((snapshot, token), entry) in built.into_iter().zip(accounts) {
            match (&snapshot.status, token) {
                (AuthStatus::Authenticated, Some(token)) => {
                    let plan = build_plan(&snapshot, &target, &self.options.categories);
                    self.observer
                        .plan_built(&plan.label, plan.ops.len(), plan.satisfied.len());
                    work.push(PlanWork {
                        client: entry.client,
                        token,
                        plan,
                        warnings: snapshot.warnings,
                    });
                }
                (AuthStatus::Failed { reason }, _) => skipped.push(SkippedAccount {
                    label: snapshot.label.clone(),
                    site: snapshot.site.clone(),
                    reason: reason.clone(),
                }),
                (AuthStatus::Authenticated, None) => skipped.push(SkippedAccount {
                    label: snapshot.label.clone(),
                    site: snapshot.site.clone(),
                    reason: "no session token".into(),
                }),
            }
        }
        let plans: Vec<ReconciliationPlan> = work.iter().map(|w| w.plan.clone()).collect();

        // 5. Execute.
        let instances: Vec<InstanceReport> = if self.options.dry_run {
            work.into_iter()
                .map(|w| InstanceReport::seeded(&w.plan, w.warnings))
                .collect()
        } else {
            let executor = PlanExecutor::new(
                self.options.request_delay,
                self.options.call_timeout,
                self.observer.clone(),
            );
            let fallback_warnings: Vec<Vec<SnapshotWarning>> =
                work.iter().map(|w| w.warnings.clone()).collect();
            let execute_tasks = work
                .into_iter()
                .map(|w| {
                    let executor = executor.clone();
                    InstanceTask {
                        label: w.plan.label.clone(),
                        site: w.plan.site.clone(),
                        future: async move {
                            executor
                                .execute(w.client.as_ref(), &w.token, &w.plan, w.warnings)
                                .await
                        },
                    }
                })
                .collect();
            self.gather(execute_tasks)
                .await
                .into_iter()
                .zip(plans.iter().zip(fallback_warnings))
                .map(|(result, (plan, warnings))| {
                    result.unwrap_or_else(|reason| {
                        InstanceReport::aborted(plan, warnings, &reason)
                    })
                })
                .collect()
        };

        self.observer.run_finished(instances.len(), skipped.len());

        Ok(SyncReport {
            started_at,
            completed_at: None,
            dry_run: self.options.dry_run,
            plans,
            instances,
            skipped,
        })
    }

    /// Run one future per instance and return their results in input order.
    ///
    /// Futures for the same site share a lane and run one after another, so
    /// the request delay holds per host. Lanes run concurrently unless the
    /// run is sequential, in which case everything shares a single lane. A
    /// future that panics yields `Err` with the recorded reason and does not
    /// affect the others.
    async fn gather<T, F>(&self, tasks: Vec<InstanceTask<F>>) -> Vec<Result<T, String>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let count = tasks.len();
        let mut lanes: Vec<(String, Lane<F>)> = Vec::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let key = if self.options.concurrent {
                task.site
            } else {
                String::new()
            };
            let item = (index, task.label, task.future);
            match lanes.iter_mut().find(|(site, _)| *site == key) {
                Some((_, lane)) => lane.push(item),
                None => lanes.push((key, vec![item])),
            }
        }
        debug!(tasks = count, lanes = lanes.len(), "dispatching instance tasks");

        let handles: Vec<_> = lanes
            .into_iter()
            .map(|(_, lane)| tokio::spawn(run_lane(lane)))
            .collect();

        let mut slots: Vec<Option<Result<T, String>>> = (0..count).map(|_| None).collect();
        for handle in handles {
            match handle.await {
                Ok(done) => {
                    for (index, result) in done {
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(result);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "instance lane did not complete"),
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(TASK_CANCELLED.to_string())))
            .collect()
    }
}

/// One unit of per-instance work handed to [`SyncEngine::gather`].
struct InstanceTask<F> {
    label: String,
    site: String,
    future: F,
}

/// Futures bound for one host, tagged with their input index and label.
type Lane<F> = Vec<(usize, String, F)>;

/// Run a lane's futures in order, each in its own task so a panic stays
/// contained to the instance that raised it.
async fn run_lane<T, F>(lane: Lane<F>) -> Vec<(usize, Result<T, String>)>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut done = Vec::with_capacity(lane.len());
    for (index, label, future) in lane {
        let result = tokio::spawn(future).await.map_err(|e| {
            error!(account = %label, error = %e, "instance task did not complete");
            if e.is_panic() {
                TASK_PANICKED.to_string()
            } else {
                TASK_CANCELLED.to_string()
            }
        });
        done.push((index, result));
    }
    done
}

/// Everything needed to execute one instance's plan.
struct PlanWork {
    client: Arc<dyn InstanceClient>,
    token: AuthToken,
    plan: ReconciliationPlan,
    warnings: Vec<SnapshotWarning>,
}

/// Clears the running flag on drop, even if the run panics.
struct RunLockGuard(Arc<AtomicBool>);

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SyncOptions::default();
        assert_eq!(options.policy, Policy::Union);
        assert_eq!(options.source_label, "Main Account");
        assert_eq!(options.categories, Category::ALL.to_vec());
        assert_eq!(options.request_delay, Duration::from_millis(250));
        assert!(!options.dry_run);
    }

    #[tokio::test]
    async fn test_empty_account_list_is_fatal() {
        let engine = SyncEngine::with_tracing(SyncOptions::default());
        let err = engine.run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::NoAccounts));
        assert!(!engine.is_running());
    }
}
