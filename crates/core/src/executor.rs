//! Applies one instance's plan.
//!
//! Operations run strictly in plan order. Each resolve or mutation is
//! bounded by the call timeout and surrounded by the request delay. A failed
//! operation is recorded and the next one still runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::{bounded, InstanceClient};
use crate::errors::ApiError;
use crate::models::{ActorUrl, AuthToken, LocalId, ObjectKind};
use crate::observer::SyncObserver;
use crate::plan::{PendingOp, ReconciliationPlan};
use crate::report::{InstanceReport, OperationOutcome, Outcome, UNRESOLVED};
use crate::snapshot::SnapshotWarning;

/// Executes plans against a single instance at a time.
#[derive(Clone)]
pub struct PlanExecutor {
    request_delay: Duration,
    call_timeout: Duration,
    observer: Arc<dyn SyncObserver>,
}

impl PlanExecutor {
    pub fn new(
        request_delay: Duration,
        call_timeout: Duration,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            request_delay,
            call_timeout,
            observer,
        }
    }

    /// Run every operation in `plan` and report the outcomes.
    ///
    /// The report starts with the plan's already-satisfied items, followed by
    /// one outcome per pending operation in plan order.
    pub async fn execute(
        &self,
        client: &dyn InstanceClient,
        token: &AuthToken,
        plan: &ReconciliationPlan,
        warnings: Vec<SnapshotWarning>,
    ) -> InstanceReport {
        let mut report = InstanceReport::seeded(plan, warnings);

        for op in &plan.ops {
            let outcome = self.apply(client, token, op).await;
            let entry = OperationOutcome::new(op.category(), op.target(), outcome);
            self.observer.operation_finished(&plan.label, &entry);
            report.outcomes.push(entry);
        }

        report
    }

    async fn apply(&self, client: &dyn InstanceClient, token: &AuthToken, op: &PendingOp) -> Outcome {
        let result = match op {
            PendingOp::Subscribe(url) => {
                match self.resolve(client, token, url, ObjectKind::Community).await {
                    Some(id) => self.paced(client.subscribe(token, id)).await,
                    None => return Outcome::Failed(UNRESOLVED.into()),
                }
            }
            PendingOp::BlockCommunity(url) => {
                match self.resolve(client, token, url, ObjectKind::Community).await {
                    Some(id) => self.paced(client.block_community(token, id)).await,
                    None => return Outcome::Failed(UNRESOLVED.into()),
                }
            }
            PendingOp::BlockPerson(url) => {
                match self.resolve(client, token, url, ObjectKind::Person).await {
                    Some(id) => self.paced(client.block_person(token, id)).await,
                    None => return Outcome::Failed(UNRESOLVED.into()),
                }
            }
            PendingOp::ApplySettings(settings) => {
                self.paced(client.save_settings(token, settings)).await
            }
        };

        match result {
            Ok(()) => Outcome::Applied,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    async fn resolve(
        &self,
        client: &dyn InstanceClient,
        token: &AuthToken,
        url: &ActorUrl,
        kind: ObjectKind,
    ) -> Option<LocalId> {
        match self.paced(client.resolve(token, url, kind)).await {
            Ok(id) => {
                debug!(url = %url, kind = %kind, id = id.0, "resolved");
                Some(id)
            }
            Err(e) => {
                warn!(url = %url, kind = %kind, error = %e, "could not resolve");
                None
            }
        }
    }

    /// Delay, call with a timeout, delay again.
    async fn paced<T, E, F>(&self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ApiError>,
    {
        tokio::time::sleep(self.request_delay).await;
        let result = bounded(self.call_timeout, call).await;
        tokio::time::sleep(self.request_delay).await;
        result
    }
}
