//! Point-in-time model of one instance's user state.
//!
//! A snapshot is built from one login and one state read, then never
//! changes. Collections hold actor URLs only; local ids are looked up later,
//! per instance, when an operation needs one.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{bounded, InstanceClient, RemoteState};
use crate::errors::{AuthError, ReadError};
use crate::models::{Account, ActorUrl, AuthToken, Category, SettingsRecord};
use crate::observer::{SnapshotCounts, SyncObserver};

/// Whether the account could log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatus {
    Authenticated,
    Failed { reason: String },
}

/// A category that could not be read and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotWarning {
    pub category: Category,
    pub detail: String,
}

/// State of one instance at the start of a run.
#[derive(Debug, Clone)]
pub struct InstanceSnapshot {
    pub label: String,
    pub site: String,
    pub status: AuthStatus,
    pub subscriptions: BTreeSet<ActorUrl>,
    pub blocked_communities: BTreeSet<ActorUrl>,
    pub blocked_persons: BTreeSet<ActorUrl>,
    pub settings: Option<SettingsRecord>,
    pub warnings: Vec<SnapshotWarning>,
}

impl InstanceSnapshot {
    fn empty(account: &Account, status: AuthStatus) -> Self {
        Self {
            label: account.label.clone(),
            site: account.site.clone(),
            status,
            subscriptions: BTreeSet::new(),
            blocked_communities: BTreeSet::new(),
            blocked_persons: BTreeSet::new(),
            settings: None,
            warnings: Vec::new(),
        }
    }

    /// Snapshot of an account that could not log in.
    pub fn failed(account: &Account, error: &AuthError) -> Self {
        Self::empty(
            account,
            AuthStatus::Failed {
                reason: error.to_string(),
            },
        )
    }

    /// Snapshot of an account whose login task never finished.
    pub fn aborted(account: &Account, reason: impl Into<String>) -> Self {
        Self::empty(
            account,
            AuthStatus::Failed {
                reason: reason.into(),
            },
        )
    }

    /// Project a state read into a snapshot. Missing collections become
    /// empty sets with a warning.
    pub fn from_state(account: &Account, state: RemoteState) -> Self {
        let mut snapshot = Self::empty(account, AuthStatus::Authenticated);
        let missing = |category| SnapshotWarning {
            category,
            detail: "missing or malformed in site response".into(),
        };

        match state.subscriptions {
            Some(urls) => snapshot.subscriptions = urls.into_iter().collect(),
            None => snapshot.warnings.push(missing(Category::Subscriptions)),
        }
        match state.blocked_communities {
            Some(urls) => snapshot.blocked_communities = urls.into_iter().collect(),
            None => snapshot.warnings.push(missing(Category::BlockedCommunities)),
        }
        match state.blocked_persons {
            Some(urls) => snapshot.blocked_persons = urls.into_iter().collect(),
            None => snapshot.warnings.push(missing(Category::BlockedPersons)),
        }
        match state.settings {
            Some(settings) => snapshot.settings = Some(settings),
            None => snapshot.warnings.push(missing(Category::Settings)),
        }

        snapshot
    }

    /// Snapshot of an authenticated account whose state read failed: every
    /// category is empty and carries a warning.
    pub fn unreadable(account: &Account, error: &ReadError) -> Self {
        let mut snapshot = Self::empty(account, AuthStatus::Authenticated);
        snapshot.warnings = Category::ALL
            .into_iter()
            .map(|category| SnapshotWarning {
                category,
                detail: error.to_string(),
            })
            .collect();
        snapshot
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// The URL set for a list category; `None` for settings.
    pub fn urls(&self, category: Category) -> Option<&BTreeSet<ActorUrl>> {
        match category {
            Category::Subscriptions => Some(&self.subscriptions),
            Category::BlockedCommunities => Some(&self.blocked_communities),
            Category::BlockedPersons => Some(&self.blocked_persons),
            Category::Settings => None,
        }
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            subscriptions: self.subscriptions.len(),
            blocked_communities: self.blocked_communities.len(),
            blocked_persons: self.blocked_persons.len(),
            has_settings: self.settings.is_some(),
        }
    }
}

/// Logs an account in and reads its state.
#[derive(Clone)]
pub struct SnapshotBuilder {
    call_timeout: Duration,
    observer: Arc<dyn SyncObserver>,
}

impl SnapshotBuilder {
    pub fn new(call_timeout: Duration, observer: Arc<dyn SyncObserver>) -> Self {
        Self {
            call_timeout,
            observer,
        }
    }

    /// Build the snapshot for one account. The token is returned only when
    /// login succeeded.
    pub async fn build(
        &self,
        account: &Account,
        client: &dyn InstanceClient,
    ) -> (InstanceSnapshot, Option<AuthToken>) {
        let token = match self.login(account, client).await {
            Ok(token) => token,
            Err(e) => {
                self.observer.login_failed(&account.label, &e.to_string());
                return (InstanceSnapshot::failed(account, &e), None);
            }
        };

        let snapshot = match bounded(self.call_timeout, client.read_state(&token)).await {
            Ok(state) => InstanceSnapshot::from_state(account, state),
            Err(e) => InstanceSnapshot::unreadable(account, &e),
        };

        for warning in &snapshot.warnings {
            self.observer.snapshot_degraded(&account.label, warning);
        }
        self.observer.snapshot_built(&account.label, snapshot.counts());

        (snapshot, Some(token))
    }

    async fn login(
        &self,
        account: &Account,
        client: &dyn InstanceClient,
    ) -> Result<AuthToken, AuthError> {
        let password = account
            .password
            .as_ref()
            .ok_or_else(|| AuthError::MissingCredential {
                label: account.label.clone(),
            })?;
        bounded(
            self.call_timeout,
            client.login(&account.username, password.expose()),
        )
        .await
    }
}
