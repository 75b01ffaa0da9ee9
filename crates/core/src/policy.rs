//! Target-state policies.
//!
//! Both policies are pure functions of the snapshot collection. Snapshots
//! whose login failed never contribute.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{ActorUrl, Category, SettingsRecord};
use crate::snapshot::InstanceSnapshot;

/// How the target state is derived from the snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Every account ends up with everything any account has.
    #[default]
    Union,
    /// Every account ends up with at least what the source account has.
    CopyFromSource,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Union => write!(f, "union"),
            Self::CopyFromSource => write!(f, "copy_from_source"),
        }
    }
}

/// What every instance should have once the run is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetState {
    pub subscriptions: BTreeSet<ActorUrl>,
    pub blocked_communities: BTreeSet<ActorUrl>,
    pub blocked_persons: BTreeSet<ActorUrl>,
    /// Settings of the source account, when it has readable settings.
    pub settings: Option<SettingsRecord>,
}

impl TargetState {
    /// The URL set for a list category; `None` for settings.
    pub fn urls(&self, category: Category) -> Option<&BTreeSet<ActorUrl>> {
        match category {
            Category::Subscriptions => Some(&self.subscriptions),
            Category::BlockedCommunities => Some(&self.blocked_communities),
            Category::BlockedPersons => Some(&self.blocked_persons),
            Category::Settings => None,
        }
    }
}

/// Compute the target state under `policy`.
///
/// `source_label` is matched exactly. If no authenticated snapshot carries
/// it, settings are not synchronized and copy-from-source targets nothing.
pub fn compute_target(
    policy: Policy,
    snapshots: &[InstanceSnapshot],
    source_label: &str,
) -> TargetState {
    let source = snapshots
        .iter()
        .find(|s| s.is_authenticated() && s.label == source_label);
    let settings = source.and_then(|s| s.settings.clone());

    match policy {
        Policy::Union => {
            let mut target = TargetState {
                settings,
                ..Default::default()
            };
            for snapshot in snapshots.iter().filter(|s| s.is_authenticated()) {
                target
                    .subscriptions
                    .extend(snapshot.subscriptions.iter().cloned());
                target
                    .blocked_communities
                    .extend(snapshot.blocked_communities.iter().cloned());
                target
                    .blocked_persons
                    .extend(snapshot.blocked_persons.iter().cloned());
            }
            target
        }
        Policy::CopyFromSource => match source {
            Some(source) => TargetState {
                subscriptions: source.subscriptions.clone(),
                blocked_communities: source.blocked_communities.clone(),
                blocked_persons: source.blocked_persons.clone(),
                settings,
            },
            None => TargetState::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteState;
    use crate::errors::AuthError;
    use crate::models::{Account, Secret};

    fn urls(list: &[&str]) -> Vec<ActorUrl> {
        list.iter().map(|u| ActorUrl::from(*u)).collect()
    }

    fn snapshot(label: &str, subs: &[&str], blocked: &[&str], theme: Option<&str>) -> InstanceSnapshot {
        let account = Account::new(label, "https://a.example", "me", Some(Secret::new("pw")));
        InstanceSnapshot::from_state(
            &account,
            RemoteState {
                subscriptions: Some(urls(subs)),
                blocked_communities: Some(urls(blocked)),
                blocked_persons: Some(Vec::new()),
                settings: theme.map(|t| SettingsRecord {
                    theme: Some(t.into()),
                    ..Default::default()
                }),
            },
        )
    }

    fn failed(label: &str, subs: &[&str]) -> InstanceSnapshot {
        let mut s = snapshot(label, subs, &[], None);
        s.status = crate::snapshot::AuthStatus::Failed {
            reason: AuthError::MissingCredential {
                label: label.into(),
            }
            .to_string(),
        };
        s
    }

    #[test]
    fn test_union_is_set_union() {
        let snapshots = vec![
            snapshot("Main", &["X", "Y"], &["B1"], Some("darkly")),
            snapshot("Alt1", &["Y", "Z"], &["B2"], Some("litely")),
            snapshot("Alt2", &[], &[], None),
        ];
        let target = compute_target(Policy::Union, &snapshots, "Main");

        let expected: BTreeSet<ActorUrl> = urls(&["X", "Y", "Z"]).into_iter().collect();
        assert_eq!(target.subscriptions, expected);
        assert_eq!(target.blocked_communities.len(), 2);
        assert_eq!(
            target.settings.and_then(|s| s.theme).as_deref(),
            Some("darkly")
        );
    }

    #[test]
    fn test_union_ignores_failed_logins() {
        let snapshots = vec![
            snapshot("Main", &["X"], &[], None),
            failed("Alt1", &["Q"]),
        ];
        let target = compute_target(Policy::Union, &snapshots, "Main");
        assert_eq!(target.subscriptions, urls(&["X"]).into_iter().collect());
    }

    #[test]
    fn test_copy_from_source_uses_only_source() {
        let snapshots = vec![
            snapshot("Alt1", &["Y", "Z"], &["B2"], None),
            snapshot("Main", &["X"], &["B1"], Some("darkly")),
        ];
        let target = compute_target(Policy::CopyFromSource, &snapshots, "Main");
        assert_eq!(target.subscriptions, urls(&["X"]).into_iter().collect());
        assert_eq!(target.blocked_communities, urls(&["B1"]).into_iter().collect());
        assert!(target.settings.is_some());
    }

    #[test]
    fn test_missing_source_disables_source_features() {
        let snapshots = vec![snapshot("Alt1", &["Y"], &[], Some("darkly"))];

        let union = compute_target(Policy::Union, &snapshots, "Main Account");
        assert_eq!(union.subscriptions.len(), 1);
        assert!(union.settings.is_none());

        let copy = compute_target(Policy::CopyFromSource, &snapshots, "Main Account");
        assert_eq!(copy, TargetState::default());
    }

    #[test]
    fn test_source_label_is_exact_match() {
        let snapshots = vec![snapshot("Main Account", &["X"], &[], Some("darkly"))];
        let target = compute_target(Policy::Union, &snapshots, "main account");
        assert!(target.settings.is_none());
    }

    #[test]
    fn test_failed_source_contributes_nothing() {
        let snapshots = vec![failed("Main", &["X"]), snapshot("Alt1", &["Y"], &[], None)];
        let target = compute_target(Policy::CopyFromSource, &snapshots, "Main");
        assert!(target.subscriptions.is_empty());
    }
}
