//! Per-instance reconciliation plans.
//!
//! A plan lists, for one instance, the target items it does not have yet.
//! Items it already has are recorded as satisfied and never re-issued. The
//! plan only ever adds: nothing is unsubscribed or unblocked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{ActorUrl, Category, ObjectKind, SettingsRecord};
use crate::policy::TargetState;
use crate::report::SETTINGS_TARGET;
use crate::snapshot::InstanceSnapshot;

/// One state change still to be made on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "target", rename_all = "snake_case")]
pub enum PendingOp {
    Subscribe(ActorUrl),
    BlockCommunity(ActorUrl),
    BlockPerson(ActorUrl),
    ApplySettings(SettingsRecord),
}

impl PendingOp {
    fn for_url(category: Category, url: ActorUrl) -> Option<Self> {
        match category {
            Category::Subscriptions => Some(Self::Subscribe(url)),
            Category::BlockedCommunities => Some(Self::BlockCommunity(url)),
            Category::BlockedPersons => Some(Self::BlockPerson(url)),
            Category::Settings => None,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Subscribe(_) => Category::Subscriptions,
            Self::BlockCommunity(_) => Category::BlockedCommunities,
            Self::BlockPerson(_) => Category::BlockedPersons,
            Self::ApplySettings(_) => Category::Settings,
        }
    }

    /// The URL this operation needs resolved first, and as what.
    pub fn needs_resolution(&self) -> Option<(&ActorUrl, ObjectKind)> {
        match self {
            Self::Subscribe(url) | Self::BlockCommunity(url) => Some((url, ObjectKind::Community)),
            Self::BlockPerson(url) => Some((url, ObjectKind::Person)),
            Self::ApplySettings(_) => None,
        }
    }

    /// Display target: the URL, or [`SETTINGS_TARGET`].
    pub fn target(&self) -> String {
        match self.needs_resolution() {
            Some((url, _)) => url.to_string(),
            None => SETTINGS_TARGET.to_string(),
        }
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe(url) => write!(f, "subscribe {}", url),
            Self::BlockCommunity(url) => write!(f, "block community {}", url),
            Self::BlockPerson(url) => write!(f, "block person {}", url),
            Self::ApplySettings(_) => write!(f, "apply {}", SETTINGS_TARGET),
        }
    }
}

/// A target item the instance already has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfiedItem {
    pub category: Category,
    pub target: String,
}

/// Operations for one instance, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub label: String,
    pub site: String,
    pub ops: Vec<PendingOp>,
    pub satisfied: Vec<SatisfiedItem>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Diff one snapshot against the target.
///
/// Categories run in [`Category::ALL`] order, restricted to `categories`;
/// URLs within a category run in lexicographic order.
pub fn build_plan(
    snapshot: &InstanceSnapshot,
    target: &TargetState,
    categories: &[Category],
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan {
        label: snapshot.label.clone(),
        site: snapshot.site.clone(),
        ops: Vec::new(),
        satisfied: Vec::new(),
    };

    for category in Category::ALL {
        if !categories.contains(&category) {
            continue;
        }

        if category == Category::Settings {
            if let Some(wanted) = &target.settings {
                if snapshot.settings.as_ref() == Some(wanted) {
                    plan.satisfied.push(SatisfiedItem {
                        category,
                        target: SETTINGS_TARGET.to_string(),
                    });
                } else {
                    plan.ops.push(PendingOp::ApplySettings(wanted.clone()));
                }
            }
            continue;
        }

        let (Some(wanted), Some(current)) = (target.urls(category), snapshot.urls(category)) else {
            continue;
        };
        for url in wanted {
            if current.contains(url) {
                plan.satisfied.push(SatisfiedItem {
                    category,
                    target: url.to_string(),
                });
            } else if let Some(op) = PendingOp::for_url(category, url.clone()) {
                plan.ops.push(op);
            }
        }
    }

    plan
}

/// One plan per authenticated snapshot, in snapshot order.
pub fn build_plans(
    snapshots: &[InstanceSnapshot],
    target: &TargetState,
    categories: &[Category],
) -> Vec<ReconciliationPlan> {
    snapshots
        .iter()
        .filter(|s| s.is_authenticated())
        .map(|s| build_plan(s, target, categories))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteState;
    use crate::models::{Account, Secret};
    use crate::policy::{compute_target, Policy};
    use crate::snapshot::AuthStatus;

    fn urls(list: &[&str]) -> Vec<ActorUrl> {
        list.iter().map(|u| ActorUrl::from(*u)).collect()
    }

    fn snapshot(label: &str, subs: &[&str]) -> InstanceSnapshot {
        let account = Account::new(label, "https://a.example", "me", Some(Secret::new("pw")));
        InstanceSnapshot::from_state(
            &account,
            RemoteState {
                subscriptions: Some(urls(subs)),
                blocked_communities: Some(Vec::new()),
                blocked_persons: Some(Vec::new()),
                settings: None,
            },
        )
    }

    fn subscribes(list: &[&str]) -> Vec<PendingOp> {
        urls(list).into_iter().map(PendingOp::Subscribe).collect()
    }

    #[test]
    fn test_three_account_union_scenario() {
        let snapshots = vec![
            snapshot("Main", &["X", "Y"]),
            snapshot("Alt1", &["Y", "Z"]),
            snapshot("Alt2", &[]),
        ];
        let target = compute_target(Policy::Union, &snapshots, "Main");
        let plans = build_plans(&snapshots, &target, &Category::ALL);

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].label, "Main");
        assert_eq!(plans[0].ops, subscribes(&["Z"]));
        assert_eq!(plans[1].ops, subscribes(&["X"]));
        assert_eq!(plans[2].ops, subscribes(&["X", "Y", "Z"]));
        assert_eq!(plans[0].satisfied.len(), 2);
        assert!(plans[2].satisfied.is_empty());
    }

    #[test]
    fn test_failed_login_gets_no_plan() {
        let mut alt1 = snapshot("Alt1", &["Q"]);
        alt1.status = AuthStatus::Failed {
            reason: "bad password".into(),
        };
        let snapshots = vec![snapshot("Main", &["X"]), alt1, snapshot("Alt2", &[])];
        let target = compute_target(Policy::Union, &snapshots, "Main");
        let plans = build_plans(&snapshots, &target, &Category::ALL);

        let labels: Vec<&str> = plans.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Main", "Alt2"]);
        assert!(plans[0].is_empty());
        assert_eq!(plans[1].ops, subscribes(&["X"]));
    }

    #[test]
    fn test_rebuilding_after_apply_is_empty() {
        let mut snapshots = vec![
            snapshot("Main", &["X", "Y"]),
            snapshot("Alt1", &["Y", "Z"]),
        ];
        snapshots[0].blocked_persons.insert(ActorUrl::from("https://b.example/u/troll"));
        snapshots[1].settings = Some(SettingsRecord {
            theme: Some("litely".into()),
            ..Default::default()
        });
        snapshots[0].settings = Some(SettingsRecord {
            theme: Some("darkly".into()),
            ..Default::default()
        });

        let target = compute_target(Policy::Union, &snapshots, "Main");
        let first = build_plans(&snapshots, &target, &Category::ALL);
        assert!(first.iter().any(|p| !p.is_empty()));

        for snapshot in &mut snapshots {
            snapshot.subscriptions.extend(target.subscriptions.iter().cloned());
            snapshot
                .blocked_communities
                .extend(target.blocked_communities.iter().cloned());
            snapshot
                .blocked_persons
                .extend(target.blocked_persons.iter().cloned());
            snapshot.settings = target.settings.clone();
        }

        let second = build_plans(&snapshots, &target, &Category::ALL);
        assert!(second.iter().all(ReconciliationPlan::is_empty));
    }

    #[test]
    fn test_equal_settings_are_satisfied() {
        let settings = SettingsRecord {
            theme: Some("darkly".into()),
            avatar: Some("https://a.example/pictrs/me.png".into()),
            ..Default::default()
        };
        let mut main = snapshot("Main", &[]);
        main.settings = Some(settings.clone());
        let mut alt = snapshot("Alt", &[]);
        alt.settings = Some(SettingsRecord {
            avatar: None,
            ..settings.clone()
        });

        let target = compute_target(Policy::Union, &[main.clone(), alt.clone()], "Main");
        let plan = build_plan(&alt, &target, &Category::ALL);
        assert!(plan.is_empty());
        assert_eq!(
            plan.satisfied,
            vec![SatisfiedItem {
                category: Category::Settings,
                target: SETTINGS_TARGET.into()
            }]
        );
    }

    #[test]
    fn test_settings_op_comes_last() {
        let mut main = snapshot("Main", &["X"]);
        main.blocked_persons.insert(ActorUrl::from("P"));
        main.blocked_communities.insert(ActorUrl::from("C"));
        main.settings = Some(SettingsRecord {
            theme: Some("darkly".into()),
            ..Default::default()
        });
        let alt = snapshot("Alt", &[]);

        let target = compute_target(Policy::Union, &[main.clone(), alt.clone()], "Main");
        let plan = build_plan(&alt, &target, &Category::ALL);
        let categories: Vec<Category> = plan.ops.iter().map(PendingOp::category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn test_disabled_categories_are_skipped() {
        let mut main = snapshot("Main", &["X"]);
        main.blocked_persons.insert(ActorUrl::from("P"));
        let alt = snapshot("Alt", &[]);

        let target = compute_target(Policy::Union, &[main, alt.clone()], "Main");
        let plan = build_plan(&alt, &target, &[Category::BlockedPersons]);
        assert_eq!(plan.ops, vec![PendingOp::BlockPerson(ActorUrl::from("P"))]);
    }

    #[test]
    fn test_plan_never_removes() {
        let main = snapshot("Main", &["X"]);
        let alt = snapshot("Alt", &["X", "Extra"]);
        let target = compute_target(Policy::CopyFromSource, &[main, alt.clone()], "Main");
        let plan = build_plan(&alt, &target, &Category::ALL);
        assert!(plan.is_empty());
        assert_eq!(plan.satisfied.len(), 1);
    }

    #[test]
    fn test_op_accessors() {
        let op = PendingOp::BlockPerson(ActorUrl::from("https://b.example/u/troll"));
        assert_eq!(op.category(), Category::BlockedPersons);
        assert_eq!(op.target(), "https://b.example/u/troll");
        assert_eq!(op.needs_resolution().map(|(_, k)| k), Some(ObjectKind::Person));
        assert_eq!(op.to_string(), "block person https://b.example/u/troll");

        let op = PendingOp::ApplySettings(SettingsRecord::default());
        assert!(op.needs_resolution().is_none());
        assert_eq!(op.target(), SETTINGS_TARGET);
    }
}
