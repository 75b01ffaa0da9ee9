//! The capability the engine needs from one remote instance.
//!
//! [`InstanceClient`] is the only way the engine talks to the network. The
//! HTTP implementation lives in [`crate::lemmy`]; tests substitute an
//! in-memory one.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{ApiError, AuthError, MutationError, ReadError, ResolveError};
use crate::models::{ActorUrl, AuthToken, LocalId, ObjectKind, SettingsRecord};

/// Current user state as read from one instance.
///
/// A `None` collection means the response lacked that part or it could not
/// be parsed; it is not the same as an empty list.
#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    pub subscriptions: Option<Vec<ActorUrl>>,
    pub blocked_communities: Option<Vec<ActorUrl>>,
    pub blocked_persons: Option<Vec<ActorUrl>>,
    pub settings: Option<SettingsRecord>,
}

/// Authenticated reads and mutations against one instance.
///
/// Every method is a single network round trip. Callers own pacing and
/// timeouts.
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Log in and return a session token.
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken, AuthError>;

    /// Read subscriptions, blocks, and profile settings.
    async fn read_state(&self, token: &AuthToken) -> Result<RemoteState, ReadError>;

    /// Look up the instance-local id of a community or person.
    async fn resolve(
        &self,
        token: &AuthToken,
        url: &ActorUrl,
        kind: ObjectKind,
    ) -> Result<LocalId, ResolveError>;

    async fn subscribe(&self, token: &AuthToken, community: LocalId)
        -> Result<(), MutationError>;

    async fn block_community(
        &self,
        token: &AuthToken,
        community: LocalId,
    ) -> Result<(), MutationError>;

    async fn block_person(&self, token: &AuthToken, person: LocalId)
        -> Result<(), MutationError>;

    /// Overwrite the profile settings with every field set in `settings`.
    async fn save_settings(
        &self,
        token: &AuthToken,
        settings: &SettingsRecord,
    ) -> Result<(), MutationError>;
}

/// Await `call`, failing with [`ApiError::Timeout`] once `limit` has passed.
pub(crate) async fn bounded<T, E, F>(limit: Duration, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<ApiError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit).into()),
    }
}
