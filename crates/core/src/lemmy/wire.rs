//! Request and response records for the Lemmy v3 REST API.
//!
//! The `/site` response is projected category by category: a missing or
//! malformed `follows` list degrades only subscriptions, never the whole read.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::RemoteState;
use crate::errors::ReadError;
use crate::models::{ActorUrl, ListingType, SettingsRecord};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username_or_email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FollowCommunity<'a> {
    pub community_id: i64,
    pub follow: bool,
    pub auth: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BlockCommunity<'a> {
    pub community_id: i64,
    pub block: bool,
    pub auth: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BlockPerson<'a> {
    pub person_id: i64,
    pub block: bool,
    pub auth: &'a str,
}

/// Settings payload: every set field of the record plus the session token.
#[derive(Debug, Serialize)]
pub struct SaveUserSettings<'a> {
    #[serde(flatten)]
    pub settings: &'a SettingsRecord,
    pub auth: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActorRef {
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommunityFollowerView {
    pub community: ActorRef,
}

#[derive(Debug, Deserialize)]
pub struct CommunityBlockView {
    pub community: ActorRef,
}

#[derive(Debug, Deserialize)]
pub struct PersonBlockView {
    pub target: ActorRef,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedCommunity {
    pub community: IdRef,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedPerson {
    pub person: IdRef,
}

#[derive(Debug, Deserialize)]
pub struct ResolveObjectResponse {
    #[serde(default)]
    pub community: Option<ResolvedCommunity>,
    #[serde(default)]
    pub person: Option<ResolvedPerson>,
}

#[derive(Debug, Deserialize)]
pub struct CommunityView {
    #[serde(default)]
    pub subscribed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommunityResponse {
    #[serde(default)]
    pub community_view: Option<CommunityView>,
}

#[derive(Debug, Deserialize)]
pub struct BlockResponse {
    #[serde(default)]
    pub blocked: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub show_nsfw: Option<bool>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub default_sort_type: Option<String>,
    #[serde(default)]
    pub default_listing_type: Option<String>,
    #[serde(default)]
    pub interface_language: Option<String>,
    #[serde(default)]
    pub show_avatars: Option<bool>,
    #[serde(default)]
    pub send_notifications_to_email: Option<bool>,
    #[serde(default)]
    pub show_scores: Option<bool>,
    #[serde(default)]
    pub show_bot_accounts: Option<bool>,
    #[serde(default)]
    pub show_read_posts: Option<bool>,
    #[serde(default)]
    pub show_new_post_notifs: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub matrix_user_id: Option<String>,
    #[serde(default)]
    pub bot_account: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LocalUserView {
    pub local_user: LocalUser,
    #[serde(default)]
    pub person: Person,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a `GET /site` response body into a [`RemoteState`].
pub fn parse_site_response(body: &serde_json::Value) -> Result<RemoteState, ReadError> {
    let my_user = body
        .get("my_user")
        .filter(|v| v.is_object())
        .ok_or(ReadError::NotLoggedIn)?;

    let subscriptions = field::<Vec<CommunityFollowerView>>(my_user, "follows").map(|views| {
        views
            .into_iter()
            .map(|v| ActorUrl::new(v.community.actor_id))
            .collect()
    });

    let blocked_communities =
        field::<Vec<CommunityBlockView>>(my_user, "community_blocks").map(|views| {
            views
                .into_iter()
                .map(|v| ActorUrl::new(v.community.actor_id))
                .collect()
        });

    let blocked_persons = field::<Vec<PersonBlockView>>(my_user, "person_blocks").map(|views| {
        views
            .into_iter()
            .map(|v| ActorUrl::new(v.target.actor_id))
            .collect()
    });

    let discussion_languages = field::<Vec<i64>>(my_user, "discussion_languages");
    let settings = field::<LocalUserView>(my_user, "local_user_view")
        .map(|view| settings_from_view(view, discussion_languages));

    Ok(RemoteState {
        subscriptions,
        blocked_communities,
        blocked_persons,
        settings,
    })
}

fn field<T: DeserializeOwned>(parent: &serde_json::Value, key: &str) -> Option<T> {
    let value = parent.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field = key, error = %e, "ignoring malformed field");
            None
        }
    }
}

fn settings_from_view(view: LocalUserView, discussion_languages: Option<Vec<i64>>) -> SettingsRecord {
    let LocalUserView { local_user, person } = view;
    SettingsRecord {
        show_nsfw: local_user.show_nsfw,
        show_scores: local_user.show_scores,
        theme: local_user.theme,
        interface_language: local_user.interface_language,
        avatar: person.avatar,
        banner: person.banner,
        display_name: person.display_name,
        email: local_user.email,
        bio: person.bio,
        matrix_user_id: person.matrix_user_id,
        show_avatars: local_user.show_avatars,
        send_notifications_to_email: local_user.send_notifications_to_email,
        bot_account: person.bot_account,
        show_bot_accounts: local_user.show_bot_accounts,
        show_read_posts: local_user.show_read_posts,
        show_new_post_notifs: local_user.show_new_post_notifs,
        default_listing_type: local_user
            .default_listing_type
            .as_deref()
            .and_then(parse_listing_type),
        default_sort_type: local_user.default_sort_type,
        discussion_languages,
    }
}

fn parse_listing_type(value: &str) -> Option<ListingType> {
    match value {
        "All" => Some(ListingType::All),
        "Local" => Some(ListingType::Local),
        "Subscribed" => Some(ListingType::Subscribed),
        _ => None,
    }
}
