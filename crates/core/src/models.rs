//! Domain model types used throughout fedisync.
//!
//! Identity across instances is the actor URL ([`ActorUrl`]); numeric ids
//! ([`LocalId`]) are only meaningful on the instance that issued them and are
//! never compared across instances.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A credential that never shows up in `Debug`/`Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building a login request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Session token returned by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(****)")
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// One configured account: who to log in as, and where.
///
/// The site is already normalized to an `https://host` origin. The password
/// is `None` when its environment variable could not be resolved.
#[derive(Debug, Clone)]
pub struct Account {
    pub label: String,
    pub site: String,
    pub username: String,
    pub password: Option<Secret>,
}

impl Account {
    pub fn new(
        label: impl Into<String>,
        site: impl Into<String>,
        username: impl Into<String>,
        password: Option<Secret>,
    ) -> Self {
        Self {
            label: label.into(),
            site: site.into(),
            username: username.into(),
            password,
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Federation-wide actor URL of a community or person.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorUrl(String);

impl ActorUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorUrl {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Numeric id issued by one instance. Only valid on that instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a portable URL is expected to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Community,
    Person,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Community => write!(f, "community"),
            Self::Person => write!(f, "person"),
        }
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// The kinds of user state that get reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Subscriptions,
    BlockedCommunities,
    BlockedPersons,
    Settings,
}

impl Category {
    /// Every category, in plan order.
    pub const ALL: [Category; 4] = [
        Category::Subscriptions,
        Category::BlockedCommunities,
        Category::BlockedPersons,
        Category::Settings,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscriptions => write!(f, "subscriptions"),
            Self::BlockedCommunities => write!(f, "blocked_communities"),
            Self::BlockedPersons => write!(f, "blocked_persons"),
            Self::Settings => write!(f, "settings"),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile settings
// ---------------------------------------------------------------------------

/// Default front-page listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingType {
    All,
    Local,
    Subscribed,
}

/// Profile settings as read from one instance and written to another.
///
/// Unset fields are left untouched on the target. `avatar` and `banner` are
/// carried for display only: they reference images hosted on the source
/// instance, so they are neither compared nor sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_nsfw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_scores: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_language: Option<String>,
    #[serde(default, skip_serializing)]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing)]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_avatars: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_notifications_to_email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_account: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_bot_accounts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_read_posts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_new_post_notifs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_listing_type: Option<ListingType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sort_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_languages: Option<Vec<i64>>,
}

impl PartialEq for SettingsRecord {
    fn eq(&self, other: &Self) -> bool {
        self.show_nsfw == other.show_nsfw
            && self.show_scores == other.show_scores
            && self.theme == other.theme
            && self.interface_language == other.interface_language
            && self.display_name == other.display_name
            && self.email == other.email
            && self.bio == other.bio
            && self.matrix_user_id == other.matrix_user_id
            && self.show_avatars == other.show_avatars
            && self.send_notifications_to_email == other.send_notifications_to_email
            && self.bot_account == other.bot_account
            && self.show_bot_accounts == other.show_bot_accounts
            && self.show_read_posts == other.show_read_posts
            && self.show_new_post_notifs == other.show_new_post_notifs
            && self.default_listing_type == other.default_listing_type
            && self.default_sort_type == other.default_sort_type
            && self.discussion_languages == other.discussion_languages
    }
}

impl Eq for SettingsRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> SettingsRecord {
        SettingsRecord {
            show_nsfw: Some(false),
            theme: Some("darkly".into()),
            avatar: Some("https://a.example/pictrs/image/me.png".into()),
            display_name: Some("Me".into()),
            default_listing_type: Some(ListingType::Subscribed),
            default_sort_type: Some("Hot".into()),
            discussion_languages: Some(vec![0, 37]),
            ..Default::default()
        }
    }

    #[test]
    fn test_secret_is_redacted() {
        let account = Account::new(
            "Main Account",
            "https://a.example",
            "me",
            Some(Secret::new("hunter2")),
        );
        let debug = format!("{:?}", account);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("Secret(****)"));
        assert_eq!(Secret::new("hunter2").to_string(), "****");
        assert!(!format!("{:?}", AuthToken::new("jwt.value")).contains("jwt"));
    }

    #[test]
    fn test_actor_url_ordering_is_lexicographic() {
        let mut urls = vec![
            ActorUrl::from("https://b.example/c/z"),
            ActorUrl::from("https://a.example/c/y"),
            ActorUrl::from("https://a.example/c/x"),
        ];
        urls.sort();
        let strs: Vec<&str> = urls.iter().map(ActorUrl::as_str).collect();
        assert_eq!(
            strs,
            vec![
                "https://a.example/c/x",
                "https://a.example/c/y",
                "https://b.example/c/z"
            ]
        );
    }

    #[test]
    fn test_settings_equal_to_itself() {
        let settings = sample_settings();
        assert_eq!(settings, settings.clone());
    }

    #[test]
    fn test_settings_equality_ignores_images() {
        let a = sample_settings();
        let mut b = sample_settings();
        b.avatar = Some("https://b.example/pictrs/image/other.png".into());
        b.banner = Some("https://b.example/pictrs/image/banner.png".into());
        assert_eq!(a, b);

        b.theme = Some("litely".into());
        assert_ne!(a, b);
    }

    #[test]
    fn test_settings_payload_omits_unset_and_images() {
        let json = serde_json::to_value(sample_settings()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["theme"], "darkly");
        assert_eq!(obj["default_listing_type"], "Subscribed");
        assert!(!obj.contains_key("avatar"));
        assert!(!obj.contains_key("banner"));
        assert!(!obj.contains_key("bio"));
        assert!(!obj.contains_key("auth"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::BlockedPersons.to_string(), "blocked_persons");
        assert_eq!(Category::ALL.len(), 4);
    }
}
