//! Lemmy v3 REST API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::client::{InstanceClient, RemoteState};
use crate::errors::{ApiError, AuthError, MutationError, ReadError, ResolveError};
use crate::models::{ActorUrl, AuthToken, LocalId, ObjectKind, SettingsRecord};
use crate::site_url::api_base_url;

use super::wire;

/// Longest error body kept in an [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Asynchronous client for one Lemmy instance.
#[derive(Clone)]
pub struct LemmyClient {
    http: reqwest::Client,
    site: String,
    api_url: String,
}

impl LemmyClient {
    /// Create a client for an `https://host` site origin.
    pub fn new(site: impl Into<String>, timeout: Duration) -> Self {
        let site = site.into().trim_end_matches('/').to_string();
        let api_url = api_base_url(&site);
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fedisync/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        info!(api_url = %api_url, "created LemmyClient");
        Self {
            http,
            site,
            api_url,
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &AuthToken,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.api_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token.expose())
            .query(query)
            .send()
            .await
            .map_err(scrub)?;
        let resp = check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.without_url().to_string()))
    }

    async fn send_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        token: Option<&AuthToken>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self.http.request(method, &url).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token.expose());
        }
        let resp = check_response(req.send().await.map_err(scrub)?).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.without_url().to_string()))
    }
}

#[async_trait]
impl InstanceClient for LemmyClient {
    #[instrument(skip(self, password), fields(site = %self.site))]
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken, AuthError> {
        let body = wire::LoginRequest {
            username_or_email: username,
            password,
        };
        let result: Result<wire::LoginResponse, ApiError> = self
            .send_json(reqwest::Method::POST, "/user/login", &body, None)
            .await;

        match result {
            Ok(wire::LoginResponse { jwt: Some(jwt) }) if !jwt.is_empty() => {
                debug!("login succeeded");
                Ok(AuthToken::new(jwt))
            }
            Ok(_) => Err(AuthError::Rejected {
                username: username.to_string(),
                detail: "no token in login response".into(),
            }),
            Err(ApiError::Status { status, body }) if is_client_error(status) => {
                Err(AuthError::Rejected {
                    username: username.to_string(),
                    detail: format!("HTTP {}: {}", status, body),
                })
            }
            Err(e) => Err(AuthError::Api(e)),
        }
    }

    #[instrument(skip(self, token), fields(site = %self.site))]
    async fn read_state(&self, token: &AuthToken) -> Result<RemoteState, ReadError> {
        let body: serde_json::Value = self
            .get_json("/site", &[("auth", token.expose())], token)
            .await?;
        let state = wire::parse_site_response(&body)?;
        debug!(
            follows = state.subscriptions.as_ref().map(Vec::len),
            community_blocks = state.blocked_communities.as_ref().map(Vec::len),
            person_blocks = state.blocked_persons.as_ref().map(Vec::len),
            "read site response"
        );
        Ok(state)
    }

    #[instrument(skip(self, token), fields(site = %self.site))]
    async fn resolve(
        &self,
        token: &AuthToken,
        url: &ActorUrl,
        kind: ObjectKind,
    ) -> Result<LocalId, ResolveError> {
        let not_found = || ResolveError::NotFound {
            kind: kind.to_string(),
            url: url.to_string(),
        };

        let resp: wire::ResolveObjectResponse = match self
            .get_json(
                "/resolve_object",
                &[("q", url.as_str()), ("auth", token.expose())],
                token,
            )
            .await
        {
            Ok(resp) => resp,
            Err(ApiError::Status { status, .. })
                if status == StatusCode::BAD_REQUEST.as_u16()
                    || status == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Err(not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let id = match kind {
            ObjectKind::Community => resp.community.map(|c| c.community.id),
            ObjectKind::Person => resp.person.map(|p| p.person.id),
        };
        let id = id.ok_or_else(not_found)?;
        debug!(id, "resolved");
        Ok(LocalId(id))
    }

    #[instrument(skip(self, token), fields(site = %self.site))]
    async fn subscribe(&self, token: &AuthToken, community: LocalId) -> Result<(), MutationError> {
        let body = wire::FollowCommunity {
            community_id: community.0,
            follow: true,
            auth: token.expose(),
        };
        let resp: wire::CommunityResponse = self
            .send_json(reqwest::Method::POST, "/community/follow", &body, Some(token))
            .await?;
        match resp.community_view.and_then(|v| v.subscribed) {
            Some(state) if state == "NotSubscribed" => Err(MutationError::Rejected {
                action: "subscribe".into(),
                detail: format!("community {} still reports {}", community, state),
            }),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, token), fields(site = %self.site))]
    async fn block_community(
        &self,
        token: &AuthToken,
        community: LocalId,
    ) -> Result<(), MutationError> {
        let body = wire::BlockCommunity {
            community_id: community.0,
            block: true,
            auth: token.expose(),
        };
        let resp: wire::BlockResponse = self
            .send_json(reqwest::Method::POST, "/community/block", &body, Some(token))
            .await?;
        check_blocked(resp, "block community", community)
    }

    #[instrument(skip(self, token), fields(site = %self.site))]
    async fn block_person(&self, token: &AuthToken, person: LocalId) -> Result<(), MutationError> {
        let body = wire::BlockPerson {
            person_id: person.0,
            block: true,
            auth: token.expose(),
        };
        let resp: wire::BlockResponse = self
            .send_json(reqwest::Method::POST, "/user/block", &body, Some(token))
            .await?;
        check_blocked(resp, "block person", person)
    }

    #[instrument(skip(self, token, settings), fields(site = %self.site))]
    async fn save_settings(
        &self,
        token: &AuthToken,
        settings: &SettingsRecord,
    ) -> Result<(), MutationError> {
        let body = wire::SaveUserSettings {
            settings,
            auth: token.expose(),
        };
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                "/user/save_user_settings",
                &body,
                Some(token),
            )
            .await?;
        Ok(())
    }
}

fn check_blocked(
    resp: wire::BlockResponse,
    action: &str,
    id: LocalId,
) -> Result<(), MutationError> {
    match resp.blocked {
        Some(false) => Err(MutationError::Rejected {
            action: action.into(),
            detail: format!("id {} reported as not blocked", id),
        }),
        _ => Ok(()),
    }
}

/// Drop the request URL from a transport error. The session token travels
/// in the query string, so the URL must never reach an error message.
fn scrub(e: reqwest::Error) -> ApiError {
    ApiError::from(e.without_url())
}

fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body: truncate(body.trim(), MAX_ERROR_BODY),
    })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_check_blocked() {
        let ok = wire::BlockResponse {
            blocked: Some(true),
        };
        assert!(check_blocked(ok, "block person", LocalId(3)).is_ok());

        let missing = wire::BlockResponse { blocked: None };
        assert!(check_blocked(missing, "block person", LocalId(3)).is_ok());

        let refused = wire::BlockResponse {
            blocked: Some(false),
        };
        assert!(matches!(
            check_blocked(refused, "block person", LocalId(3)),
            Err(MutationError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_carry_the_token() {
        let client = LemmyClient::new("https://127.0.0.1:1", Duration::from_secs(5));
        let token = AuthToken::new("SECRETJWTVALUE");

        let err = client.read_state(&token).await.unwrap_err().to_string();
        assert!(!err.contains("SECRETJWTVALUE"), "leaked: {}", err);
        assert!(!err.contains("auth="), "leaked: {}", err);

        let url = ActorUrl::new("https://lemmy.ml/c/rust");
        let err = client
            .resolve(&token, &url, ObjectKind::Community)
            .await
            .unwrap_err()
            .to_string();
        assert!(!err.contains("SECRETJWTVALUE"), "leaked: {}", err);

        let err = client
            .subscribe(&token, LocalId(7))
            .await
            .unwrap_err()
            .to_string();
        assert!(!err.contains("SECRETJWTVALUE"), "leaked: {}", err);
    }

    #[test]
    fn test_client_urls() {
        let client = LemmyClient::new("https://lemmy.ml/", Duration::from_secs(5));
        assert_eq!(client.site(), "https://lemmy.ml");
        assert_eq!(client.api_url, "https://lemmy.ml/api/v3");
    }
}
