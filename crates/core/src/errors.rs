//! Error types for the fedisync core library.
//!
//! Each phase of a run (login, state read, id resolution, mutation) has its
//! own error type derived with `thiserror`, so the orchestrator can decide per
//! phase whether a failure excludes an instance, degrades a snapshot, or only
//! fails one operation.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Remote API errors
// ---------------------------------------------------------------------------

/// Transport-level errors talking to one instance's REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error (HTTP {status}): {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// The response body did not match the expected schema.
    #[error("response parse error: {0}")]
    ParseError(String),

    /// The call did not finish within the configured bound.
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
}

// ---------------------------------------------------------------------------
// Per-phase errors
// ---------------------------------------------------------------------------

/// Login failed; the instance is excluded from the run.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No secret could be resolved for the account.
    #[error("no password configured for account '{label}'")]
    MissingCredential {
        label: String,
    },

    /// The instance answered but refused the credentials.
    #[error("login rejected for '{username}': {detail}")]
    Rejected {
        username: String,
        detail: String,
    },

    /// Network or protocol failure during login.
    #[error("login failed: {0}")]
    Api(#[from] ApiError),
}

/// Reading the current state failed after a successful login.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The site response carried no `my_user` block (token not accepted).
    #[error("site response has no user information")]
    NotLoggedIn,

    #[error("state read failed: {0}")]
    Api(#[from] ApiError),
}

/// A portable URL could not be turned into an instance-local id.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The instance answered but has no object of the requested kind.
    #[error("{kind} not found: {url}")]
    NotFound {
        kind: String,
        url: String,
    },

    #[error("resolve failed: {0}")]
    Api(#[from] ApiError),
}

/// A subscribe, block, or settings call was not applied.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The instance accepted the request but reported it did not take effect.
    #[error("remote rejected {action}: {detail}")]
    Rejected {
        action: String,
        detail: String,
    },

    #[error("{0}")]
    Api(#[from] ApiError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Two account sections share a label.
    #[error("duplicate account label '{0}'")]
    DuplicateLabel(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Fatal errors that abort a run before any mutation is attempted.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The run was started with an empty account list.
    #[error("no accounts configured")]
    NoAccounts,

    /// Every account failed to log in; there is nothing to synchronize.
    #[error("none of the {attempted} configured account(s) could be authenticated")]
    NoAuthenticatedInstances {
        attempted: usize,
    },

    /// Another run on the same engine has not finished yet.
    #[error("sync already running (started at {started_at})")]
    AlreadyRunning {
        started_at: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ApiError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 502): bad gateway");

        let err = ApiError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timed out after 1.5s");

        let err = AuthError::MissingCredential {
            label: "Alt".into(),
        };
        assert!(err.to_string().contains("'Alt'"));

        let err = ResolveError::NotFound {
            kind: "community".into(),
            url: "https://a.example/c/rust".into(),
        };
        assert_eq!(
            err.to_string(),
            "community not found: https://a.example/c/rust"
        );

        let err = SyncError::NoAuthenticatedInstances { attempted: 3 };
        assert!(err.to_string().contains("3 configured"));
    }

    #[test]
    fn test_phase_errors_wrap_api_errors() {
        let auth: AuthError = ApiError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(auth, AuthError::Api(ApiError::Timeout(_))));

        let mutation: MutationError = ApiError::ParseError("eof".into()).into();
        assert_eq!(mutation.to_string(), "response parse error: eof");
    }
}
