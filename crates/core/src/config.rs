//! TOML-based configuration for fedisync.
//!
//! Passwords are normally referenced through `password_env` fields naming an
//! environment variable; the secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`]. An inline `password` is accepted for
//! setups that keep everything in one private file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::models::{Account, Category, Secret};
use crate::policy::Policy;
use crate::site_url::normalize_site_url;
use crate::sync_engine::SyncOptions;

/// Label that marks the reference account unless configured otherwise.
pub const DEFAULT_SOURCE_ACCOUNT: &str = "Main Account";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reconciliation behaviour.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Accounts to keep in step, in file order.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

// ---------------------------------------------------------------------------
// Sync behaviour
// ---------------------------------------------------------------------------

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How the target state is computed.
    #[serde(default)]
    pub policy: Policy,

    /// Label of the reference account for settings and copy-from-source.
    #[serde(default = "default_source_account")]
    pub source_account: String,

    /// Copy the reference account's profile settings to every account.
    #[serde(default = "default_true")]
    pub settings: bool,

    /// Reconcile community subscriptions.
    #[serde(default = "default_true")]
    pub subscriptions: bool,

    /// Reconcile blocked communities.
    #[serde(default = "default_true")]
    pub community_blocks: bool,

    /// Reconcile blocked users.
    #[serde(default = "default_true")]
    pub person_blocks: bool,

    /// Pause before and after every resolve or mutating call (default 250).
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Upper bound on any single network call (default 30).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Run different instances' plans at the same time.
    #[serde(default = "default_true")]
    pub concurrent: bool,
}

fn default_source_account() -> String {
    DEFAULT_SOURCE_ACCOUNT.into()
}
fn default_true() -> bool {
    true
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_call_timeout_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            source_account: default_source_account(),
            settings: true,
            subscriptions: true,
            community_blocks: true,
            person_blocks: true,
            request_delay_ms: default_request_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            concurrent: true,
        }
    }
}

impl SyncConfig {
    /// Categories switched on in this config, in plan order.
    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| match category {
                Category::Subscriptions => self.subscriptions,
                Category::BlockedCommunities => self.community_blocks,
                Category::BlockedPersons => self.person_blocks,
                Category::Settings => self.settings,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also append logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// One `[[accounts]]` section.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Unique name for this account (e.g. `Main Account`).
    pub label: String,

    /// Instance address; any path is ignored.
    pub site: String,

    /// Username or email used to log in.
    pub user: String,

    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Inline password, used when `password_env` is not given.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub resolved_password: Option<Secret>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("label", &self.label)
            .field("site", &self.site)
            .field("user", &self.user)
            .field("password_env", &self.password_env)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("resolved_password", &self.resolved_password)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!(accounts = config.accounts.len(), "configuration parsed successfully");
        Ok(config)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Resolve every account's password.
    ///
    /// An account whose variable is missing keeps `resolved_password = None`
    /// and is logged as a warning; it will fail to log in, which excludes only
    /// that account from the run.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving account passwords");

        for account in &mut self.accounts {
            account.resolved_password = match (&account.password_env, &account.password) {
                (Some(env_name), _) => {
                    let field = format!("accounts.{}.password_env", account.label);
                    resolve_optional_env(env_name, &field).map(Secret::new)
                }
                (None, Some(inline)) if !inline.is_empty() => Some(Secret::new(inline.clone())),
                _ => {
                    warn!(account = %account.label, "no password or password_env configured");
                    None
                }
            };
        }

        debug!("password resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "accounts".into(),
                detail: "at least one [[accounts]] section is required".into(),
            });
        }

        let mut seen = HashSet::new();
        for (index, account) in self.accounts.iter().enumerate() {
            if account.label.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts[{}].label", index),
                    detail: "label must not be empty".into(),
                });
            }
            if !seen.insert(account.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(account.label.clone()));
            }
            if normalize_site_url(&account.site).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts.{}.site", account.label),
                    detail: format!("'{}' does not name a host", account.site),
                });
            }
            if account.user.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts.{}.user", account.label),
                    detail: "user must not be empty".into(),
                });
            }
        }

        if self.sync.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.call_timeout_secs".into(),
                detail: "call timeout must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Accounts with normalized sites and resolved secrets, in file order.
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|account| {
                let site = normalize_site_url(&account.site)
                    .unwrap_or_else(|| account.site.trim().to_string());
                Account::new(
                    account.label.clone(),
                    site,
                    account.user.clone(),
                    account.resolved_password.clone(),
                )
            })
            .collect()
    }

    /// Engine options derived from the `[sync]` section.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            policy: self.sync.policy,
            source_label: self.sync.source_account.clone(),
            categories: self.sync.enabled_categories(),
            request_delay: Duration::from_millis(self.sync.request_delay_ms),
            call_timeout: Duration::from_secs(self.sync.call_timeout_secs),
            concurrent: self.sync.concurrent,
            dry_run: false,
        }
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[sync]
policy = "copy_from_source"
source_account = "Main Account"
settings = true
subscriptions = true
community_blocks = false
person_blocks = true
request_delay_ms = 100
call_timeout_secs = 10
concurrent = false

[logging]
level = "debug"
file = "fedisync.log"

[[accounts]]
label = "Main Account"
site = "https://sh.itjust.works"
user = "Imauser"
password_env = "FEDISYNC_TEST_MAIN_PW"

[[accounts]]
label = "Account 2"
site = "lemmy.ml/c/rust"
user = "cooluser"
password = "badpassword"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.sync.policy, Policy::CopyFromSource);
        assert_eq!(config.sync.request_delay_ms, 100);
        assert!(!config.sync.concurrent);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].label, "Main Account");
        assert_eq!(config.accounts[1].password.as_deref(), Some("badpassword"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedisync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.accounts[1].user, "cooluser");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/fedisync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = AppConfig::from_toml_str("[[accounts]]\nlabel = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_enabled_categories() {
        let config = AppConfig::from_toml_str(sample_toml()).unwrap();
        assert_eq!(
            config.sync.enabled_categories(),
            vec![
                Category::Subscriptions,
                Category::BlockedPersons,
                Category::Settings
            ]
        );
    }

    #[test]
    fn test_accounts_are_normalized() {
        let mut config = AppConfig::from_toml_str(sample_toml()).unwrap();
        config.resolve_env_vars().unwrap();
        let accounts = config.accounts();
        assert_eq!(accounts[0].site, "https://sh.itjust.works");
        assert_eq!(accounts[1].site, "https://lemmy.ml");
        assert_eq!(accounts[1].username, "cooluser");
        assert_eq!(
            accounts[1].password.as_ref().map(Secret::expose),
            Some("badpassword")
        );
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("FEDISYNC_TEST_RESOLVE_PW", "s3cret");

        let toml_str = r#"
[[accounts]]
label = "Main Account"
site = "lemmy.world"
user = "me"
password_env = "FEDISYNC_TEST_RESOLVE_PW"

[[accounts]]
label = "Alt"
site = "lemmy.ml"
user = "me"
password_env = "FEDISYNC_TEST_UNSET_PW"
"#;
        let mut config = AppConfig::from_toml_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();

        assert_eq!(
            config.accounts[0].resolved_password.as_ref().map(Secret::expose),
            Some("s3cret")
        );
        assert!(config.accounts[1].resolved_password.is_none());

        std::env::remove_var("FEDISYNC_TEST_RESOLVE_PW");
    }

    #[test]
    fn test_validate_rejects_duplicate_label() {
        let toml_str = r#"
[[accounts]]
label = "Main Account"
site = "lemmy.world"
user = "a"

[[accounts]]
label = "Main Account"
site = "lemmy.ml"
user = "b"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateLabel(ref label)) if label == "Main Account"
        ));
    }

    #[test]
    fn test_validate_rejects_no_accounts() {
        let config = AppConfig::from_toml_str("[sync]\npolicy = \"union\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "accounts"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_site() {
        let toml_str = r#"
[[accounts]]
label = "Main Account"
site = "https://"
user = "a"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "accounts.Main Account.site"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = AppConfig::from_toml_str(sample_toml()).unwrap();
        config.sync.call_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "sync.call_timeout_secs"
        ));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[[accounts]]
label = "Main Account"
site = "lemmy.world"
user = "me"
"#;
        let config = AppConfig::from_toml_str(minimal).unwrap();
        assert_eq!(config.sync.policy, Policy::Union);
        assert_eq!(config.sync.source_account, "Main Account");
        assert_eq!(config.sync.request_delay_ms, 250);
        assert_eq!(config.sync.call_timeout_secs, 30);
        assert!(config.sync.concurrent);
        assert_eq!(config.sync.enabled_categories(), Category::ALL.to_vec());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_sync_options() {
        let config = AppConfig::from_toml_str(sample_toml()).unwrap();
        let options = config.sync_options();
        assert_eq!(options.request_delay, Duration::from_millis(100));
        assert_eq!(options.call_timeout, Duration::from_secs(10));
        assert_eq!(options.source_label, "Main Account");
        assert!(!options.dry_run);
    }

    #[test]
    fn test_debug_hides_inline_password() {
        let config = AppConfig::from_toml_str(sample_toml()).unwrap();
        let debug = format!("{:?}", config.accounts[1]);
        assert!(!debug.contains("badpassword"));
    }
}
