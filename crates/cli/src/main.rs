//! fedisync command-line tool.
//!
//! Keeps subscriptions, blocks, and profile settings in step across Lemmy
//! accounts on different instances. Provides subcommands to run a sync,
//! write a starter configuration, and validate a configuration file.

mod render;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use fedisync_core::client::InstanceClient;
use fedisync_core::config::AppConfig;
use fedisync_core::lemmy::LemmyClient;
use fedisync_core::policy::Policy;
use fedisync_core::sync_engine::{AccountClient, SyncEngine};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// fedisync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "fedisync",
    version,
    about = "Reconcile subscriptions, blocks, and settings across Lemmy accounts"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./fedisync.toml")]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile every configured account.
    Sync {
        /// Read state and print the plans without changing anything.
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Override the configured policy.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Generate a starter configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./fedisync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Union,
    CopyFromSource,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Union => Policy::Union,
            PolicyArg::CopyFromSource => Policy::CopyFromSource,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => {
            let _guard = init_logging(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_init(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let _guard = init_logging(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_validate(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync {
            dry_run,
            json,
            policy,
        } => {
            let config = load_config(&cli.config)?;
            let level = cli
                .log_level
                .as_deref()
                .unwrap_or(&config.logging.level)
                .to_string();
            let _guard = init_logging(&level, config.logging.file.as_deref())?;
            cmd_sync(&config, dry_run, json, policy).await
        }
    }
}

// ---------------------------------------------------------------------------
// Logging & config helpers
// ---------------------------------------------------------------------------

/// Install the global subscriber: stderr always, plus an appending file
/// writer when `file` is set. The returned guard flushes the file writer on
/// drop and must be held until exit.
fn init_logging(level: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // RUST_LOG, when set, wins over both the flag and the config.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut guard = None;
    let file_layer = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir).context("failed to create log directory")?;

            let (writer, file_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            guard = Some(file_guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(guard)
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_sync(
    config: &AppConfig,
    dry_run: bool,
    json: bool,
    policy: Option<PolicyArg>,
) -> Result<ExitCode> {
    let mut options = config.sync_options();
    options.dry_run = dry_run;
    if let Some(policy) = policy {
        options.policy = policy.into();
    }

    let accounts: Vec<AccountClient> = config
        .accounts()
        .into_iter()
        .map(|account| {
            let client: Arc<dyn InstanceClient> =
                Arc::new(LemmyClient::new(account.site.clone(), options.call_timeout));
            AccountClient::new(account, client)
        })
        .collect();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        accounts = accounts.len(),
        "fedisync starting"
    );

    let engine = SyncEngine::with_tracing(options);
    let report = match engine.run(accounts).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", style::error(&format!("sync aborted: {}", e)));
            return Ok(ExitCode::FAILURE);
        }
    };

    if json {
        let out = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{}", out);
    } else {
        render::print_report(&report);
    }

    Ok(ExitCode::SUCCESS)
}

const STARTER_CONFIG: &str = r#"# fedisync configuration
#
# Every [[accounts]] entry is one login on one instance. Labels must be
# unique. The account named by sync.source_account provides the profile
# settings copied to the others (and, with policy = "copy_from_source",
# the subscriptions and blocks).

[sync]
policy = "union"                 # or "copy_from_source"
source_account = "Main Account"
subscriptions = true
community_blocks = true
person_blocks = true
settings = true
request_delay_ms = 250           # pause before and after every call
call_timeout_secs = 30
concurrent = true                # sync different instances in parallel

[logging]
level = "info"
# file = "fedisync.log"

[[accounts]]
label = "Main Account"
site = "https://lemmy.world"
user = "my_username"
password_env = "FEDISYNC_MAIN_PASSWORD"

[[accounts]]
label = "Alt"
site = "https://lemmy.ml"
user = "my_username"
password_env = "FEDISYNC_ALT_PASSWORD"
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, STARTER_CONFIG).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Starter configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Edit the accounts in the config file");
    println!("  2. Export the referenced password variables (FEDISYNC_MAIN_PASSWORD, ...)");
    println!("  3. Validate with: fedisync --config {} validate", output.display());
    println!("  4. Preview with:  fedisync --config {} sync --dry-run", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  {}", style::success("Password references processed"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    println!();
    println!("{}", style::header("Configuration summary"));
    println!("  Policy        : {}", config.sync.policy);
    println!("  Source account: {}", config.sync.source_account);
    let categories: Vec<String> = config
        .sync
        .enabled_categories()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  Categories    : {}", categories.join(", "));
    println!("  Request delay : {}ms", config.sync.request_delay_ms);
    println!("  Call timeout  : {}s", config.sync.call_timeout_secs);
    println!();

    let has_source = config
        .accounts
        .iter()
        .any(|a| a.label == config.sync.source_account);
    for account in config.accounts() {
        let password = if account.password.is_some() {
            style::dim("password set")
        } else {
            style::warn("password NOT SET")
        };
        println!(
            "  {} {} as {} · {}",
            style::account(&account.label),
            account.site,
            account.username,
            password
        );
    }
    if !has_source {
        println!();
        println!(
            "  {}",
            style::warn(&format!(
                "no account is labelled '{}'; settings will not be synchronized",
                config.sync.source_account
            ))
        );
    }

    println!();
    println!("Configuration is valid.");
    Ok(())
}
