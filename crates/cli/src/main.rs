//! rbhook: Mercurial hook entry point.
//!
//! Installed as a `pushkey` hook, it mirrors every pushed bookmark into
//! Review Board. The `changegroup` subcommand covers pushes that deliver
//! changesets without moving a bookmark; `reconcile` and `validate` are for
//! operators.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use rbhook_core::config::AppConfig;
use rbhook_core::hook::run_pushkey;
use rbhook_core::models::ReviewRequest;
use rbhook_core::{HgClient, HookEvent, Reconciler, ReviewBoardClient};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Mirror Mercurial bookmarks into Review Board review requests.
#[derive(Parser, Debug)]
#[command(
    name = "rbhook",
    version,
    about = "Mercurial hook that keeps Review Board in sync with pushed bookmarks"
)]
struct Cli {
    /// Path to the TOML configuration file. Without it, settings come from
    /// RB_URL, RB_USERNAME, RB_PASSWORD and RB_REPOSITORY.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Handle a pushkey event (reads HG_NAMESPACE, HG_KEY, HG_OLD, HG_NEW).
    Pushkey,

    /// Handle a changegroup event (reads HG_NODE).
    Changegroup {
        /// Branch recorded on the created review requests.
        #[arg(long, default_value = "default")]
        branch: String,
    },

    /// Reconcile a bookmark by hand, without the event guard.
    Reconcile {
        /// Bookmark to reconcile.
        bookmark: String,
    },

    /// Validate the configuration and print a summary.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = init_tracing();

    match run(cli, log_level).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, log_level: LogLevel) -> Result<()> {
    if let Commands::Validate = cli.command {
        return cmd_validate(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    log_level.apply(&config.hook.log_level);

    match cli.command {
        Commands::Pushkey => cmd_pushkey(&config).await,
        Commands::Changegroup { branch } => cmd_changegroup(&config, &branch).await,
        Commands::Reconcile { bookmark } => cmd_reconcile(&config, &bookmark).await,
        Commands::Validate => unreachable!(),
    }
}

/// Default filter until the configuration has been read.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Handle for swapping in the configured level once it is known.
/// `None` when `RUST_LOG` is set, which always wins.
struct LogLevel(Option<reload::Handle<EnvFilter, Registry>>);

impl LogLevel {
    fn apply(&self, level: &str) {
        let Some(handle) = &self.0 else {
            return;
        };
        if let Err(e) = handle.reload(EnvFilter::new(level)) {
            warn!(level, error = %e, "could not apply configured log level");
        }
    }
}

/// Log to stderr so stdout only carries the review request line.
fn init_tracing() -> LogLevel {
    let from_env = EnvFilter::try_from_default_env().ok();
    let overridden = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
    LogLevel((!overridden).then_some(handle))
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_and_resolve(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let config =
                AppConfig::from_env().context("failed to read configuration from environment")?;
            config.validate().context("invalid configuration")?;
            Ok(config)
        }
    }
}

fn review_board(config: &AppConfig) -> Result<ReviewBoardClient> {
    let rb = &config.reviewboard;
    let password = rb
        .password
        .clone()
        .with_context(|| format!("{} is not set", rb.password_env))?;
    ReviewBoardClient::new(&rb.url, &rb.username, password, rb.repository)
        .context("failed to build Review Board client")
}

/// Build the clients and confirm the credentials before touching the
/// repository.
async fn connect(config: &AppConfig) -> Result<(HgClient, ReviewBoardClient)> {
    let reviews = review_board(config)?;
    reviews
        .check_session()
        .await
        .context("Review Board login failed")?;
    let hg = HgClient::new(&config.hg.repo_path, &config.hg.binary);
    info!(
        url = reviews.url(),
        repository = reviews.repository(),
        repo_path = %hg.repo_path().display(),
        "connected"
    );
    Ok((hg, reviews))
}

fn announce(request: &ReviewRequest) {
    println!("Code Review Request: {}", request.absolute_url);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_pushkey(config: &AppConfig) -> Result<()> {
    let event = HookEvent::from_env();
    debug!(?event, "pushkey event");
    if event.bookmark(&config.hg.stable_bookmark).is_none() {
        return Ok(());
    }

    let (hg, reviews) = connect(config).await?;
    let reconciler = Reconciler::new(&hg, &reviews, config.reconcile_options());
    if let Some(request) = run_pushkey(&event, &reconciler)
        .await
        .with_context(|| format!("failed to reconcile bookmark {}", event.key))?
    {
        announce(&request);
    }
    Ok(())
}

async fn cmd_changegroup(config: &AppConfig, branch: &str) -> Result<()> {
    let node = std::env::var("HG_NODE").context("HG_NODE is not set")?;
    info!(node = %node, branch, "changegroup event");

    let (hg, reviews) = connect(config).await?;
    let reconciler = Reconciler::new(&hg, &reviews, config.reconcile_options());
    let requests = reconciler
        .sync_incoming(&node, branch)
        .await
        .with_context(|| format!("failed to sync changesets from {}", node))?;
    for request in &requests {
        announce(request);
    }
    Ok(())
}

async fn cmd_reconcile(config: &AppConfig, bookmark: &str) -> Result<()> {
    let (hg, reviews) = connect(config).await?;
    let reconciler = Reconciler::new(&hg, &reviews, config.reconcile_options());
    match reconciler
        .reconcile(bookmark)
        .await
        .with_context(|| format!("failed to reconcile bookmark {}", bookmark))?
    {
        Some(request) => announce(&request),
        None => eprintln!(
            "{}",
            style::dim(&format!("{} has no changesets beyond the stable line", bookmark))
        ),
    }
    Ok(())
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            println!("Validating configuration: {}", path.display());
            let mut config =
                AppConfig::load_from_file(path).context("failed to parse configuration")?;
            println!("  {}", style::success("TOML structure is valid"));
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables")?;
            config
        }
        None => {
            println!("Validating configuration from environment");
            AppConfig::from_env().context("failed to read configuration from environment")?
        }
    };
    println!("  {}", style::success("Environment variable references processed"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    // Never echo the password itself.
    let password_set = config.reviewboard.password.take().is_some();

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Review Board  : {}", config.reviewboard.url);
    println!("  Username      : {}", config.reviewboard.username);
    println!(
        "  Password      : {}",
        style::presence(password_set, "NOT SET")
    );
    println!("  Repository ID : {}", config.reviewboard.repository);
    println!("  Hg repository : {}", config.hg.repo_path.display());
    println!("  Stable line   : {}", config.hg.stable_bookmark);
    println!("  Squash policy : {}", config.reconcile.squash_policy);
    if let Some(bugs) = &config.reviewboard.bugs_closed {
        println!("  Bugs closed   : {}", bugs);
    }
    println!();
    println!("Configuration is valid.");

    Ok(())
}
