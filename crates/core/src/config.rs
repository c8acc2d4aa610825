//! TOML-based configuration for rbhook.
//!
//! The Review Board password is stored as a `password_env` field that names
//! an environment variable. The actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::models::SquashPolicy;
use crate::reconciler::ReconcileOptions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hook process settings.
    #[serde(default)]
    pub hook: HookConfig,

    /// Mercurial repository settings.
    #[serde(default)]
    pub hg: HgConfig,

    /// Review Board server settings.
    pub reviewboard: ReviewBoardConfig,

    /// Reconciliation behaviour.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

// ---------------------------------------------------------------------------
// Hook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mercurial
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HgConfig {
    /// Repository root. Hooks run with the repository as working directory,
    /// so the default is `.`.
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Mercurial executable.
    #[serde(default = "default_hg_binary")]
    pub binary: String,

    /// Bookmark marking the stable line.
    #[serde(default = "default_stable_bookmark")]
    pub stable_bookmark: String,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}
fn default_hg_binary() -> String {
    "hg".into()
}
fn default_stable_bookmark() -> String {
    "master".into()
}

impl Default for HgConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            binary: default_hg_binary(),
            stable_bookmark: default_stable_bookmark(),
        }
    }
}

// ---------------------------------------------------------------------------
// Review Board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBoardConfig {
    /// Server root URL (e.g. `https://reviews.example.com`).
    pub url: String,

    pub username: String,

    /// Environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Numeric ID of the repository registered in Review Board.
    pub repository: u64,

    /// Written to every draft's `bugs_closed` field when set.
    #[serde(default)]
    pub bugs_closed: Option<String>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_password_env() -> String {
    "RB_PASSWORD".into()
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// What to do with single-changeset bookmarks.
    #[serde(default)]
    pub squash_policy: SquashPolicy,
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
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Build a configuration purely from `RB_URL`, `RB_USERNAME`,
    /// `RB_PASSWORD` and `RB_REPOSITORY`, for hooks installed without a
    /// config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = require_env("RB_URL", "reviewboard.url")?;
        let username = require_env("RB_USERNAME", "reviewboard.username")?;
        let password = require_env("RB_PASSWORD", "reviewboard.password_env")?;
        let repository = require_env("RB_REPOSITORY", "reviewboard.repository")?;
        let repository = repository
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "reviewboard.repository".into(),
                detail: format!("RB_REPOSITORY must be a number: {}", e),
            })?;

        Ok(Self {
            hook: HookConfig::default(),
            hg: HgConfig::default(),
            reviewboard: ReviewBoardConfig {
                url,
                username,
                password_env: default_password_env(),
                repository,
                bugs_closed: None,
                password: Some(password),
            },
            reconcile: ReconcileConfig::default(),
        })
    }

    /// Resolve `reviewboard.password_env` into `reviewboard.password`.
    ///
    /// A missing variable logs a warning but does not fail here;
    /// [`validate`](Self::validate) rejects a config without a password.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.reviewboard.password =
            resolve_optional_env(&self.reviewboard.password_env, "reviewboard.password_env");
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reviewboard.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "reviewboard.url".into(),
                detail: "Review Board URL must not be empty".into(),
            });
        }
        if !self.reviewboard.url.starts_with("http://")
            && !self.reviewboard.url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "reviewboard.url".into(),
                detail: "Review Board URL must start with http:// or https://".into(),
            });
        }
        if self.reviewboard.username.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "reviewboard.username".into(),
                detail: "Review Board username must not be empty".into(),
            });
        }
        if self.reviewboard.password.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.reviewboard.password_env.clone(),
                field: "reviewboard.password_env".into(),
            });
        }
        if self.reviewboard.repository == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reviewboard.repository".into(),
                detail: "repository ID must be > 0".into(),
            });
        }
        if self.hg.stable_bookmark.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "hg.stable_bookmark".into(),
                detail: "stable bookmark must not be empty".into(),
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

    /// Options handed to the reconciler.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            stable_bookmark: self.hg.stable_bookmark.clone(),
            squash_policy: self.reconcile.squash_policy,
            bugs_closed: self.reviewboard.bugs_closed.clone(),
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

fn require_env(env_name: &str, field: &str) -> Result<String, ConfigError> {
    resolve_optional_env(env_name, field).ok_or_else(|| ConfigError::EnvVarMissing {
        var: env_name.into(),
        field: field.into(),
    })
}
