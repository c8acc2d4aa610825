//! Error types for the rbhook core library.
//!
//! Each collaborator has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Hg(#[from] HgError),

    #[error(transparent)]
    ReviewBoard(#[from] ReviewBoardError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Mercurial errors
// ---------------------------------------------------------------------------

/// Errors from `hg` CLI operations.
#[derive(Debug, Error)]
pub enum HgError {
    /// The `hg` binary was not found on `$PATH`.
    #[error("hg binary not found: {0}")]
    BinaryNotFound(String),

    /// An `hg` command exited with a non-zero status.
    #[error("hg command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Could not parse the templated output produced by `hg log`.
    #[error("failed to parse hg log output: {0}")]
    ParseError(String),

    /// Generic I/O wrapper.
    #[error("hg I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Review Board API errors
// ---------------------------------------------------------------------------

/// Errors from Review Board Web API interactions.
#[derive(Debug, Error)]
pub enum ReviewBoardError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("Review Board HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("Review Board API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// Credentials were rejected.
    #[error("Review Board authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A review request with this commit-id already exists.
    #[error("review request for commit-id '{commit_id}' already exists")]
    Conflict { commit_id: String },

    /// A review request that was just written could not be read back.
    #[error("review request for commit-id '{0}' not found")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Reconciliation errors
// ---------------------------------------------------------------------------

/// Errors from resolving a bookmark and reconciling its review requests.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The stable line itself was passed in for reconciliation.
    #[error("refusing to reconcile the stable bookmark '{0}'")]
    StableBookmark(String),

    /// The stable line tip could not be resolved to a changeset.
    #[error("stable bookmark '{0}' does not resolve to a changeset")]
    MissingStableTip(String),

    /// Underlying hg error.
    #[error("reconcile hg error: {0}")]
    Hg(#[from] HgError),

    /// Underlying Review Board error.
    #[error("reconcile Review Board error: {0}")]
    ReviewBoard(#[from] ReviewBoardError),
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

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
