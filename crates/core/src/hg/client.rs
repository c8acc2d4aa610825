//! Asynchronous Mercurial CLI client.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::parser::{parse_hg_log, render_revset, LOG_TEMPLATE};
use crate::errors::HgError;
use crate::models::Changeset;
use crate::revset::Revset;
use crate::traits::Vcs;

/// Asynchronous client for reading a local Mercurial repository via the CLI.
#[derive(Debug, Clone)]
pub struct HgClient {
    repo_path: PathBuf,
    binary: String,
}

impl HgClient {
    /// Create a new client for the repository at `repo_path`, running `binary`.
    pub fn new(repo_path: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        let client = Self {
            repo_path: repo_path.into(),
            binary: binary.into(),
        };
        info!(path = %client.repo_path.display(), binary = %client.binary, "created HgClient");
        client
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    #[instrument(skip(self, revset), fields(path = %self.repo_path.display(), revset = %revset))]
    pub async fn log(&self, revset: &Revset) -> Result<Vec<Changeset>, HgError> {
        let rev = render_revset(revset);
        let output = self
            .run_hg(&["log", "--rev", &rev, "--template", LOG_TEMPLATE])
            .await?;
        let changesets = parse_hg_log(&String::from_utf8_lossy(&output))?;
        debug!(count = changesets.len(), "enumerated changesets");
        Ok(changesets)
    }

    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    pub async fn export(&self, node: &str) -> Result<Vec<u8>, HgError> {
        let rev = render_revset(&Revset::Symbol(node.to_string()));
        self.run_hg(&["export", "--git", "--rev", &rev]).await
    }

    #[instrument(skip(self, revset), fields(path = %self.repo_path.display(), revset = %revset))]
    pub async fn diff(&self, revset: &Revset) -> Result<Vec<u8>, HgError> {
        let rev = render_revset(revset);
        self.run_hg(&["diff", "--git", "--rev", &rev]).await
    }

    async fn run_hg(&self, args: &[&str]) -> Result<Vec<u8>, HgError> {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env("HGPLAIN", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("{} {}", self.binary, args.join(" ")), "running hg command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HgError::BinaryNotFound(self.binary.clone())
            } else {
                HgError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "hg command failed");
            return Err(HgError::CommandFailed { exit_code, stderr });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Vcs for HgClient {
    async fn enumerate(&self, revset: &Revset) -> Result<Vec<Changeset>, HgError> {
        self.log(revset).await
    }

    async fn diff_for(&self, node: &str) -> Result<Vec<u8>, HgError> {
        self.export(node).await
    }

    async fn diff_for_range(&self, revset: &Revset) -> Result<Vec<u8>, HgError> {
        self.diff(revset).await
    }
}
