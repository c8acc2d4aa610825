//! Collaborator seams consumed by the resolver and the reconciler.
//!
//! [`HgClient`](crate::hg::HgClient) and
//! [`ReviewBoardClient`](crate::reviewboard::ReviewBoardClient) are the
//! production implementations; tests drive the core through in-memory ones.

use async_trait::async_trait;

use crate::errors::{HgError, ReviewBoardError};
use crate::models::{Changeset, DiffRevision, Draft, DraftUpdate, ReviewRequest};
use crate::revset::Revset;

/// Read-only access to version control history.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Changesets matching `revset`, in the VCS's topological order.
    async fn enumerate(&self, revset: &Revset) -> Result<Vec<Changeset>, HgError>;

    /// Portable patch for a single changeset.
    async fn diff_for(&self, node: &str) -> Result<Vec<u8>, HgError>;

    /// Cumulative diff across a revision set.
    async fn diff_for_range(&self, revset: &Revset) -> Result<Vec<u8>, HgError>;
}

/// Access to the remote review system, scoped to one configured repository.
#[async_trait]
pub trait ReviewSystem: Send + Sync {
    /// The review request correlated to `commit_id`, if any.
    async fn find_by_commit_id(
        &self,
        commit_id: &str,
    ) -> Result<Option<ReviewRequest>, ReviewBoardError>;

    /// Create an unpublished review request carrying `commit_id`.
    async fn create(&self, commit_id: &str) -> Result<ReviewRequest, ReviewBoardError>;

    /// Attach a new diff revision to a review request.
    async fn upload_diff(
        &self,
        request_id: u64,
        content: &[u8],
        base_commit_id: Option<&str>,
    ) -> Result<DiffRevision, ReviewBoardError>;

    /// Write (and optionally publish) a review request's draft.
    async fn update_draft(
        &self,
        request_id: u64,
        update: &DraftUpdate,
    ) -> Result<Draft, ReviewBoardError>;

    /// Fetch a review request by ID.
    async fn get(&self, request_id: u64) -> Result<ReviewRequest, ReviewBoardError>;
}
