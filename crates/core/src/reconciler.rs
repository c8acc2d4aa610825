//! Review request reconciliation.
//!
//! The [`Reconciler`] mirrors a bookmark's unique history into the review
//! system:
//!
//! 1. Resolve the bookmark into changesets (oldest first) and a diff range.
//! 2. Find or create one review request per changeset. Published requests
//!    are left untouched because changesets are immutable.
//! 3. Find or create the bookmark's squashed review request and rewrite its
//!    cumulative diff, description and dependency list.
//!
//! Every lookup goes by commit-id before anything is created, so re-running
//! after a failure picks up where the previous run stopped.

use tracing::{debug, info, instrument, warn};

use crate::errors::{ReconcileError, ReviewBoardError};
use crate::models::{Changeset, DraftUpdate, ReviewRequest, SquashPolicy};
use crate::resolver::{ChangesetResolver, DiffRange};
use crate::revset::Revset;
use crate::traits::{ReviewSystem, Vcs};

/// Summary used for a bookmark's squashed review request.
pub fn squashed_summary(bookmark: &str) -> String {
    format!("Squashed commits for {}", bookmark)
}

/// One `/r/<id> - <summary>` line per request, in the given order.
pub fn squashed_description(requests: &[ReviewRequest]) -> String {
    requests
        .iter()
        .map(|rr| format!("/r/{} - {}", rr.id, rr.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Knobs that shape reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Bookmark marking the stable line (never reconciled itself).
    pub stable_bookmark: String,
    pub squash_policy: SquashPolicy,
    /// Value written to every draft's `bugs_closed` field, if set.
    pub bugs_closed: Option<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            stable_bookmark: "master".into(),
            squash_policy: SquashPolicy::default(),
            bugs_closed: None,
        }
    }
}

/// Reconciles bookmark history with review requests.
pub struct Reconciler<'a> {
    vcs: &'a dyn Vcs,
    reviews: &'a dyn ReviewSystem,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(vcs: &'a dyn Vcs, reviews: &'a dyn ReviewSystem, options: ReconcileOptions) -> Self {
        Self {
            vcs,
            reviews,
            options,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Reconcile `bookmark` end to end.
    ///
    /// Returns the squashed review request, the lone per-changeset request
    /// for a single-changeset bookmark under [`SquashPolicy::SkipSingle`], or
    /// `None` when the bookmark has no unique history.
    #[instrument(skip(self), fields(policy = %self.options.squash_policy))]
    pub async fn reconcile(&self, bookmark: &str) -> Result<Option<ReviewRequest>, ReconcileError> {
        let resolver = ChangesetResolver::new(self.vcs, &self.options.stable_bookmark);
        let history = resolver.resolve(bookmark).await?;
        if history.is_empty() {
            info!("bookmark has no unique changesets, nothing to do");
            return Ok(None);
        }

        let mut requests = Vec::with_capacity(history.changesets.len());
        for changeset in &history.changesets {
            requests.push(self.ensure_changeset_request(bookmark, changeset).await?);
        }

        if requests.len() == 1 && self.options.squash_policy == SquashPolicy::SkipSingle {
            debug!("single changeset, skipping squashed review request");
            return Ok(requests.pop());
        }

        self.ensure_squashed_request(bookmark, &history.diff_range, &requests)
            .await
    }

    // -----------------------------------------------------------------------
    // Per-changeset requests
    // -----------------------------------------------------------------------

    /// Find the review request for `changeset`, creating and publishing it
    /// if it does not exist yet. An unpublished request found by commit-id
    /// is populated as if it had just been created.
    #[instrument(skip(self, changeset), fields(node = %changeset.node))]
    pub async fn ensure_changeset_request(
        &self,
        bookmark: &str,
        changeset: &Changeset,
    ) -> Result<ReviewRequest, ReconcileError> {
        let (request, created) = self.find_or_create(&changeset.node).await?;
        if !created && request.public {
            debug!(id = request.id, "review request already exists");
            return Ok(request);
        }
        if !created {
            // Left behind by an earlier run that failed before publishing.
            warn!(id = request.id, "resuming unpublished review request");
        }

        let diff = self.vcs.diff_for(&changeset.node).await?;
        self.reviews.upload_diff(request.id, &diff, None).await?;

        let update = DraftUpdate {
            commit_id: changeset.node.clone(),
            summary: changeset.summary().to_string(),
            description: changeset.description.clone(),
            branch: bookmark.to_string(),
            depends_on: Vec::new(),
            bugs_closed: self.options.bugs_closed.clone(),
            public: true,
        };
        self.reviews.update_draft(request.id, &update).await?;
        info!(id = request.id, summary = %update.summary, "published changeset review request");

        // Read back so the caller sees the published summary.
        self.reviews
            .find_by_commit_id(&changeset.node)
            .await?
            .ok_or_else(|| ReviewBoardError::NotFound(changeset.node.clone()).into())
    }

    // -----------------------------------------------------------------------
    // Squashed request
    // -----------------------------------------------------------------------

    /// Maintain the squashed review request for `bookmark`.
    ///
    /// `requests` must be in history order; it becomes both the dependency
    /// list and the description order. The cumulative diff is uploaded on
    /// every call since the bookmark's content changes as changesets land.
    #[instrument(skip(self, diff_range, requests), fields(count = requests.len()))]
    pub async fn ensure_squashed_request(
        &self,
        bookmark: &str,
        diff_range: &DiffRange,
        requests: &[ReviewRequest],
    ) -> Result<Option<ReviewRequest>, ReconcileError> {
        if requests.is_empty()
            || (requests.len() == 1 && self.options.squash_policy == SquashPolicy::SkipSingle)
        {
            return Ok(None);
        }

        let (squashed, created) = self.find_or_create(bookmark).await?;
        if created {
            info!(id = squashed.id, "created squashed review request");
        }

        let diff = self.vcs.diff_for_range(&diff_range.revset).await?;
        self.reviews
            .upload_diff(squashed.id, &diff, Some(&diff_range.base))
            .await?;

        let update = DraftUpdate {
            commit_id: bookmark.to_string(),
            summary: squashed_summary(bookmark),
            description: squashed_description(requests),
            branch: bookmark.to_string(),
            depends_on: requests.iter().map(|rr| rr.id).collect(),
            bugs_closed: self.options.bugs_closed.clone(),
            public: true,
        };
        self.reviews.update_draft(squashed.id, &update).await?;
        info!(id = squashed.id, depends_on = ?update.depends_on, "published squashed review request");

        Ok(Some(self.reviews.get(squashed.id).await?))
    }

    // -----------------------------------------------------------------------
    // Incoming changesets
    // -----------------------------------------------------------------------

    /// Ensure a review request for `node` and every changeset after it.
    ///
    /// Used for changegroup events, where a push delivers changesets without
    /// moving a bookmark.
    #[instrument(skip(self))]
    pub async fn sync_incoming(
        &self,
        node: &str,
        branch: &str,
    ) -> Result<Vec<ReviewRequest>, ReconcileError> {
        let changesets = self
            .vcs
            .enumerate(&Revset::DescendantsFrom(node.to_string()))
            .await?;
        let mut requests = Vec::with_capacity(changesets.len());
        for changeset in &changesets {
            requests.push(self.ensure_changeset_request(branch, changeset).await?);
        }
        info!(count = requests.len(), "synced incoming changesets");
        Ok(requests)
    }

    /// Look up `commit_id`, creating a request if none exists. The flag is
    /// `true` only when this call created the request.
    async fn find_or_create(&self, commit_id: &str) -> Result<(ReviewRequest, bool), ReconcileError> {
        if let Some(existing) = self.reviews.find_by_commit_id(commit_id).await? {
            return Ok((existing, false));
        }

        match self.reviews.create(commit_id).await {
            Ok(created) => Ok((created, true)),
            Err(ReviewBoardError::Conflict { .. }) => {
                warn!(commit_id, "review request created concurrently, re-fetching");
                let existing = self
                    .reviews
                    .find_by_commit_id(commit_id)
                    .await?
                    .ok_or_else(|| ReviewBoardError::NotFound(commit_id.to_string()))?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }
}
