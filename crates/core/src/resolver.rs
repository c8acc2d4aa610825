//! Changeset resolution for a bookmark.
//!
//! Computes the history unique to a bookmark (reachable from it but not from
//! the stable line) together with the range used for the cumulative diff.

use tracing::{debug, info, instrument};

use crate::errors::ReconcileError;
use crate::models::Changeset;
use crate::revset::Revset;
use crate::traits::Vcs;

/// The closed range from the stable tip to the bookmark tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRange {
    pub revset: Revset,
    /// Node of the stable line's tip, used as the diff's base commit.
    pub base: String,
}

/// Output of [`ChangesetResolver::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedHistory {
    /// Changesets unique to the bookmark, oldest first.
    pub changesets: Vec<Changeset>,
    pub diff_range: DiffRange,
}

impl ResolvedHistory {
    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }
}

/// Resolves bookmarks against the stable line.
pub struct ChangesetResolver<'a> {
    vcs: &'a dyn Vcs,
    stable: String,
}

impl<'a> ChangesetResolver<'a> {
    pub fn new(vcs: &'a dyn Vcs, stable: impl Into<String>) -> Self {
        Self {
            vcs,
            stable: stable.into(),
        }
    }

    /// Resolve `bookmark` into its unique history and cumulative diff range.
    ///
    /// An empty history (bookmark sitting on the stable line) is not an error;
    /// callers check [`ResolvedHistory::is_empty`] and stop.
    #[instrument(skip(self), fields(stable = %self.stable))]
    pub async fn resolve(&self, bookmark: &str) -> Result<ResolvedHistory, ReconcileError> {
        if bookmark == self.stable {
            return Err(ReconcileError::StableBookmark(bookmark.to_string()));
        }

        let changesets = self
            .vcs
            .enumerate(&Revset::unique_history(bookmark, &self.stable))
            .await?;

        let base = self
            .vcs
            .enumerate(&Revset::Symbol(self.stable.clone()))
            .await?
            .into_iter()
            .next()
            .map(|cs| cs.node)
            .ok_or_else(|| ReconcileError::MissingStableTip(self.stable.clone()))?;
        debug!(base = %base, "resolved stable tip");

        info!(count = changesets.len(), "resolved unique history");
        Ok(ResolvedHistory {
            changesets,
            diff_range: DiffRange {
                revset: Revset::range(&self.stable, bookmark),
                base,
            },
        })
    }
}
