//! Mercurial hook trigger contract.
//!
//! Mercurial passes hook arguments as `HG_*` environment variables. A
//! `pushkey` hook fires for every namespace; only bookmark moves are of
//! interest here.

use tracing::{debug, info};

use crate::errors::ReconcileError;
use crate::models::ReviewRequest;
use crate::reconciler::Reconciler;

/// `HG_NAMESPACE` value for bookmark events.
pub const BOOKMARKS_NAMESPACE: &str = "bookmarks";

/// A `pushkey` event as delivered by Mercurial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookEvent {
    pub namespace: String,
    /// The changed key; the bookmark name for bookmark events.
    pub key: String,
    pub old: String,
    pub new: String,
}

impl HookEvent {
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    /// Read `HG_NAMESPACE`, `HG_KEY`, `HG_OLD` and `HG_NEW`. Unset
    /// variables read as empty strings (a brand-new bookmark has no old value).
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            namespace: var("HG_NAMESPACE"),
            key: var("HG_KEY"),
            old: var("HG_OLD"),
            new: var("HG_NEW"),
        }
    }

    /// The bookmark to reconcile, or `None` if this event should be ignored.
    pub fn bookmark(&self, stable: &str) -> Option<&str> {
        if self.namespace != BOOKMARKS_NAMESPACE {
            debug!(namespace = %self.namespace, "not a bookmark event");
            return None;
        }
        if self.old == self.new {
            debug!(key = %self.key, "bookmark did not move");
            return None;
        }
        if self.key.is_empty() || self.key == stable {
            debug!(key = %self.key, "ignoring stable or empty bookmark");
            return None;
        }
        Some(&self.key)
    }
}

/// Handle a `pushkey` event: apply the no-op guards, then reconcile.
pub async fn run_pushkey(
    event: &HookEvent,
    reconciler: &Reconciler<'_>,
) -> Result<Option<ReviewRequest>, ReconcileError> {
    let stable = &reconciler.options().stable_bookmark;
    let Some(bookmark) = event.bookmark(stable) else {
        return Ok(None);
    };
    info!(bookmark, old = %event.old, new = %event.new, "bookmark changed");
    reconciler.reconcile(bookmark).await
}
