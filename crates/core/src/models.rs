//! Domain model types shared by the resolver, the reconciler and the
//! collaborator clients.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Changeset
// ---------------------------------------------------------------------------

/// An immutable changeset as reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Full changeset hash.
    pub node: String,
    /// Free-text description; the first line is the summary.
    pub description: String,
}

impl Changeset {
    pub fn new(node: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            description: description.into(),
        }
    }

    /// First line of the description, trimmed.
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or("").trim()
    }
}

// ---------------------------------------------------------------------------
// Review requests
// ---------------------------------------------------------------------------

/// A review request as seen through the review system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: u64,
    /// External correlation key: a changeset node or a bookmark name.
    pub commit_id: Option<String>,
    pub summary: String,
    pub description: String,
    pub branch: String,
    /// IDs of the review requests this one depends on, in display order.
    pub depends_on: Vec<u64>,
    pub public: bool,
    pub absolute_url: String,
}

/// Fields written to a review request's draft.
///
/// Every draft update in this crate publishes immediately, so `public` is
/// `true` for all drafts built by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftUpdate {
    pub commit_id: String,
    pub summary: String,
    pub description: String,
    pub branch: String,
    pub depends_on: Vec<u64>,
    pub bugs_closed: Option<String>,
    pub public: bool,
}

/// The draft state returned after an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: u64,
    pub commit_id: Option<String>,
    pub summary: String,
    pub description: String,
    pub branch: String,
    pub depends_on: Vec<u64>,
}

/// One uploaded diff revision of a review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRevision {
    pub id: u64,
    pub revision: u32,
    pub base_commit_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Squash policy
// ---------------------------------------------------------------------------

/// Whether a bookmark with a single unique changeset gets a squashed
/// review request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquashPolicy {
    /// Return the lone per-changeset request; never create a squashed one.
    #[default]
    SkipSingle,
    /// Maintain the squashed request regardless of changeset count.
    Always,
}

impl std::fmt::Display for SquashPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkipSingle => write!(f, "skip_single"),
            Self::Always => write!(f, "always"),
        }
    }
}
