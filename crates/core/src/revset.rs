//! VCS-neutral revision set intents.
//!
//! The resolver only ever asks for a handful of history shapes. Each
//! collaborator translates these variants into its own query language.

use std::fmt;

/// A revision set to enumerate or diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revset {
    /// The single changeset a name (bookmark, node) points to.
    Symbol(String),
    /// All ancestors of `name`, inclusive.
    AncestorsOf(String),
    /// Ancestors of `head` that are not ancestors of `stable`.
    UniqueHistory { head: String, stable: String },
    /// Closed range from `from` to `to`.
    Range { from: String, to: String },
    /// `node` and every later changeset.
    DescendantsFrom(String),
}

impl Revset {
    pub fn unique_history(head: impl Into<String>, stable: impl Into<String>) -> Self {
        Self::UniqueHistory {
            head: head.into(),
            stable: stable.into(),
        }
    }

    pub fn range(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Range {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Revset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(name) => write!(f, "symbol({})", name),
            Self::AncestorsOf(name) => write!(f, "ancestors({})", name),
            Self::UniqueHistory { head, stable } => {
                write!(f, "unique-history({}, {})", head, stable)
            }
            Self::Range { from, to } => write!(f, "range({}, {})", from, to),
            Self::DescendantsFrom(node) => write!(f, "from({})", node),
        }
    }
}
