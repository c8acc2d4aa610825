//! rbhook core library.
//!
//! This crate mirrors Mercurial bookmark history into Review Board: one
//! review request per changeset plus a squashed review request per bookmark.
//! It provides configuration, the Mercurial and Review Board clients, the
//! changeset resolver, the reconciler and the hook trigger contract.

pub mod config;
pub mod errors;
pub mod hg;
pub mod hook;
pub mod models;
pub mod reconciler;
pub mod resolver;
pub mod revset;
pub mod reviewboard;
pub mod traits;

// Re-exports for convenience.
pub use config::AppConfig;
pub use hg::HgClient;
pub use hook::HookEvent;
pub use reconciler::{ReconcileOptions, Reconciler};
pub use resolver::ChangesetResolver;
pub use reviewboard::ReviewBoardClient;
