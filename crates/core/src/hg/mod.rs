//! Mercurial CLI wrapper for rbhook.

pub mod client;
pub mod parser;

pub use client::HgClient;
pub use parser::*;
