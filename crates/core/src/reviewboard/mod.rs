//! Review Board Web API access for rbhook.

pub mod client;

pub use client::ReviewBoardClient;
