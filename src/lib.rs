//! fence-lsp - Language intelligence for fenced code in markdown
//!
//! Extracts fenced code blocks from a host document, mirrors each into a
//! virtual document, and forwards completion and hover requests to one
//! language server per embedded language.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod models;
pub mod services;

pub use error::{FenceError, FenceResult};
pub use services::{Aggregator, CompletionOutcome, Forwarded, Hint, Unavailable};
