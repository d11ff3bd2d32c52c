//! Markdown parsing infrastructure
//!
//! Tree-sitter block grammar for locating fenced code regions.

pub mod markdown;

pub use markdown::{MarkdownParser, node_kinds};
