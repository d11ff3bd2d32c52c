//! Infrastructure layer for fence-lsp
//!
//! Contains low-level implementations and external integrations.

pub mod ast;
pub mod lsp;
