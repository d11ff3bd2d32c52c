//! Data models for fence-lsp
//!
//! Domain types shared by the infrastructure and service layers.

pub mod config;
pub mod fence;
pub mod language;
pub mod lsp;

pub use config::FenceConfig;
pub use fence::FenceMeta;
pub use language::{Capability, LangEntry, LaunchDescriptor};
pub use lsp::{Position, Range};
