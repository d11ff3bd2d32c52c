//! LSP Infrastructure for fence-lsp
//!
//! Everything needed to talk to embedded-language backends:
//! - JSON-RPC 2.0 protocol types
//! - Async message transport with Content-Length framing
//! - Per-backend client with atomic request IDs and timeouts
//! - Supervisor owning one backend per language
//! - Language registry with the built-in language table

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod protocol;
pub mod registry;
pub mod spawner;
pub mod supervisor;
pub mod transport;

pub use client::BackendClient;
pub use registry::LanguageRegistry;
pub use spawner::{BackendIo, ProcessSpawner, Spawner};
pub use supervisor::{AcquireError, BackendState, FailureKind, SpawnFailure, Supervisor};
