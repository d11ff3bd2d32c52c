//! Service layer for fence-lsp

pub mod aggregator;
pub mod config;
pub mod fences;
pub mod forwarder;
pub mod hints;
pub mod sync;

pub use aggregator::Aggregator;
pub use config::{ConfigService, DefaultConfigService};
pub use forwarder::{CompletionOutcome, Forwarded, Unavailable};
pub use hints::Hint;
