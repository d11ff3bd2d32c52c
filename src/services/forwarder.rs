//! Request Forwarder
//!
//! Routes a host-document request at a fence position to the fence's
//! backend: resolves the language, checks capabilities, syncs the virtual
//! document, translates the position and maps the answer back.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::sync::sync_fence;
use crate::error::LspError;
use crate::infra::lsp::protocol::{CompletionItem, CompletionResponse, Hover};
use crate::infra::lsp::{AcquireError, BackendClient, LanguageRegistry, Supervisor};
use crate::models::{Capability, FenceMeta, Position};

/// Outcome of a forwarded request
///
/// `Unavailable` is deliberately not a value of `T` so an unavailable
/// backend can never be mistaken for an empty answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Forwarded<T> {
    Ready(T),
    Unavailable(Unavailable),
}

impl<T> Forwarded<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Why no backend answer is available
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unavailable {
    /// The fence tag is not registered
    UnknownLanguage { tag: String },
    /// The position is not on a code line of the fence
    OutsideFence,
    /// The language's backend could not be started
    BackendDead { language: String },
    /// Not declared for the language or not advertised by its backend
    CapabilityMissing {
        language: String,
        capability: Capability,
    },
    Timeout { language: String },
    RequestFailed { language: String, message: String },
    ShuttingDown,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLanguage { tag } => write!(f, "no language registered for '{tag}'"),
            Self::OutsideFence => f.write_str("position is outside the fence's code"),
            Self::BackendDead { language } => write!(f, "{language} backend is not available"),
            Self::CapabilityMissing {
                language,
                capability,
            } => write!(f, "{language} backend does not support {capability}"),
            Self::Timeout { language } => write!(f, "{language} backend timed out"),
            Self::RequestFailed { language, message } => {
                write!(f, "{language} request failed: {message}")
            }
            Self::ShuttingDown => f.write_str("shutting down"),
        }
    }
}

/// Completion answer for one fence position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    pub items: Vec<CompletionItem>,
    pub is_incomplete: bool,
    /// Some items carry text edits in virtual-document coordinates
    pub host_unsafe_edits: bool,
}

pub struct Forwarder<'a> {
    registry: &'a LanguageRegistry,
    supervisor: &'a Supervisor,
}

impl<'a> Forwarder<'a> {
    pub fn new(registry: &'a LanguageRegistry, supervisor: &'a Supervisor) -> Self {
        Self {
            registry,
            supervisor,
        }
    }

    pub async fn completion(
        &self,
        fence: &FenceMeta,
        position: Position,
    ) -> Forwarded<CompletionOutcome> {
        let client = match self.prepare(fence, position, Capability::Completion).await {
            Ok(client) => client,
            Err(unavailable) => return Forwarded::Unavailable(unavailable),
        };

        let params =
            BackendClient::position_params(&fence.virt_uri, position.to_local(fence.code_start));
        let response: Option<CompletionResponse> = match client
            .request(Capability::Completion.method(), Some(to_value(params)))
            .await
        {
            Ok(response) => response,
            Err(e) => return Forwarded::Unavailable(request_failure(fence, e)),
        };

        let list = response.map(CompletionResponse::into_list).unwrap_or_default();
        let host_unsafe_edits = list.items.iter().any(CompletionItem::has_edits);
        Forwarded::Ready(CompletionOutcome {
            items: list.items,
            is_incomplete: list.is_incomplete,
            host_unsafe_edits,
        })
    }

    /// `Ready(None)` means the backend had nothing to say here
    pub async fn hover(&self, fence: &FenceMeta, position: Position) -> Forwarded<Option<Hover>> {
        let client = match self.prepare(fence, position, Capability::Hover).await {
            Ok(client) => client,
            Err(unavailable) => return Forwarded::Unavailable(unavailable),
        };

        let params =
            BackendClient::position_params(&fence.virt_uri, position.to_local(fence.code_start));
        let hover: Option<Hover> = match client
            .request(Capability::Hover.method(), Some(to_value(params)))
            .await
        {
            Ok(hover) => hover,
            Err(e) => return Forwarded::Unavailable(request_failure(fence, e)),
        };

        Forwarded::Ready(hover.map(|mut hover| {
            hover.range = hover.range.and_then(|range| {
                let host = range.to_host(fence.code_start);
                if host.is_none() {
                    tracing::debug!("Dropping out-of-range hover range from {}", fence.virt_uri);
                }
                host
            });
            hover
        }))
    }

    /// Resolve, gate on capability, acquire and sync
    async fn prepare(
        &self,
        fence: &FenceMeta,
        position: Position,
        capability: Capability,
    ) -> Result<Arc<BackendClient>, Unavailable> {
        if !fence.covers(position.line) {
            return Err(Unavailable::OutsideFence);
        }

        let entry = fence
            .canonical
            .as_deref()
            .and_then(|id| self.registry.resolve(id))
            .ok_or_else(|| Unavailable::UnknownLanguage {
                tag: fence.raw_lang.clone(),
            })?;

        if !entry.declares(capability) {
            return Err(Unavailable::CapabilityMissing {
                language: entry.id.clone(),
                capability,
            });
        }

        let client = self.supervisor.acquire(entry).await.map_err(|e| match e {
            AcquireError::Dead(failure) => {
                tracing::debug!("{}", failure);
                Unavailable::BackendDead {
                    language: entry.id.clone(),
                }
            }
            AcquireError::ShuttingDown => Unavailable::ShuttingDown,
        })?;

        if !client.supports(capability).await {
            return Err(Unavailable::CapabilityMissing {
                language: entry.id.clone(),
                capability,
            });
        }

        sync_fence(&client, fence)
            .await
            .map_err(|e| request_failure(fence, e))?;

        Ok(client)
    }
}

fn to_value<T: Serialize>(params: T) -> serde_json::Value {
    serde_json::to_value(params).unwrap_or(serde_json::Value::Null)
}

fn request_failure(fence: &FenceMeta, error: LspError) -> Unavailable {
    let language = fence.lang_id();
    tracing::warn!("{} request for {} failed: {}", language, fence.virt_uri, error);
    match error {
        LspError::Timeout(_) => Unavailable::Timeout { language },
        e if e.is_terminated() => Unavailable::BackendDead { language },
        e => Unavailable::RequestFailed {
            language,
            message: e.to_string(),
        },
    }
}
