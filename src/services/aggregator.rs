//! Aggregator facade
//!
//! The single entry point a host editor integration talks to. Owns the
//! registry, the fence cache and the backend supervisor, and wires fence
//! extraction, document sync and request forwarding together.

use std::sync::Arc;

use tokio::sync::RwLock;
use tree_sitter::Tree;

use super::fences::{FenceCache, extract_fences};
use super::forwarder::{CompletionOutcome, Forwarded, Forwarder};
use super::hints::{self, Hint};
use super::sync::close_fence;
use crate::config::RuntimeConfig;
use crate::error::FenceResult;
use crate::infra::ast::MarkdownParser;
use crate::infra::lsp::protocol::{Diagnostic, Hover};
use crate::infra::lsp::{BackendState, LanguageRegistry, Spawner, Supervisor};
use crate::models::{Capability, FenceMeta, Position};

pub struct Aggregator {
    registry: LanguageRegistry,
    supervisor: Supervisor,
    fences: RwLock<FenceCache>,
    parser: MarkdownParser,
}

impl Aggregator {
    pub fn new(
        registry: LanguageRegistry,
        spawner: Arc<dyn Spawner>,
        config: RuntimeConfig,
        root_uri: Option<String>,
    ) -> FenceResult<Self> {
        Ok(Self {
            registry,
            supervisor: Supervisor::new(spawner, config, root_uri),
            fences: RwLock::new(FenceCache::new()),
            parser: MarkdownParser::new()?,
        })
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Parse `text` and replace the fences cached for `uri`
    pub async fn update_document(&self, uri: &str, text: &str) -> FenceResult<Vec<FenceMeta>> {
        let tree = self.parser.parse(uri, text)?;
        Ok(self.index_tree(uri, &tree, text).await)
    }

    /// Replace the fences of `uri` from a tree the host already parsed
    pub async fn index_tree(&self, uri: &str, tree: &Tree, text: &str) -> Vec<FenceMeta> {
        let mut cache = self.fences.write().await;
        let version = cache.current_version(uri);
        let fences = extract_fences(tree, text, uri, &self.registry, version);
        tracing::debug!("{} has {} fences (v{})", uri, fences.len(), version);
        cache.store(uri, fences.clone());
        fences
    }

    /// Host edit: bump versions, then re-extract from the new text
    pub async fn did_change(&self, uri: &str, text: &str) -> FenceResult<Vec<FenceMeta>> {
        let tree = self.parser.parse(uri, text)?;
        let mut cache = self.fences.write().await;
        if !cache.invalidate(uri) {
            tracing::debug!("did_change for unindexed document {}", uri);
        }
        let version = cache.current_version(uri);
        let fences = extract_fences(&tree, text, uri, &self.registry, version);
        cache.store(uri, fences.clone());
        Ok(fences)
    }

    pub async fn invalidate(&self, uri: &str) {
        self.fences.write().await.invalidate(uri);
    }

    pub async fn find_covering_fence(&self, uri: &str, position: Position) -> Option<FenceMeta> {
        self.fences.read().await.covering(uri, position).cloned()
    }

    pub async fn fences(&self, uri: &str) -> Vec<FenceMeta> {
        self.fences.read().await.fences(uri).to_vec()
    }

    pub async fn forward_completion(
        &self,
        fence: &FenceMeta,
        position: Position,
    ) -> Forwarded<CompletionOutcome> {
        Forwarder::new(&self.registry, &self.supervisor)
            .completion(fence, position)
            .await
    }

    pub async fn forward_hover(
        &self,
        fence: &FenceMeta,
        position: Position,
    ) -> Forwarded<Option<Hover>> {
        Forwarder::new(&self.registry, &self.supervisor)
            .hover(fence, position)
            .await
    }

    /// Why `lang` gets no intelligence; `None` while its backend is healthy or untried
    pub async fn get_hint(&self, lang: &str) -> Option<Hint> {
        match self.registry.resolve(lang) {
            None => Some(hints::unknown_language(lang, &self.registry)),
            Some(entry) => self
                .supervisor
                .failure(&entry.id)
                .await
                .map(|failure| hints::backend_unavailable(entry, &failure)),
        }
    }

    /// Diagnostics published for the fences of `uri`, in host coordinates
    pub async fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        let fences = self.fences(uri).await;
        let mut diagnostics = Vec::new();

        for fence in fences {
            let Some(entry) = fence.canonical.as_deref().and_then(|id| self.registry.resolve(id))
            else {
                continue;
            };
            if !entry.declares(Capability::Diagnostics) {
                continue;
            }
            let Some(client) = self.supervisor.client(&entry.id).await else {
                continue;
            };
            for mut diagnostic in client.get_diagnostics(&fence.virt_uri).await {
                let Some(range) = diagnostic.range.to_host(fence.code_start) else {
                    tracing::debug!("Skipping out-of-range diagnostic from {}", fence.virt_uri);
                    continue;
                };
                diagnostic.range = range;
                diagnostics.push(diagnostic);
            }
        }

        diagnostics
    }

    /// Forget `uri` and close its virtual documents on running backends
    pub async fn close_document(&self, uri: &str) {
        let fences = self.fences.write().await.remove(uri);

        for fence in fences {
            let Some(language) = fence.canonical.as_deref() else {
                continue;
            };
            let Some(client) = self.supervisor.client(language).await else {
                continue;
            };
            if let Err(e) = close_fence(&client, &fence.virt_uri).await {
                tracing::debug!("didClose for {} failed: {}", fence.virt_uri, e);
            }
        }
    }

    /// Start the backend for `lang` ahead of any request; `None` for unregistered tags
    pub async fn start_backend(&self, lang: &str) -> Option<BackendState> {
        let entry = self.registry.resolve(lang)?;
        if let Err(e) = self.supervisor.acquire(entry).await {
            tracing::debug!("{} backend did not start: {:?}", entry.id, e);
        }
        Some(self.supervisor.status(&entry.id).await)
    }

    pub async fn backend_status(&self) -> Vec<(String, BackendState)> {
        self.supervisor.snapshot().await
    }

    /// Stop every backend; forwarding afterwards reports `ShuttingDown`
    pub async fn shutdown(&self) {
        self.supervisor.shutdown_all().await;
    }
}
