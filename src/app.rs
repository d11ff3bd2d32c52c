//! Application container for fence-lsp

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::OutputContext;
use crate::config::RuntimeConfig;
use crate::infra::lsp::{LanguageRegistry, ProcessSpawner, Spawner};
use crate::models::lsp::path_to_uri;
use crate::models::{FenceConfig, FenceMeta, LangEntry};
use crate::services::Aggregator;
use crate::services::config::{ConfigService, DefaultConfigService};

/// A host document read from disk and indexed
pub struct OpenDocument {
    pub path: PathBuf,
    pub uri: String,
    pub text: String,
    pub fences: Vec<FenceMeta>,
}

pub struct App {
    root: PathBuf,
    pub(crate) output: OutputContext,
    pub(crate) aggregator: Aggregator,
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: FenceConfig,
}

impl App {
    pub async fn new(root: Option<PathBuf>) -> anyhow::Result<Self> {
        let root = match root {
            Some(root) => root
                .canonicalize()
                .with_context(|| format!("Workspace not found: {}", root.display()))?,
            None => std::env::current_dir()?,
        };

        tracing::debug!("Initializing fence-lsp at {:?}", root);

        let output = OutputContext::new(root.clone());
        let config_service = Arc::new(DefaultConfigService::new(&root));
        let config = config_service.load().await?;

        let mut registry = LanguageRegistry::with_defaults();
        registry.merge(config.languages.iter().cloned().map(LangEntry::from));

        let spawner: Arc<dyn Spawner> = Arc::new(ProcessSpawner::new(root.clone()));
        let aggregator = Aggregator::new(
            registry,
            spawner,
            RuntimeConfig::from(&config.lsp),
            Some(path_to_uri(&root)),
        )?;

        tracing::info!(
            "fence-lsp initialized ({} languages)",
            aggregator.registry().len()
        );

        Ok(Self {
            root,
            output,
            aggregator,
            config_service,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &FenceConfig {
        &self.config
    }

    /// Read `path` and index its fences
    pub async fn open_document(&self, path: &Path) -> anyhow::Result<OpenDocument> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let uri = self.output.document_uri(&path);
        let fences = self.aggregator.update_document(&uri, &text).await?;

        Ok(OpenDocument {
            path,
            uri,
            text,
            fences,
        })
    }

    /// Stop every backend started by this invocation
    pub async fn shutdown(&self) {
        self.aggregator.shutdown().await;
    }
}
