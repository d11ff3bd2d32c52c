//! Status command implementation
//!
//! Show configuration paths and backend availability.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::cli::response::BackendStatusOutput;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Start the backends for every language fenced in this file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Serialize)]
struct StatusResponse {
    root: String,
    global_config: String,
    workspace_config: String,
    languages: usize,
    request_timeout_ms: u64,
    backends: Vec<BackendStatusOutput>,
}

pub async fn execute(args: StatusArgs, app: &App) -> Result<()> {
    if let Some(file) = &args.file {
        let document = app.open_document(file).await?;
        let languages: BTreeSet<String> = document
            .fences
            .iter()
            .filter_map(|f| f.canonical.clone())
            .collect();
        for language in languages {
            app.aggregator.start_backend(&language).await;
        }
    }

    let registry = app.aggregator.registry();
    let mut backends = Vec::new();
    for (language, state) in app.aggregator.backend_status().await {
        let command = registry
            .resolve(&language)
            .map(|entry| entry.launch.command_line())
            .unwrap_or_default();
        let hint = app
            .aggregator
            .get_hint(&language)
            .await
            .map(|h| h.to_string());
        backends.push(BackendStatusOutput {
            language,
            state,
            command,
            hint,
        });
    }

    app.output.print_success_flat(StatusResponse {
        root: app.root().display().to_string(),
        global_config: app.config_service.config_path(true).display().to_string(),
        workspace_config: app.config_service.config_path(false).display().to_string(),
        languages: registry.len(),
        request_timeout_ms: app.config().lsp.request_timeout_ms,
        backends,
    });
    Ok(())
}
