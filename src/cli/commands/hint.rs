//! Hint command implementation
//!
//! Explain why a fence language gets no intelligence.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::infra::lsp::BackendState;

#[derive(Args, Debug)]
pub struct HintArgs {
    /// Fence language tag, e.g. `py` or `rust`
    pub lang: String,

    /// Report without trying to start the backend first
    #[arg(long)]
    pub no_probe: bool,
}

#[derive(Serialize)]
struct HintResponse {
    language: String,
    registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<BackendState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

pub async fn execute(args: HintArgs, app: &App) -> Result<()> {
    let canonical = app
        .aggregator
        .registry()
        .resolve(&args.lang)
        .map(|entry| entry.id.clone());

    let state = if args.no_probe {
        None
    } else {
        app.aggregator.start_backend(&args.lang).await
    };
    let hint = app.aggregator.get_hint(&args.lang).await;

    app.output.print_success_flat(HintResponse {
        language: args.lang,
        registered: canonical.is_some(),
        canonical,
        state,
        hint: hint.map(|h| h.to_string()),
    });
    Ok(())
}
