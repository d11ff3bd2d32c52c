//! Languages command implementation
//!
//! List the registered languages after config merging.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::cli::response::LanguageOutput;

#[derive(Args, Debug)]
pub struct LanguagesArgs {}

#[derive(Serialize)]
struct LanguagesResponse {
    count: usize,
    languages: Vec<LanguageOutput>,
}

pub async fn execute(_args: LanguagesArgs, app: &App) -> Result<()> {
    let registry = app.aggregator.registry();
    let languages: Vec<LanguageOutput> = registry
        .list_ids()
        .iter()
        .filter_map(|id| registry.resolve(id))
        .map(LanguageOutput::from)
        .collect();

    app.output.print_success_flat(LanguagesResponse {
        count: languages.len(),
        languages,
    });
    Ok(())
}
