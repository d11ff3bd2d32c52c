//! Fences command implementation
//!
//! List the fenced code blocks of a markdown file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::cli::response::FenceOutput;

#[derive(Args, Debug)]
pub struct FencesArgs {
    /// Markdown file to scan
    pub file: PathBuf,

    /// Include the code of each fence
    #[arg(long)]
    pub code: bool,
}

#[derive(Serialize)]
struct FenceEntry {
    #[serde(flatten)]
    fence: FenceOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

#[derive(Serialize)]
struct FencesResponse {
    file: String,
    count: usize,
    unsupported: Vec<String>,
    fences: Vec<FenceEntry>,
}

pub async fn execute(args: FencesArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let document = app.open_document(&args.file).await?;

    let mut unsupported: Vec<String> = document
        .fences
        .iter()
        .filter(|f| !f.is_supported())
        .map(|f| f.raw_lang.clone())
        .collect();
    unsupported.sort();
    unsupported.dedup();

    let fences = document
        .fences
        .iter()
        .enumerate()
        .map(|(index, fence)| FenceEntry {
            fence: FenceOutput::new(index, fence),
            code: args.code.then(|| fence.code.clone()),
        })
        .collect::<Vec<_>>();

    ctx.print_success_flat(FencesResponse {
        file: ctx.relative_path(&document.path),
        count: fences.len(),
        unsupported,
        fences,
    });
    Ok(())
}
