//! Complete command implementation
//!
//! Completion items for a position inside a fenced code block.

use anyhow::Result;
use clap::Args;

use super::report_unavailable;
use crate::app::App;
use crate::cli::ParsedLocation;
use crate::cli::response::{CompletionItemOutput, CompletionOutput};
use crate::services::Forwarded;

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Markdown file with position (file:line:column)
    pub location: String,

    /// Maximum number of items to print
    #[arg(short, long, default_value = "50")]
    pub limit: usize,
}

pub async fn execute(args: CompleteArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse(&args.location)?.to_absolute()?;
    let document = app.open_document(&loc.file).await?;
    loc.validate_position_with_content(&document.text)?;

    let position = loc.position();
    let Some(fence) = app
        .aggregator
        .find_covering_fence(&document.uri, position)
        .await
    else {
        ctx.print_error(&format!("{loc} is not inside a fenced code block"));
        return Ok(());
    };

    match app.aggregator.forward_completion(&fence, position).await {
        Forwarded::Ready(outcome) => {
            let items: Vec<CompletionItemOutput> = outcome
                .items
                .iter()
                .take(args.limit)
                .map(CompletionItemOutput::from)
                .collect();
            ctx.print_success_flat(CompletionOutput {
                language: fence.lang_id(),
                count: outcome.items.len(),
                is_incomplete: outcome.is_incomplete || items.len() < outcome.items.len(),
                host_unsafe_edits: outcome.host_unsafe_edits,
                items,
            });
        }
        Forwarded::Unavailable(unavailable) => report_unavailable(app, &fence, unavailable).await,
    }

    Ok(())
}
