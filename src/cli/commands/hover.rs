//! Hover command implementation
//!
//! Hover information for a position inside a fenced code block.

use anyhow::Result;
use clap::Args;

use super::report_unavailable;
use crate::app::App;
use crate::cli::ParsedLocation;
use crate::cli::response::{HoverOutput, RangeOutput, hover_text};
use crate::services::Forwarded;

#[derive(Args, Debug)]
pub struct HoverArgs {
    /// Markdown file with position (file:line:column)
    pub location: String,
}

pub async fn execute(args: HoverArgs, app: &App) -> Result<()> {
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

    match app.aggregator.forward_hover(&fence, position).await {
        Forwarded::Ready(Some(hover)) => ctx.print_success_flat(HoverOutput {
            language: fence.lang_id(),
            content: Some(hover_text(&hover.contents)),
            range: hover.range.as_ref().map(RangeOutput::from),
            message: None,
        }),
        Forwarded::Ready(None) => ctx.print_success_flat(HoverOutput {
            language: fence.lang_id(),
            content: None,
            range: None,
            message: Some("No hover information available".to_string()),
        }),
        Forwarded::Unavailable(unavailable) => report_unavailable(app, &fence, unavailable).await,
    }

    Ok(())
}
