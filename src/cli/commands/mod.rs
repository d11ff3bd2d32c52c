//! Command implementations for fence-lsp
//!
//! Each command is implemented in its own module.

pub mod complete;
pub mod fences;
pub mod hint;
pub mod hover;
pub mod languages;
pub mod status;

use crate::app::App;
use crate::cli::response::UnavailableOutput;
use crate::models::FenceMeta;
use crate::services::Unavailable;

/// Print why a fence request produced no answer, with a hint when one applies
pub(crate) async fn report_unavailable(app: &App, fence: &FenceMeta, unavailable: Unavailable) {
    let hint = match &unavailable {
        Unavailable::UnknownLanguage { .. } | Unavailable::BackendDead { .. } => app
            .aggregator
            .get_hint(&fence.raw_lang)
            .await
            .map(|hint| hint.to_string()),
        _ => None,
    };

    let message = unavailable.to_string();
    let output = UnavailableOutput {
        language: fence.lang_id(),
        message: message.clone(),
        unavailable,
        hint,
    };
    app.output.print_error_with(&message, output);
}
