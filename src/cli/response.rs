//! Response types for CLI output
//!
//! Positions are converted back to 1-indexed lines and columns here.

use serde::Serialize;

use crate::infra::lsp::BackendState;
use crate::infra::lsp::protocol::{CompletionItem, HoverContents, MarkedString};
use crate::models::{Capability, FenceMeta, LangEntry, Range};
use crate::services::Unavailable;

/// 1-indexed range
#[derive(Debug, Clone, Serialize)]
pub struct RangeOutput {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl From<&Range> for RangeOutput {
    fn from(range: &Range) -> Self {
        let (start_line, start_column) = range.start.to_display();
        let (end_line, end_column) = range.end.to_display();
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FenceOutput {
    pub index: usize,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// First code line (1-indexed)
    pub start_line: u32,
    /// Number of code lines
    pub lines: u32,
    pub virt_uri: String,
    pub version: i32,
}

impl FenceOutput {
    pub fn new(index: usize, fence: &FenceMeta) -> Self {
        Self {
            index,
            lang: fence.raw_lang.clone(),
            canonical: fence.canonical.clone(),
            start_line: fence.code_start + 1,
            lines: fence.code_end.saturating_sub(fence.code_start),
            virt_uri: fence.virt_uri.clone(),
            version: fence.version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HoverOutput {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionItemOutput {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
}

impl From<&CompletionItem> for CompletionItemOutput {
    fn from(item: &CompletionItem) -> Self {
        Self {
            label: item.label.clone(),
            kind: item.kind,
            detail: item.detail.clone(),
            insert_text: item.insert_text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutput {
    pub language: String,
    pub count: usize,
    pub is_incomplete: bool,
    /// Text edits are relative to the fence, not the host file
    pub host_unsafe_edits: bool,
    pub items: Vec<CompletionItemOutput>,
}

/// Request could not be served; `hint` explains why when there is more to say
#[derive(Debug, Clone, Serialize)]
pub struct UnavailableOutput {
    pub language: String,
    pub unavailable: Unavailable,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageOutput {
    pub id: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub capabilities: Vec<Capability>,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl From<&LangEntry> for LanguageOutput {
    fn from(entry: &LangEntry) -> Self {
        Self {
            id: entry.id.clone(),
            aliases: entry.aliases.iter().cloned().collect(),
            extension: entry.extension.clone(),
            capabilities: entry.capabilities.iter().copied().collect(),
            command: entry.launch.command_line(),
            fallback: entry.fallback.as_ref().map(|f| f.command_line()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStatusOutput {
    pub language: String,
    pub state: BackendState,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Flatten hover contents into one markdown string
pub fn hover_text(contents: &HoverContents) -> String {
    fn marked(s: &MarkedString) -> String {
        match s {
            MarkedString::String(text) => text.clone(),
            MarkedString::LanguageString { language, value } => {
                format!("```{language}\n{value}\n```")
            }
        }
    }

    match contents {
        HoverContents::MarkupContent(markup) => markup.value.clone(),
        HoverContents::Scalar(s) => marked(s),
        HoverContents::Array(parts) => parts
            .iter()
            .map(marked)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use crate::models::fence::virtual_uri;

    #[test]
    fn test_range_output_is_one_indexed() {
        let range = Range::new(Position::new(4, 0), Position::new(4, 3));
        let out = RangeOutput::from(&range);
        assert_eq!((out.start_line, out.start_column), (5, 1));
        assert_eq!((out.end_line, out.end_column), (5, 4));
    }

    #[test]
    fn test_fence_output() {
        let fence = FenceMeta {
            raw_lang: "py".to_string(),
            canonical: Some("python".to_string()),
            code_start: 3,
            code_end: 5,
            code: "a\nb\n".to_string(),
            virt_uri: virtual_uri("file:///a.md", 0, "py"),
            version: 1,
        };
        let out = FenceOutput::new(0, &fence);
        assert_eq!(out.start_line, 4);
        assert_eq!(out.lines, 2);
    }

    #[test]
    fn test_hover_text() {
        let contents: HoverContents = serde_json::from_value(serde_json::json!([
            { "language": "python", "value": "def foo()" },
            "Returns foo."
        ]))
        .unwrap();
        assert_eq!(
            hover_text(&contents),
            "```python\ndef foo()\n```\n\nReturns foo."
        );

        let markup: HoverContents =
            serde_json::from_value(serde_json::json!({ "kind": "markdown", "value": "**x**" }))
                .unwrap();
        assert_eq!(hover_text(&markup), "**x**");
    }
}
