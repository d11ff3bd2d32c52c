//! Fenced code regions of a host document

use serde::Serialize;

/// One fenced code region of one document version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FenceMeta {
    /// Language tag exactly as written after the opening delimiter
    pub raw_lang: String,
    /// Canonical id when the tag resolves in the registry
    pub canonical: Option<String>,
    /// First line of code content (0-indexed)
    pub code_start: u32,
    /// One past the last line of code content
    pub code_end: u32,
    pub code: String,
    pub virt_uri: String,
    pub version: i32,
}

impl FenceMeta {
    /// Canonical id when registered, else the raw tag lower-cased
    pub fn lang_id(&self) -> String {
        self.canonical
            .clone()
            .unwrap_or_else(|| self.raw_lang.to_lowercase())
    }

    /// Half-open coverage: delimiter lines are never covered
    pub fn covers(&self, line: u32) -> bool {
        self.code_start <= line && line < self.code_end
    }

    pub fn is_supported(&self) -> bool {
        self.canonical.is_some()
    }
}

/// Deterministic virtual-document URI for a fence
pub fn virtual_uri(doc_uri: &str, index: usize, ext: &str) -> String {
    format!("{doc_uri}.fence{index}.{ext}")
}
