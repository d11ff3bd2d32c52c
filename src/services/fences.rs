//! Fence extraction and per-document fence cache
//!
//! Walks a parsed markdown tree depth-first and turns every fenced code
//! block with a language tag into a [`FenceMeta`]. The cache keeps one
//! version counter per host document; every fence of a document carries
//! the counter value current when it was extracted or last invalidated.

use std::collections::HashMap;

use tree_sitter::{Node, Tree, TreeCursor};

use crate::infra::ast::node_kinds;
use crate::infra::lsp::LanguageRegistry;
use crate::models::fence::virtual_uri;
use crate::models::{FenceMeta, Position};

/// Language tag from a fence info string: first token, braces and a leading dot removed
///
/// `python title="x"` -> `python`, `{.rust}` -> `rust`, `""` -> `None`
pub fn parse_tag(info: &str) -> Option<String> {
    let token = info.split_whitespace().next()?;
    let token = token.trim_matches(|c| c == '{' || c == '}');
    let token = token.trim_start_matches('.');
    let token = token.split(',').next().unwrap_or(token);
    (!token.is_empty()).then(|| token.to_string())
}

/// Extract every tagged fence in document order
pub fn extract_fences(
    tree: &Tree,
    text: &str,
    doc_uri: &str,
    registry: &LanguageRegistry,
    version: i32,
) -> Vec<FenceMeta> {
    let mut fences = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        if node.kind() == node_kinds::FENCED_CODE_BLOCK {
            if let Some(fence) =
                fence_from_node(node, text, doc_uri, fences.len(), registry, version)
            {
                fences.push(fence);
            }
            // Code blocks never contain further blocks
            if !advance(&mut cursor) {
                break;
            }
            continue;
        }
        if cursor.goto_first_child() {
            continue;
        }
        if !advance(&mut cursor) {
            break;
        }
    }

    fences
}

/// Move to the next node in pre-order that is not a descendant of the current one
fn advance(cursor: &mut TreeCursor) -> bool {
    loop {
        if cursor.goto_next_sibling() {
            return true;
        }
        if !cursor.goto_parent() {
            return false;
        }
    }
}

fn fence_from_node(
    node: Node,
    text: &str,
    doc_uri: &str,
    index: usize,
    registry: &LanguageRegistry,
    version: i32,
) -> Option<FenceMeta> {
    let mut info = None;
    let mut content = None;
    let mut walker = node.walk();
    for child in node.children(&mut walker) {
        match child.kind() {
            node_kinds::INFO_STRING => info = Some(child),
            node_kinds::CODE_FENCE_CONTENT => content = Some(child),
            _ => {}
        }
    }

    let raw_lang = info
        .and_then(|n| n.utf8_text(text.as_bytes()).ok())
        .and_then(parse_tag)?;

    let (code_start, code_end, code) = match content {
        Some(content) => {
            let start = content.start_position();
            let end = content.end_position();
            // Content normally ends at column 0 of the closing delimiter line
            let code_end = if end.column == 0 { end.row } else { end.row + 1 };
            let code = content
                .utf8_text(text.as_bytes())
                .unwrap_or_default()
                .to_string();
            (start.row as u32, code_end as u32, code)
        }
        None => {
            let first = node.start_position().row as u32 + 1;
            (first, first, String::new())
        }
    };

    let entry = registry.resolve(&raw_lang);
    let ext = entry
        .map(|e| e.extension.clone().unwrap_or_else(|| e.id.clone()))
        .unwrap_or_else(|| raw_lang.to_lowercase());

    Some(FenceMeta {
        canonical: entry.map(|e| e.id.clone()),
        virt_uri: virtual_uri(doc_uri, index, &ext),
        raw_lang,
        code_start,
        code_end,
        code,
        version,
    })
}

struct DocumentFences {
    /// Current version counter; starts at 1
    version: i32,
    fences: Vec<FenceMeta>,
}

/// Fences of every open host document
#[derive(Default)]
pub struct FenceCache {
    documents: HashMap<String, DocumentFences>,
}

impl FenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version the next extraction of `uri` must stamp
    pub fn current_version(&self, uri: &str) -> i32 {
        self.documents.get(uri).map(|d| d.version).unwrap_or(1)
    }

    /// Replace the fences of `uri`, keeping its version counter
    pub fn store(&mut self, uri: &str, fences: Vec<FenceMeta>) {
        let version = fences
            .first()
            .map(|f| f.version)
            .unwrap_or_else(|| self.current_version(uri));
        self.documents
            .insert(uri.to_string(), DocumentFences { version, fences });
    }

    /// Bump the counter and every cached fence version of `uri`
    pub fn invalidate(&mut self, uri: &str) -> bool {
        let Some(document) = self.documents.get_mut(uri) else {
            return false;
        };
        document.version += 1;
        for fence in &mut document.fences {
            fence.version = document.version;
        }
        true
    }

    /// Fence whose code lines contain `position`
    pub fn covering(&self, uri: &str, position: Position) -> Option<&FenceMeta> {
        self.documents
            .get(uri)?
            .fences
            .iter()
            .find(|f| f.covers(position.line))
    }

    pub fn fences(&self, uri: &str) -> &[FenceMeta] {
        self.documents
            .get(uri)
            .map(|d| d.fences.as_slice())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, uri: &str) -> Vec<FenceMeta> {
        self.documents
            .remove(uri)
            .map(|d| d.fences)
            .unwrap_or_default()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ast::MarkdownParser;

    const URI: &str = "file:///notes/a.md";

    fn extract(text: &str) -> Vec<FenceMeta> {
        let parser = MarkdownParser::new().unwrap();
        let tree = parser.parse(URI, text).unwrap();
        extract_fences(&tree, text, URI, &LanguageRegistry::with_defaults(), 1)
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("python").as_deref(), Some("python"));
        assert_eq!(parse_tag("python title=\"x\"").as_deref(), Some("python"));
        assert_eq!(parse_tag("{.rust}").as_deref(), Some("rust"));
        assert_eq!(parse_tag("rust,ignore").as_deref(), Some("rust"));
        assert_eq!(parse_tag("   "), None);
        assert_eq!(parse_tag("{}"), None);
    }

    #[test]
    fn test_single_python_fence() {
        // lines: 0 "# Notes", 1 "", 2 "```python", 3 "def foo():", 4 "    return 1", 5 "```"
        let text = "# Notes\n\n```python\ndef foo():\n    return 1\n```\n";
        let fences = extract(text);

        assert_eq!(fences.len(), 1);
        let fence = &fences[0];
        assert_eq!(fence.raw_lang, "python");
        assert_eq!(fence.canonical.as_deref(), Some("python"));
        assert_eq!(fence.code_start, 3);
        assert_eq!(fence.code_end, 5);
        assert_eq!(fence.code, "def foo():\n    return 1\n");
        assert_eq!(fence.virt_uri, "file:///notes/a.md.fence0.py");
        assert_eq!(fence.version, 1);
    }

    #[test]
    fn test_delimiter_lines_not_covered() {
        let text = "```python\nx = 1\n```\n";
        let fence = &extract(text)[0];
        assert!(!fence.covers(0));
        assert!(fence.covers(1));
        assert!(!fence.covers(2));
    }

    #[test]
    fn test_untagged_fence_skipped() {
        let text = "```\nplain\n```\n\n```rust\nfn main() {}\n```\n";
        let fences = extract(text);
        assert_eq!(fences.len(), 1);
        assert_eq!(fences[0].raw_lang, "rust");
        assert_eq!(fences[0].virt_uri, "file:///notes/a.md.fence0.rs");
    }

    #[test]
    fn test_alias_and_unknown_tags() {
        let text = "```PY\nx = 1\n```\n\n```cobol\nDISPLAY 'HI'.\n```\n";
        let fences = extract(text);

        assert_eq!(fences.len(), 2);
        assert_eq!(fences[0].raw_lang, "PY");
        assert_eq!(fences[0].canonical.as_deref(), Some("python"));
        assert_eq!(fences[1].canonical, None);
        assert_eq!(fences[1].virt_uri, "file:///notes/a.md.fence1.cobol");
    }

    #[test]
    fn test_fences_are_ordered_and_disjoint() {
        let text = "```go\npackage main\n```\n\ntext\n\n~~~bash\necho hi\n~~~\n\n```lua\nprint(1)\n```\n";
        let fences = extract(text);

        assert_eq!(fences.len(), 3);
        for pair in fences.windows(2) {
            assert!(pair[0].code_end <= pair[1].code_start);
        }
        assert_eq!(fences[1].raw_lang, "bash");
        assert_eq!(fences[1].code, "echo hi\n");
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let text = "intro\n\n```python\na = 1\nb = 2\n";
        let fence = &extract(text)[0];
        assert_eq!(fence.code_start, 3);
        assert_eq!(fence.code_end, 5);
        assert!(fence.covers(4));
    }

    #[test]
    fn test_empty_fence() {
        let text = "```python\n```\n";
        let fence = &extract(text)[0];
        assert_eq!(fence.code, "");
        assert_eq!(fence.code_start, fence.code_end);
    }

    #[test]
    fn test_cache_invalidate_bumps_every_fence() {
        let mut cache = FenceCache::new();
        let text = "```python\nx = 1\n```\n\n```rust\nfn f() {}\n```\n";
        cache.store(URI, extract(text));
        assert_eq!(cache.current_version(URI), 1);

        assert!(cache.invalidate(URI));
        assert!(cache.invalidate(URI));

        assert_eq!(cache.current_version(URI), 3);
        assert!(cache.fences(URI).iter().all(|f| f.version == 3));
        assert!(!cache.invalidate("file:///other.md"));
    }

    #[test]
    fn test_cache_covering() {
        let mut cache = FenceCache::new();
        cache.store(URI, extract("# T\n\n```python\nx = 1\n```\n"));

        assert!(cache.covering(URI, Position::new(3, 0)).is_some());
        assert!(cache.covering(URI, Position::new(2, 0)).is_none());
        assert!(cache.covering("file:///missing.md", Position::new(3, 0)).is_none());

        assert_eq!(cache.remove(URI).len(), 1);
        assert!(!cache.contains(URI));
    }
}
