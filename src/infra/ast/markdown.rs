use std::sync::Mutex;

use tree_sitter::{Language, Parser, Tree};

use crate::error::ParseError;

/// Node kinds of the markdown block grammar that fence extraction reads
pub mod node_kinds {
    pub const FENCED_CODE_BLOCK: &str = "fenced_code_block";
    pub const INFO_STRING: &str = "info_string";
    pub const CODE_FENCE_CONTENT: &str = "code_fence_content";
}

/// Thread-safe wrapper over a tree-sitter parser loaded with the markdown grammar
pub struct MarkdownParser {
    parser: Mutex<Parser>,
}

impl MarkdownParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            parser: Mutex::new(Self::create_parser(tree_sitter_md::LANGUAGE.into())?),
        })
    }

    fn create_parser(language: Language) -> Result<Parser, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ParseError::Grammar(e.to_string()))?;
        Ok(parser)
    }

    /// Parse a whole document; `uri` only labels errors
    pub fn parse(&self, uri: &str, text: &str) -> Result<Tree, ParseError> {
        let mut parser = self
            .parser
            .lock()
            .map_err(|_| ParseError::Grammar("Parser lock poisoned".to_string()))?;

        parser
            .parse(text, None)
            .ok_or_else(|| ParseError::NoTree(uri.to_string()))
    }
}
