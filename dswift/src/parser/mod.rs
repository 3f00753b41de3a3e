pub mod grammar;
pub mod scanner;

pub use grammar::{BlockKind, Tag, TagGrammar};
pub use scanner::{Blocks, next_block, next_block_with};

use crate::block::Block;
use crate::document::Document;
use crate::error::BuildError;

/// Parser entry point.
pub struct Parser<'a> {
    document: &'a Document,
    grammar: &'a TagGrammar,
}

impl<'a> Parser<'a> {
    pub fn new(document: &'a Document) -> Self {
        Parser {
            document,
            grammar: TagGrammar::standard(),
        }
    }

    pub fn with_grammar(document: &'a Document, grammar: &'a TagGrammar) -> Self {
        Parser { document, grammar }
    }

    /// Lazily scan the document block by block.
    pub fn blocks(&self) -> Blocks<'a> {
        Blocks::new(self.grammar, self.document)
    }

    /// Scan the whole document.
    pub fn parse(&self) -> Result<Vec<Block>, BuildError> {
        self.blocks().collect()
    }
}
