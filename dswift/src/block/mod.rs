use std::ops::Range;

use crate::parser::grammar::BlockKind;

/// One unit of a template: a tagged region or a run of literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Byte span in the document, delimiters included.
    pub range: Range<usize>,
    /// Text between the delimiters. For tagged blocks a single leading and
    /// trailing line break has been removed.
    pub content: String,
}

impl Block {
    pub fn new(kind: BlockKind, range: Range<usize>, content: impl Into<String>) -> Self {
        Block {
            kind,
            range,
            content: content.into(),
        }
    }

    pub fn text(range: Range<usize>, content: impl Into<String>) -> Self {
        Block::new(BlockKind::Text, range, content)
    }

    /// The content split on `\n`, keeping empty lines and dropping a trailing `\r`
    /// from each line. A trailing newline yields a final empty line.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }
}
