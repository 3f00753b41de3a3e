use tracing::trace;

use crate::block::Block;
use crate::document::Document;
use crate::error::BuildError;
use crate::parser::grammar::{BLOCK_CLOSING, BLOCK_OPENING, BlockKind, TagGrammar};

/// Prefix reserved for directives such as `<%@include`.
const DIRECTIVE_PREFIX: char = '@';

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the block starting at `from` using the standard grammar.
///
/// Returns `Ok(None)` once `from` reaches the end of the document.
pub fn next_block(document: &Document, from: usize) -> Result<Option<Block>, BuildError> {
    next_block_with(TagGrammar::standard(), document, from)
}

/// Find the block starting at `from` using `grammar`.
pub fn next_block_with(
    grammar: &TagGrammar,
    document: &Document,
    from: usize,
) -> Result<Option<Block>, BuildError> {
    let source = document.text();
    if from >= source.len() {
        return Ok(None);
    }

    let rest = &source[from..];
    let opener = rest.find(BLOCK_OPENING).map(|i| from + i);
    let closer = rest.find(BLOCK_CLOSING).map(|i| from + i);

    match (opener, closer) {
        (None, Some(close)) => return Err(missing_opening(document, close)),
        (Some(open), Some(close)) if close < open => {
            return Err(missing_opening(document, close));
        }
        _ => {}
    }

    let Some(open) = opener else {
        return Ok(Some(Block::text(from..source.len(), rest)));
    };
    if open > from {
        return Ok(Some(Block::text(from..open, &source[from..open])));
    }

    let window = window_at(source, open, grammar.max_opening_width());
    let Some(tag) = grammar.match_opening(window) else {
        return Err(document.error_at(open..open + window.len(), |location| {
            BuildError::UnrecognizedBlockTag {
                tag: window.to_string(),
                location,
            }
        }));
    };

    let content_start = open + tag.opening.len();
    let Some(content_len) = source[content_start..].find(&tag.closing) else {
        return Err(document.error_at(open..content_start, |location| {
            BuildError::MissingClosingBlock {
                expected: tag.closing.clone(),
                location,
            }
        }));
    };
    let content_end = content_start + content_len;
    let end = content_end + tag.closing.len();
    let raw = &source[content_start..content_end];

    if tag.kind == BlockKind::Code && raw.starts_with(DIRECTIVE_PREFIX) {
        let name_len = raw
            .find(|c: char| c.is_whitespace())
            .unwrap_or(raw.len());
        return Err(document.error_at(open..content_start + name_len, |location| {
            BuildError::UnrecognizedBlockTag {
                tag: format!("{}{}", BLOCK_OPENING, &raw[..name_len]),
                location,
            }
        }));
    }

    trace!(kind = tag.kind.name(), start = open, end, "scanned block");
    Ok(Some(Block::new(tag.kind, open..end, trim_line_breaks(raw))))
}

/// Iterator over every block of a document, in order.
///
/// Stops after yielding the first error.
pub struct Blocks<'a> {
    grammar: &'a TagGrammar,
    document: &'a Document,
    cursor: usize,
    failed: bool,
}

impl<'a> Blocks<'a> {
    pub fn new(grammar: &'a TagGrammar, document: &'a Document) -> Self {
        Blocks {
            grammar,
            document,
            cursor: 0,
            failed: false,
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = Result<Block, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match next_block_with(self.grammar, self.document, self.cursor) {
            Ok(Some(block)) => {
                self.cursor = block.range.end;
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn missing_opening(document: &Document, close: usize) -> BuildError {
    document.error_at(close..close + BLOCK_CLOSING.len(), |location| {
        BuildError::MissingOpeningBlock { location }
    })
}

/// Up to `width` bytes of `source` starting at `at`, cut back to a char boundary.
fn window_at(source: &str, at: usize, width: usize) -> &str {
    let mut end = (at + width).min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    &source[at..end]
}

/// Remove one leading and one trailing line break.
fn trim_line_breaks(content: &str) -> &str {
    let content = content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content);
    match content.strip_suffix('\n') {
        Some(trimmed) => trimmed.strip_suffix('\r').unwrap_or(trimmed),
        None => content,
    }
}
