use std::sync::LazyLock;

/// Outer delimiter every tagged block opens with.
pub const BLOCK_OPENING: &str = "<%";
/// Outer delimiter every tagged block closes with.
pub const BLOCK_CLOSING: &str = "%>";

/// The kinds of block a template is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Literal text between tags.
    Text,
    /// `<% ... %>`: statements run by the render method.
    Code,
    /// `<%= ... %>`: an expression whose value is appended to the output.
    Print,
    /// `<%! ... %>`: declarations hoisted to the generator type.
    Static,
    /// `<%@include file="..." %>`: replaced by another file before scanning.
    Include,
}

impl BlockKind {
    /// Every kind that is written with tags.
    pub const TAGGED: [BlockKind; 4] = [
        BlockKind::Code,
        BlockKind::Print,
        BlockKind::Static,
        BlockKind::Include,
    ];

    /// Opening and closing suffixes appended to the outer delimiters.
    /// `None` for literal text, which has no tags.
    pub fn suffixes(self) -> Option<(&'static str, &'static str)> {
        match self {
            BlockKind::Text => None,
            BlockKind::Code => Some(("", "")),
            BlockKind::Print => Some(("=", "")),
            BlockKind::Static => Some(("!", "")),
            BlockKind::Include => Some(("@include", "")),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Code => "code",
            BlockKind::Print => "print",
            BlockKind::Static => "static",
            BlockKind::Include => "include",
        }
    }
}

/// A tagged block kind with its full delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: BlockKind,
    pub opening: String,
    pub closing: String,
    suffix_len: usize,
}

/// The registry of recognized tags.
///
/// Tags are ordered by descending opening-suffix length so that a tag whose
/// opening is a prefix of another's (`<%` and `<%@include`) is tried last.
#[derive(Debug, Clone)]
pub struct TagGrammar {
    tags: Vec<Tag>,
    max_opening_width: usize,
    min_opening_width: usize,
    max_closing_width: usize,
    min_closing_width: usize,
}

static STANDARD: LazyLock<TagGrammar> = LazyLock::new(|| TagGrammar::new(BlockKind::TAGGED));

impl TagGrammar {
    /// Build a grammar from the given kinds. Repeated kinds and
    /// [`BlockKind::Text`] are ignored.
    pub fn new(kinds: impl IntoIterator<Item = BlockKind>) -> Self {
        let mut tags: Vec<Tag> = Vec::new();
        for kind in kinds {
            let Some((opening, closing)) = kind.suffixes() else {
                continue;
            };
            if tags.iter().any(|t| t.kind == kind) {
                continue;
            }
            tags.push(Tag {
                kind,
                opening: format!("{}{}", BLOCK_OPENING, opening),
                closing: format!("{}{}", closing, BLOCK_CLOSING),
                suffix_len: opening.len(),
            });
        }
        tags.sort_by(|a, b| b.suffix_len.cmp(&a.suffix_len));

        let opening_widths = tags.iter().map(|t| t.opening.len());
        let closing_widths = tags.iter().map(|t| t.closing.len());
        TagGrammar {
            max_opening_width: opening_widths.clone().max().unwrap_or(0),
            min_opening_width: opening_widths.min().unwrap_or(0),
            max_closing_width: closing_widths.clone().max().unwrap_or(0),
            min_closing_width: closing_widths.min().unwrap_or(0),
            tags,
        }
    }

    /// The grammar used for `.dswift` templates.
    pub fn standard() -> &'static TagGrammar {
        &STANDARD
    }

    /// Tags in match order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, kind: BlockKind) -> Option<&Tag> {
        self.tags.iter().find(|t| t.kind == kind)
    }

    /// The first tag (in match order) whose opening delimiter starts `window`.
    pub fn match_opening(&self, window: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| window.starts_with(&t.opening))
    }

    pub fn max_opening_width(&self) -> usize {
        self.max_opening_width
    }

    pub fn min_opening_width(&self) -> usize {
        self.min_opening_width
    }

    pub fn max_closing_width(&self) -> usize {
        self.max_closing_width
    }

    pub fn min_closing_width(&self) -> usize {
        self.min_closing_width
    }
}
