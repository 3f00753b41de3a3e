use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BuildError, Location};

/// An original file that contributed text to a [`Document`].
#[derive(Debug)]
struct SourceFile {
    path: PathBuf,
    /// Byte offset at which every line starts.
    line_starts: Vec<usize>,
}

impl SourceFile {
    fn new(path: PathBuf, text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceFile { path, line_starts }
    }

    /// 1-based line containing `offset`.
    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }
}

/// An include tag that pulled text into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSite {
    /// The `file` attribute as written.
    pub include_path: String,
    /// The whole include tag in the including file.
    pub location: Location,
}

/// A run of document text that came from one place.
#[derive(Debug, Clone)]
struct Segment {
    /// Offset of the run in the document text.
    start: usize,
    file: Arc<SourceFile>,
    /// Where the run came from in `file`.
    origin: Range<usize>,
    /// Generated text (include markers). Every byte maps to the whole of `origin`.
    synthetic: bool,
    /// Include tags the run was pulled in through, outermost first.
    sites: Vec<IncludeSite>,
}

/// The text of a template being processed, after include expansion,
/// together with a map back to the files each part came from.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    root: Arc<SourceFile>,
    segments: Vec<Segment>,
}

impl Document {
    /// A document made of a single file's text, with no includes expanded.
    pub fn from_source(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let root = Arc::new(SourceFile::new(path.into(), &text));
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment {
                start: 0,
                file: root.clone(),
                origin: 0..text.len(),
                synthetic: false,
                sites: Vec::new(),
            }]
        };
        Document {
            text,
            root,
            segments,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The file this document was built for.
    pub fn path(&self) -> &Path {
        &self.root.path
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map a byte range of the document text back to its original file.
    pub fn locate(&self, range: Range<usize>) -> Location {
        let Some(segment) = self.segment_at(range.start) else {
            return Location {
                path: self.root.path.clone(),
                line: 1,
                span: 0..0,
            };
        };

        let span = if segment.synthetic {
            segment.origin.clone()
        } else {
            let start = segment.origin.start + (range.start - segment.start);
            let end = (start + range.len()).min(segment.origin.end);
            start..end.max(start)
        };

        Location {
            path: segment.file.path.clone(),
            line: segment.file.line_of(span.start),
            span,
        }
    }

    /// Include tags the text at `offset` was pulled in through, outermost first.
    pub fn include_sites(&self, offset: usize) -> &[IncludeSite] {
        self.segment_at(offset)
            .map(|segment| segment.sites.as_slice())
            .unwrap_or_default()
    }

    /// Build the error raised at `range`, wrapped in `FailedToIncludeFile`
    /// for every include tag the text was pulled in through.
    pub fn error_at(
        &self,
        range: Range<usize>,
        error: impl FnOnce(Location) -> BuildError,
    ) -> BuildError {
        let sites = self.include_sites(range.start);
        let error = error(self.locate(range));
        sites
            .iter()
            .rev()
            .fold(error, |source, site| BuildError::FailedToIncludeFile {
                include_path: site.include_path.clone(),
                location: site.location.clone(),
                source: Box::new(source),
            })
    }

    fn segment_at(&self, offset: usize) -> Option<&Segment> {
        let index = self
            .segments
            .partition_point(|s| s.start <= offset)
            .saturating_sub(1);
        self.segments.get(index)
    }
}

/// Builds a document by splicing original text, generated text and
/// other documents together while keeping the source map intact.
#[derive(Debug)]
pub(crate) struct DocumentBuilder<'a> {
    source: &'a str,
    file: Arc<SourceFile>,
    text: String,
    segments: Vec<Segment>,
}

impl<'a> DocumentBuilder<'a> {
    /// Start building a document for the file at `path` whose text is `source`.
    pub(crate) fn new(path: &Path, source: &'a str) -> Self {
        DocumentBuilder {
            source,
            file: Arc::new(SourceFile::new(path.to_path_buf(), source)),
            text: String::with_capacity(source.len()),
            segments: Vec::new(),
        }
    }

    /// Copy `range` of the original text.
    pub(crate) fn push_original(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.segments.push(Segment {
            start: self.text.len(),
            file: self.file.clone(),
            origin: range.clone(),
            synthetic: false,
            sites: Vec::new(),
        });
        self.text.push_str(&self.source[range]);
    }

    /// Insert generated text attributed to `origin` in the original text.
    pub(crate) fn push_synthetic(&mut self, text: &str, origin: Range<usize>) {
        if text.is_empty() {
            return;
        }
        self.segments.push(Segment {
            start: self.text.len(),
            file: self.file.clone(),
            origin,
            synthetic: true,
            sites: Vec::new(),
        });
        self.text.push_str(text);
    }

    /// Insert another document pulled in by the include tag at `site`,
    /// keeping its own source map.
    pub(crate) fn push_document(&mut self, document: &Document, site: &IncludeSite) {
        let offset = self.text.len();
        self.segments
            .extend(document.segments.iter().map(|segment| Segment {
                start: segment.start + offset,
                file: segment.file.clone(),
                origin: segment.origin.clone(),
                synthetic: segment.synthetic,
                sites: std::iter::once(site.clone())
                    .chain(segment.sites.iter().cloned())
                    .collect(),
            }));
        self.text.push_str(&document.text);
    }

    pub(crate) fn finish(self) -> Document {
        Document {
            text: self.text,
            root: self.file,
            segments: self.segments,
        }
    }
}
