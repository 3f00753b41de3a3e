//! Include expansion.
//!
//! `<%@include file="..." %>` blocks are replaced by the (recursively expanded)
//! contents of the referenced file before a template is scanned for blocks.

mod attribute;

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use tracing::debug;

use crate::document::{Document, DocumentBuilder, IncludeSite};
use crate::error::{BuildError, Location};
use crate::fs::{self, FileSystem};
use crate::parser::grammar::{BlockKind, TagGrammar};
use crate::version::{self, INCLUDE_MINIMUM_VERSION};

use attribute::{AttributeError, find_attribute};

const FILE_ATTRIBUTE: &str = "file";

/// One include block found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Span of the whole include tag in the including file.
    pub include_range: Range<usize>,
    /// The `file` attribute as written.
    pub include_path: String,
    /// `include_path` resolved against the including file's directory.
    pub absolute_path: PathBuf,
}

/// Find every include block of `document`, in order.
///
/// This is a dedicated pass over the raw text: it only looks for the include
/// tag and ignores every other kind of block.
pub fn find_includes(document: &Document) -> Result<Vec<IncludedFile>, BuildError> {
    let Some(tag) = TagGrammar::standard().tag(BlockKind::Include) else {
        return Ok(Vec::new());
    };
    let source = document.text();
    let mut includes = Vec::new();
    let mut cursor = 0;

    while let Some(found) = source[cursor..].find(&tag.opening) {
        let start = cursor + found;
        let body_start = start + tag.opening.len();
        let Some(body_len) = source[body_start..].find(&tag.closing) else {
            return Err(BuildError::MissingClosingBlock {
                expected: tag.closing.clone(),
                location: document.locate(start..body_start),
            });
        };
        let body_end = body_start + body_len;
        let end = body_end + tag.closing.len();
        let location = || document.locate(start..end);

        let include_path = match find_attribute(&source[body_start..body_end], FILE_ATTRIBUTE) {
            Ok(value) => value.to_string(),
            Err(AttributeError::Missing) => {
                return Err(BuildError::MissingBlockAttribute {
                    attribute: FILE_ATTRIBUTE.to_string(),
                    location: location(),
                });
            }
            Err(AttributeError::MissingClosingQuote) => {
                return Err(BuildError::AttributeMissingClosingQuote {
                    attribute: FILE_ATTRIBUTE.to_string(),
                    location: location(),
                });
            }
            Err(AttributeError::MultiLine) => {
                return Err(BuildError::InvalidIncludedFileFormat { location: location() });
            }
        };

        includes.push(IncludedFile {
            include_range: start..end,
            absolute_path: fs::resolve_include(document.path(), &include_path),
            include_path,
        });
        cursor = end;
    }

    Ok(includes)
}

fn begin_marker(include_path: &str) -> String {
    format!("// *** Begin Included '{}' ***\n", include_path)
}

fn end_marker(include_path: &str) -> String {
    format!("// *** End Include '{}' ***\n", include_path)
}

/// Expands includes for one top-level build.
///
/// Completed expansions are cached by absolute path, so a file included many
/// times is read and expanded once. Files currently being expanded are tracked
/// so that include cycles fail instead of recursing forever.
pub struct IncludeExpander<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    tools_version: &'a Version,
    cache: HashMap<PathBuf, Arc<Document>>,
    expanding: Vec<PathBuf>,
}

impl<'a, F: FileSystem + ?Sized> IncludeExpander<'a, F> {
    pub fn new(fs: &'a F, tools_version: &'a Version) -> Self {
        IncludeExpander {
            fs,
            tools_version,
            cache: HashMap::new(),
            expanding: Vec::new(),
        }
    }

    /// Expand `source`, the text of the file at absolute `path`.
    ///
    /// The version directive (if any) is checked and removed from the result.
    pub fn expand(&mut self, path: &Path, source: &str) -> Result<Document, BuildError> {
        self.expanding.push(path.to_path_buf());
        let result = self.expand_file(path, source);
        self.expanding.pop();
        result
    }

    fn expand_file(&mut self, path: &Path, source: &str) -> Result<Document, BuildError> {
        let original = Document::from_source(path, source);
        let directive = version::required_version(&original)?;
        version::check_tools_version(&original, directive.as_ref(), self.tools_version)?;

        let includes = find_includes(&original)?;
        if !includes.is_empty() {
            version::check_feature_version(
                &original,
                directive.as_ref(),
                &INCLUDE_MINIMUM_VERSION,
                "includes",
            )?;
        }

        let mut builder = DocumentBuilder::new(path, source);
        let mut cursor = directive.map(|d| d.range.end).unwrap_or(0);

        for include in &includes {
            builder.push_original(cursor..include.include_range.start);

            let site = IncludeSite {
                include_path: include.include_path.clone(),
                location: original.locate(include.include_range.clone()),
            };
            let expansion = self.expansion_of(include, site.location.clone())?;

            let tag = include.include_range.clone();
            builder.push_synthetic(&begin_marker(&include.include_path), tag.clone());
            builder.push_document(&expansion, &site);
            if !expansion.is_empty() && !expansion.text().ends_with('\n') {
                builder.push_synthetic("\n", tag.clone());
            }
            builder.push_synthetic(&end_marker(&include.include_path), tag);

            cursor = include.include_range.end;
        }
        builder.push_original(cursor..source.len());

        Ok(builder.finish())
    }

    fn expansion_of(
        &mut self,
        include: &IncludedFile,
        location: Location,
    ) -> Result<Arc<Document>, BuildError> {
        let target = &include.absolute_path;

        if let Some(cached) = self.cache.get(target) {
            debug!(include = %target.display(), "reusing cached include");
            return Ok(cached.clone());
        }

        if self.expanding.contains(target) {
            let mut chain = self.expanding.clone();
            chain.push(target.clone());
            return Err(BuildError::CyclicInclude {
                include_path: include.include_path.clone(),
                chain,
                location,
            });
        }

        if !self.fs.exists(target) {
            return Err(BuildError::IncludedFileNotFound {
                include_path: include.include_path.clone(),
                resolved: target.clone(),
                location,
            });
        }

        debug!(include = %target.display(), "expanding include");
        let expanded = fs::read_text(self.fs, target, None)
            .and_then(|(text, _)| self.expand(target, &text))
            .map_err(|source| BuildError::FailedToIncludeFile {
                include_path: include.include_path.clone(),
                location,
                source: Box::new(source),
            })?;

        let expanded = Arc::new(expanded);
        self.cache.insert(target.clone(), expanded.clone());
        Ok(expanded)
    }
}
