use std::fmt;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use semver::Version;
use thiserror::Error;

use crate::encoding::TextEncoding;

/// A position inside an original template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// Byte span in the original file (not the include-expanded buffer).
    pub span: Range<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// Everything that can stop a single template from being built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("found closing block `%>` without an opening block at {location}")]
    MissingOpeningBlock { location: Location },

    #[error("block opened at {location} is missing its closing `{expected}`")]
    MissingClosingBlock { expected: String, location: Location },

    #[error("unrecognized block tag `{tag}` at {location}")]
    UnrecognizedBlockTag { tag: String, location: Location },

    #[error("include path at {location} must not span multiple lines")]
    InvalidIncludedFileFormat { location: Location },

    #[error(
        "included file '{include_path}' not found at {location} (resolved to '{}')",
        .resolved.display()
    )]
    IncludedFileNotFound {
        include_path: String,
        resolved: PathBuf,
        location: Location,
    },

    #[error("failed to include '{include_path}' at {location}")]
    FailedToIncludeFile {
        include_path: String,
        location: Location,
        #[source]
        source: Box<BuildError>,
    },

    #[error("include block at {location} was never expanded")]
    FoundUnprocessedInclude { location: Location },

    #[error("block at {location} is missing the '{attribute}' attribute")]
    MissingBlockAttribute { attribute: String, location: Location },

    #[error("attribute '{attribute}' at {location} is missing its closing quote")]
    AttributeMissingClosingQuote { attribute: String, location: Location },

    #[error("including '{include_path}' at {location} forms a cycle: {}", format_chain(.chain))]
    CyclicInclude {
        include_path: String,
        chain: Vec<PathBuf>,
        location: Location,
    },

    #[error("invalid tools version '{value}' at {location}")]
    InvalidToolsVersionNumber {
        value: String,
        location: Location,
        #[source]
        source: semver::Error,
    },

    #[error(
        "minimum tools version {expected} not met at {location}: found {found}{}",
        feature_suffix(.feature)
    )]
    MinimumToolsVersionNotMet {
        expected: Version,
        found: Version,
        feature: Option<String>,
        location: Location,
    },

    #[error("failed to {operation} '{}'", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not detect the text encoding of '{}'", .path.display())]
    UnknownEncoding { path: PathBuf },

    #[error("'{}' is not valid {encoding} text", .path.display())]
    Encoding {
        path: PathBuf,
        encoding: TextEncoding,
    },

    #[error("generator program for '{}' failed", .template.display())]
    Execution {
        template: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn feature_suffix(feature: &Option<String>) -> String {
    match feature {
        Some(feature) => format!(" (required by {})", feature),
        None => String::new(),
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl BuildError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        BuildError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Where in a template this error was raised, if it is tied to one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            BuildError::MissingOpeningBlock { location }
            | BuildError::MissingClosingBlock { location, .. }
            | BuildError::UnrecognizedBlockTag { location, .. }
            | BuildError::InvalidIncludedFileFormat { location }
            | BuildError::IncludedFileNotFound { location, .. }
            | BuildError::FailedToIncludeFile { location, .. }
            | BuildError::FoundUnprocessedInclude { location }
            | BuildError::MissingBlockAttribute { location, .. }
            | BuildError::AttributeMissingClosingQuote { location, .. }
            | BuildError::CyclicInclude { location, .. }
            | BuildError::InvalidToolsVersionNumber { location, .. }
            | BuildError::MinimumToolsVersionNotMet { location, .. } => Some(location),
            BuildError::Io { .. }
            | BuildError::UnknownEncoding { .. }
            | BuildError::Encoding { .. }
            | BuildError::Execution { .. } => None,
        }
    }

    /// The innermost error, looking through `FailedToIncludeFile` wrappers.
    pub fn root_cause(&self) -> &BuildError {
        let mut current = self;
        while let BuildError::FailedToIncludeFile { source, .. } = current {
            current = source;
        }
        current
    }

    /// Include sites leading to the root cause, outermost first.
    pub fn include_chain(&self) -> Vec<&Location> {
        let mut chain = Vec::new();
        let mut current = self;
        while let BuildError::FailedToIncludeFile {
            location, source, ..
        } = current
        {
            chain.push(location);
            current = source;
        }
        chain
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    ///
    /// `file_id` maps a template path to its id in the caller's file database;
    /// paths it cannot map are left unlabelled.
    pub fn to_diagnostic(
        &self,
        mut file_id: impl FnMut(&Path) -> Option<usize>,
    ) -> Diagnostic<usize> {
        let root = self.root_cause();
        let mut labels = Vec::new();

        if let Some(location) = root.location() {
            if let Some(id) = file_id(&location.path) {
                labels.push(Label::primary(id, location.span.clone()));
            }
        }
        for site in self.include_chain().into_iter().rev() {
            if let Some(id) = file_id(&site.path) {
                labels.push(
                    Label::secondary(id, site.span.clone()).with_message("included from here"),
                );
            }
        }

        let mut notes = Vec::new();
        if let Some(cause) = std::error::Error::source(root) {
            notes.push(format!("caused by: {}", cause));
        }

        Diagnostic::error()
            .with_message(root.to_string())
            .with_labels(labels)
            .with_notes(notes)
    }
}
