//! The `dswift-tools-version` directive.
//!
//! A template may start with `// dswift-tools-version:<version>` (or `#` instead
//! of `//`) to declare the oldest tool that can process it.

use std::ops::Range;

use semver::Version;

use crate::document::Document;
use crate::error::BuildError;

/// Oldest tools version that understands `<%@include %>` blocks.
pub const INCLUDE_MINIMUM_VERSION: Version = Version::new(1, 0, 10);

const DIRECTIVE_NAME: &str = "dswift-tools-version:";
const COMMENT_MARKERS: [&str; 2] = ["//", "#"];

/// A parsed version directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsVersionDirective {
    pub version: Version,
    /// The whole directive line, line break included.
    pub range: Range<usize>,
}

/// The version the tool itself reports (this crate's package version).
pub fn current_tools_version() -> Version {
    let part = |s: &str| s.parse().unwrap_or(0);
    Version::new(
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// Parse a tools version, padding missing minor and patch components with zero.
pub fn parse_tools_version(value: &str) -> Result<Version, semver::Error> {
    let core_end = value.find(['-', '+']).unwrap_or(value.len());
    let (core, suffix) = value.split_at(core_end);
    let padding = match core.matches('.').count() {
        0 => ".0.0",
        1 => ".0",
        _ => "",
    };
    Version::parse(&format!("{}{}{}", core, padding, suffix))
}

/// Read the directive from the first line of `document`, if there is one.
pub fn required_version(document: &Document) -> Result<Option<ToolsVersionDirective>, BuildError> {
    let text = document.text();
    let Some(after_marker) = COMMENT_MARKERS.iter().find_map(|m| text.strip_prefix(*m)) else {
        return Ok(None);
    };
    let after_space = after_marker.trim_start_matches([' ', '\t']);
    let Some(value) = after_space.strip_prefix(DIRECTIVE_NAME) else {
        return Ok(None);
    };

    let value_start = text.len() - value.len();
    let line_end = text[value_start..]
        .find('\n')
        .map(|i| value_start + i)
        .unwrap_or(text.len());
    let raw = &text[value_start..line_end];
    let trimmed = raw.trim();
    let trimmed_start = value_start + (raw.len() - raw.trim_start().len());

    let version =
        parse_tools_version(trimmed).map_err(|source| BuildError::InvalidToolsVersionNumber {
            value: trimmed.to_string(),
            location: document.locate(trimmed_start..trimmed_start + trimmed.len()),
            source,
        })?;

    let range_end = (line_end + 1).min(text.len());
    Ok(Some(ToolsVersionDirective {
        version,
        range: 0..range_end,
    }))
}

/// Fail if the running tool is older than the directive requires.
pub fn check_tools_version(
    document: &Document,
    directive: Option<&ToolsVersionDirective>,
    running: &Version,
) -> Result<(), BuildError> {
    match directive {
        Some(directive) if *running < directive.version => {
            Err(BuildError::MinimumToolsVersionNotMet {
                expected: directive.version.clone(),
                found: running.clone(),
                feature: None,
                location: document.locate(directive.range.clone()),
            })
        }
        _ => Ok(()),
    }
}

/// Fail if the directive declares a version older than `minimum` while the
/// template uses `feature`. Templates without a directive are unconstrained.
pub fn check_feature_version(
    document: &Document,
    directive: Option<&ToolsVersionDirective>,
    minimum: &Version,
    feature: &str,
) -> Result<(), BuildError> {
    match directive {
        Some(directive) if directive.version < *minimum => {
            Err(BuildError::MinimumToolsVersionNotMet {
                expected: minimum.clone(),
                found: directive.version.clone(),
                feature: Some(feature.to_string()),
                location: document.locate(directive.range.clone()),
            })
        }
        _ => Ok(()),
    }
}
