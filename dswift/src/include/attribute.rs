/// Why an attribute could not be read from a tag body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeError {
    Missing,
    MissingClosingQuote,
    MultiLine,
}

/// Find `name="value"` in `body` and return the value.
///
/// Whitespace is allowed around `=`. The value may not contain a line break.
pub(crate) fn find_attribute<'a>(body: &'a str, name: &str) -> Result<&'a str, AttributeError> {
    for (at, _) in body.match_indices(name) {
        let starts_word = body[..at]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace());
        if !starts_word {
            continue;
        }

        let rest = body[at + name.len()..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let Some(value) = rest.trim_start().strip_prefix('"') else {
            continue;
        };

        let Some(close) = value.find('"') else {
            return Err(AttributeError::MissingClosingQuote);
        };
        let value = &value[..close];
        if value.contains('\n') {
            return Err(AttributeError::MultiLine);
        }
        return Ok(value);
    }
    Err(AttributeError::Missing)
}
