use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text encodings a template (and its generated output) may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    /// UTF-8 written with a byte-order mark.
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

#[derive(Debug, Error)]
#[error("unknown text encoding '{0}' (expected utf8, utf8-bom, utf16le or utf16be)")]
pub struct ParseEncodingError(String);

impl TextEncoding {
    /// Guess the encoding of `bytes`: byte-order mark first, then UTF-8 validity.
    pub fn detect(bytes: &[u8]) -> Option<TextEncoding> {
        if bytes.starts_with(UTF8_BOM) {
            Some(TextEncoding::Utf8Bom)
        } else if bytes.starts_with(UTF16LE_BOM) {
            Some(TextEncoding::Utf16Le)
        } else if bytes.starts_with(UTF16BE_BOM) {
            Some(TextEncoding::Utf16Be)
        } else if std::str::from_utf8(bytes).is_ok() {
            Some(TextEncoding::Utf8)
        } else {
            None
        }
    }

    /// Decode `bytes`, dropping a byte-order mark that matches this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).ok()
            }
            TextEncoding::Utf16Le => {
                let bytes = bytes.strip_prefix(UTF16LE_BOM).unwrap_or(bytes);
                decode_utf16(bytes, u16::from_le_bytes)
            }
            TextEncoding::Utf16Be => {
                let bytes = bytes.strip_prefix(UTF16BE_BOM).unwrap_or(bytes);
                decode_utf16(bytes, u16::from_be_bytes)
            }
        }
    }

    /// Encode `text` for writing, with a byte-order mark for every encoding but plain UTF-8.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf8Bom => [UTF8_BOM, text.as_bytes()].concat(),
            TextEncoding::Utf16Le => {
                let mut out = UTF16LE_BOM.to_vec();
                out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                out
            }
            TextEncoding::Utf16Be => {
                let mut out = UTF16BE_BOM.to_vec();
                out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                out
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Utf8Bom => "utf8-bom",
            TextEncoding::Utf16Le => "utf16le",
            TextEncoding::Utf16Be => "utf16be",
        }
    }

    /// The `String.Encoding` member the generator program writes with.
    pub fn swift_name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => ".utf8",
            TextEncoding::Utf16Le => ".utf16LittleEndian",
            TextEncoding::Utf16Be => ".utf16BigEndian",
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf8-bom" | "utf-8-bom" => Ok(TextEncoding::Utf8Bom),
            "utf16le" | "utf16-le" | "utf-16le" | "utf-16-le" => Ok(TextEncoding::Utf16Le),
            "utf16be" | "utf16-be" | "utf-16be" | "utf-16-be" => Ok(TextEncoding::Utf16Be),
            _ => Err(ParseEncodingError(s.to_string())),
        }
    }
}
