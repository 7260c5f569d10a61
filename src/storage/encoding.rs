//! Text encoding at the file and network boundary
//!
//! Everything inside the crate is UTF-8. The output file (and often the site
//! itself) uses a single-byte legacy codepage, so text is converted only when
//! it crosses that boundary.

use encoding_rs::Encoding;
use std::borrow::Cow;

use crate::ConfigError;

/// An ASCII-compatible text encoding selected by its WHATWG label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codepage(&'static Encoding);

impl Codepage {
    /// Looks up an encoding by label (`"windows-1251"`, `"cp1251"`, `"utf-8"`, ...)
    ///
    /// Encodings that are not ASCII-compatible are rejected: CSV delimiters,
    /// quotes and terminators must stay single ASCII bytes.
    pub fn from_label(label: &str) -> Result<Self, ConfigError> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))?;

        if !encoding.is_ascii_compatible() || encoding.output_encoding() != encoding {
            return Err(ConfigError::UnknownEncoding(format!(
                "{} (not an ASCII-compatible codepage)",
                label
            )));
        }

        Ok(Self(encoding))
    }

    /// The canonical name of the encoding
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Encodes `text`, or returns `None` if some character has no mapping
    pub fn encode<'a>(&self, text: &'a str) -> Option<Cow<'a, [u8]>> {
        let (bytes, _, had_unmappable) = self.0.encode(text);
        if had_unmappable {
            None
        } else {
            Some(bytes)
        }
    }

    /// Decodes `bytes`, replacing malformed sequences with U+FFFD
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        self.0.decode_with_bom_removal(bytes).0
    }
}
