//! PDF Parser Module
//!
//! A lazy, arena-backed parser for the subset of ISO 32000-1 needed to walk the
//! document catalog, the page tree and the interactive form. Objects are only
//! materialised when first dereferenced.

pub mod document;
pub mod filters;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod trailer;
pub mod xref;

#[cfg(test)]
pub(crate) mod test_helpers;

use serde::{Deserialize, Serialize};

pub use self::document::PdfDocument;
pub use self::lexer::{Lexer, Token};
pub use self::objects::{ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
pub use self::trailer::PdfTrailer;
pub use self::xref::{XRefEntry, XRefKind, XRefSection, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Malformed token at byte {position}: {message}")]
    MalformedToken { position: usize, message: String },

    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Invalid cross-reference data: {0}")]
    InvalidXref(String),

    #[error("Corrupt object {id}: {message}")]
    CorruptObject { id: ObjectId, message: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Encrypted documents are not supported")]
    UnsupportedEncryption,

    #[error("{size} bytes exceed the limit of {limit} bytes")]
    ResourceLimitExceeded { size: usize, limit: usize },
}

impl ParseError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        ParseError::SyntaxError {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn xref(message: impl Into<String>) -> Self {
        ParseError::InvalidXref(message.into())
    }

    /// Attach an object identity to a syntax failure raised while that object was parsed.
    pub(crate) fn within_object(self, id: ObjectId) -> Self {
        match self {
            ParseError::SyntaxError { position, message } => ParseError::CorruptObject {
                id,
                message: format!("{message} (at byte {position})"),
            },
            ParseError::StreamDecodeError(message) => ParseError::CorruptObject { id, message },
            ParseError::MissingKey(key) => ParseError::CorruptObject {
                id,
                message: format!("missing required key /{key}"),
            },
            other => other,
        }
    }
}

/// Parsing options
///
/// The default options are strict: they are the ones used by block detection
/// and form filling. `lenient()` enables the recovery behaviour used by
/// diagnostic tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Largest accepted input, in bytes
    pub max_input_bytes: usize,
    /// Largest decoded size of a single stream, in bytes
    pub max_decoded_bytes: usize,
    /// Maximum nesting of arrays and dictionaries
    pub max_depth: usize,
    /// Maximum number of cross-reference sections followed through `/Prev`
    pub max_xref_sections: usize,
    /// Tolerate missing `endobj`, wrong stream lengths and stray tokens
    pub lenient_syntax: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_input_bytes: 256 * 1024 * 1024,
            max_decoded_bytes: 64 * 1024 * 1024,
            max_depth: 256,
            max_xref_sections: 32,
            lenient_syntax: false,
        }
    }
}

impl ParseOptions {
    /// Strict parsing (the default)
    pub fn strict() -> Self {
        Self::default()
    }

    /// Best-effort parsing for diagnostics
    pub fn lenient() -> Self {
        Self {
            lenient_syntax: true,
            ..Self::default()
        }
    }
}
