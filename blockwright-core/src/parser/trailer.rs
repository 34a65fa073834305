//! PDF Trailer
//!
//! Trailer dictionary access according to ISO 32000-1 Section 7.5.5

use super::objects::{ObjectId, PdfArray, PdfDictionary, PdfObject};
use super::xref::XRefKind;
use super::{ParseError, ParseResult};

/// Keys that describe one cross-reference section rather than the document
const SECTION_KEYS: &[&str] = &[
    "Prev",
    "XRefStm",
    "Type",
    "W",
    "Index",
    "Length",
    "Filter",
    "DecodeParms",
];

/// PDF Trailer information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTrailer {
    /// The effective trailer dictionary
    pub dict: PdfDictionary,
    /// Byte offset of the newest cross-reference section
    pub xref_offset: usize,
    /// Whether that section is a classic table or a stream
    pub kind: XRefKind,
}

impl PdfTrailer {
    /// Merge a chain of trailers, oldest first, so newer sections win key by
    /// key. Section bookkeeping keys are not carried over.
    pub fn merge<'a>(
        chain: impl IntoIterator<Item = &'a PdfDictionary>,
        xref_offset: usize,
        kind: XRefKind,
    ) -> Self {
        let mut dict = PdfDictionary::new();
        for trailer in chain {
            for (key, value) in trailer.iter() {
                if !SECTION_KEYS.contains(&key.as_str()) {
                    dict.0.insert(key.clone(), value.clone());
                }
            }
        }
        PdfTrailer {
            dict,
            xref_offset,
            kind,
        }
    }

    /// Get the size (number of entries in xref table)
    pub fn size(&self) -> Option<u32> {
        self.dict
            .get("Size")
            .and_then(PdfObject::as_integer)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Get the root object reference (document catalog)
    pub fn root(&self) -> ParseResult<ObjectId> {
        self.dict
            .get("Root")
            .and_then(PdfObject::as_reference)
            .ok_or_else(|| ParseError::xref("trailer has no /Root reference"))
    }

    /// Get the info object reference (document information dictionary)
    pub fn info(&self) -> Option<ObjectId> {
        self.dict.get("Info").and_then(PdfObject::as_reference)
    }

    /// Get the ID array (file identifiers)
    pub fn id(&self) -> Option<&PdfArray> {
        self.dict.get("ID").and_then(PdfObject::as_array)
    }

    /// Check if this PDF is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.dict.contains_key("Encrypt")
    }

    /// Validate the trailer dictionary
    pub fn validate(&self) -> ParseResult<()> {
        if self.is_encrypted() {
            return Err(ParseError::UnsupportedEncryption);
        }
        self.root()?;
        Ok(())
    }
}

/// `/Prev` of one section's trailer
pub(crate) fn prev_offset(dict: &PdfDictionary) -> Option<usize> {
    dict.get("Prev")
        .and_then(PdfObject::as_integer)
        .and_then(|i| usize::try_from(i).ok())
}
