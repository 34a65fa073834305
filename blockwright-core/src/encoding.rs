//! PDF text string encoding
//!
//! Text strings (ISO 32000-1 Section 7.9.2.2) are either PDFDocEncoding or
//! UTF-16BE with a byte order mark. Field names and values are decoded with
//! [`decode_text`] and written back with [`encode_text`].

use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Code points of PDFDocEncoding bytes that differ from Latin-1
const PDF_DOC_SPECIALS: &[(u8, char)] = &[
    (0x18, '\u{02D8}'),
    (0x19, '\u{02C7}'),
    (0x1A, '\u{02C6}'),
    (0x1B, '\u{02D9}'),
    (0x1C, '\u{02DD}'),
    (0x1D, '\u{02DB}'),
    (0x1E, '\u{02DA}'),
    (0x1F, '\u{02DC}'),
    (0x80, '\u{2022}'),
    (0x81, '\u{2020}'),
    (0x82, '\u{2021}'),
    (0x83, '\u{2026}'),
    (0x84, '\u{2014}'),
    (0x85, '\u{2013}'),
    (0x86, '\u{0192}'),
    (0x87, '\u{2044}'),
    (0x88, '\u{2039}'),
    (0x89, '\u{203A}'),
    (0x8A, '\u{2212}'),
    (0x8B, '\u{2030}'),
    (0x8C, '\u{201E}'),
    (0x8D, '\u{201C}'),
    (0x8E, '\u{201D}'),
    (0x8F, '\u{2018}'),
    (0x90, '\u{2019}'),
    (0x91, '\u{201A}'),
    (0x92, '\u{2122}'),
    (0x93, '\u{FB01}'),
    (0x94, '\u{FB02}'),
    (0x95, '\u{0141}'),
    (0x96, '\u{0152}'),
    (0x97, '\u{0160}'),
    (0x98, '\u{0178}'),
    (0x99, '\u{017D}'),
    (0x9A, '\u{0131}'),
    (0x9B, '\u{0142}'),
    (0x9C, '\u{0153}'),
    (0x9D, '\u{0161}'),
    (0x9E, '\u{017E}'),
    (0xA0, '\u{20AC}'),
];

/// Bytes with no PDFDocEncoding character
const PDF_DOC_UNDEFINED: &[u8] = &[0x7F, 0x9F, 0xAD];

lazy_static::lazy_static! {
    /// PDFDocEncoding byte to character
    static ref PDF_DOC_DECODE: [char; 256] = {
        let mut table = ['\u{FFFD}'; 256];
        for (byte, slot) in table.iter_mut().enumerate() {
            let byte = byte as u8;
            if !PDF_DOC_UNDEFINED.contains(&byte) {
                *slot = char::from(byte);
            }
        }
        for &(byte, ch) in PDF_DOC_SPECIALS {
            table[byte as usize] = ch;
        }
        table
    };

    /// Character to PDFDocEncoding byte, for the characters that are safe in text
    static ref PDF_DOC_ENCODE: HashMap<char, u8> = {
        let mut map = HashMap::new();
        for (byte, &ch) in PDF_DOC_DECODE.iter().enumerate() {
            let byte = byte as u8;
            let control = byte < 0x20 && !matches!(byte, b'\t' | b'\n' | b'\r' | 0x18..=0x1F);
            if ch != '\u{FFFD}' && !control {
                map.insert(ch, byte);
            }
        }
        map
    };
}

/// Force construction of the encoding tables
pub(crate) fn initialize_tables() {
    lazy_static::initialize(&PDF_DOC_DECODE);
    lazy_static::initialize(&PDF_DOC_ENCODE);
}

/// Decode a PDF text string
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|b| PDF_DOC_DECODE[*b as usize]).collect()
}

/// Encode text as PDFDocEncoding when every character is representable,
/// otherwise as UTF-16BE with a byte order mark
pub fn encode_text(text: &str) -> Vec<u8> {
    let pdf_doc: Option<Vec<u8>> = text.chars().map(|ch| PDF_DOC_ENCODE.get(&ch).copied()).collect();
    match pdf_doc {
        Some(bytes) => bytes,
        None => {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            bytes
        }
    }
}

/// Canonical composition used to compare labels
pub fn normalize_label(label: &str) -> String {
    label.nfc().collect()
}
