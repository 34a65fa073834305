//! PDF Stream Filters
//!
//! Decodes the streams the engine reads itself (cross-reference streams and
//! object streams) according to ISO 32000-1 Section 7.4. Page content and
//! image filters are never decoded.

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

use flate2::read::ZlibDecoder;
use std::io::Read;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,
}

impl Filter {
    /// Parse filter from name, including the inline-image abbreviations
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            _ => None,
        }
    }
}

/// Decode stream data according to the `/Filter` and `/DecodeParms` entries.
///
/// `limit` caps the size of every intermediate and final result.
pub fn decode_stream(data: &[u8], dict: &PdfDictionary, limit: usize) -> ParseResult<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => array
            .iter()
            .map(|obj| {
                obj.as_name().ok_or_else(|| {
                    ParseError::StreamDecodeError("Invalid filter in array".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        Some(_) => {
            return Err(ParseError::StreamDecodeError(
                "Invalid Filter type".to_string(),
            ))
        }
    };

    let mut result = data.to_vec();
    for (index, filter_name) in filters.into_iter().enumerate() {
        let filter = Filter::from_name(filter_name).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Unsupported filter: {filter_name}"))
        })?;
        result = match filter {
            Filter::FlateDecode => decode_flate(&result, limit)?,
            Filter::ASCIIHexDecode => decode_ascii_hex(&result)?,
        };
        if let Some(params) = decode_params(dict, index) {
            result = apply_predictor(result, params, limit)?;
        }
    }

    Ok(result)
}

/// `/DecodeParms` for the filter at `index` (a dictionary or an array of them)
fn decode_params(dict: &PdfDictionary, index: usize) -> Option<&PdfDictionary> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP"))? {
        PdfObject::Dictionary(params) if index == 0 => Some(params),
        PdfObject::Array(array) => array.get(index).and_then(PdfObject::as_dict),
        _ => None,
    }
}

/// Decode FlateDecode (zlib/deflate) compressed data, reading at most `limit` bytes
fn decode_flate(data: &[u8], limit: usize) -> ParseResult<Vec<u8>> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoder = ZlibDecoder::new(data).take(cap);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode error: {e}")))?;
    if result.len() > limit {
        return Err(ParseError::ResourceLimitExceeded {
            size: result.len(),
            limit,
        });
    }
    Ok(result)
}

/// Decode ASCIIHexDecode data; `>` terminates, whitespace is ignored
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &ch in data {
        if ch == b'>' {
            break;
        }
        if super::lexer::is_whitespace(ch) {
            continue;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit 0x{ch:02X}"))
        })?;
        match high.take() {
            Some(h) => result.push((h << 4) | value),
            None => high = Some(value),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

/// Undo a TIFF (1) or PNG (>= 10) predictor
fn apply_predictor(data: Vec<u8>, params: &PdfDictionary, limit: usize) -> ParseResult<Vec<u8>> {
    let int = |key: &str, default: i64| {
        params
            .get(key)
            .and_then(PdfObject::as_integer)
            .unwrap_or(default)
    };
    let predictor = int("Predictor", 1);
    if predictor == 1 {
        return Ok(data);
    }
    if predictor == 2 {
        return Err(ParseError::StreamDecodeError(
            "TIFF predictor 2 is not supported".to_string(),
        ));
    }
    if predictor < 10 {
        return Err(ParseError::StreamDecodeError(format!(
            "Unknown predictor {predictor}"
        )));
    }

    if data.is_empty() {
        return Ok(data);
    }

    let colors = int("Colors", 1).clamp(1, 32) as usize;
    let bits = int("BitsPerComponent", 8).clamp(1, 16) as usize;
    let columns = usize::try_from(int("Columns", 1).max(1)).map_err(|_| {
        ParseError::StreamDecodeError("/Columns out of range".to_string())
    })?;
    let bpp = (colors * bits).div_ceil(8);
    // A row wider than the whole input cannot be a real row
    let row_len = (colors * bits)
        .checked_mul(columns)
        .map(|bits_per_row| bits_per_row.div_ceil(8))
        .filter(|&len| len <= data.len())
        .ok_or_else(|| {
            ParseError::StreamDecodeError(format!(
                "/Columns {columns} is too wide for {} bytes of data",
                data.len()
            ))
        })?;
    let rows = data.len().div_ceil(row_len + 1);
    if rows.saturating_mul(row_len) > limit {
        return Err(ParseError::ResourceLimitExceeded {
            size: rows.saturating_mul(row_len),
            limit,
        });
    }

    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let Some((&filter_type, encoded)) = chunk.split_first() else {
            break;
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Invalid PNG row filter {other}"
                    )))
                }
            };
        }

        output.extend_from_slice(&row);
        previous = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
