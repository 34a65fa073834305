//! PDF Cross-Reference Table Parser
//!
//! Parses xref tables and xref streams according to ISO 32000-1 Sections
//! 7.5.4 and 7.5.8, following the `/Prev` chain of incremental updates.

use super::lexer::{rfind_bytes, Lexer, Token};
use super::objects::{ObjectId, ParseContext, PdfDictionary, PdfObject, PdfStream};
use super::trailer::{prev_offset, PdfTrailer};
use super::{ParseError, ParseOptions, ParseResult};
use std::collections::{BTreeMap, HashSet};

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object, linked into the free list
    Free { next: u32, generation: u16 },
    /// Uncompressed object at a byte offset
    InUse { offset: usize, generation: u16 },
    /// Object stored in an object stream
    Compressed { stream: u32, index: u32 },
}

impl XRefEntry {
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => {
                *generation
            }
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

/// Syntax of a cross-reference section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// `xref` keyword table followed by `trailer`
    Table,
    /// `/Type /XRef` stream (PDF 1.5+)
    Stream,
}

/// One section of the `/Prev` chain
#[derive(Debug, Clone)]
pub struct XRefSection {
    pub offset: usize,
    pub kind: XRefKind,
    pub entries: BTreeMap<u32, XRefEntry>,
    pub trailer: PdfDictionary,
}

/// Cross-reference table: every section of the chain plus the merged view
#[derive(Debug, Clone)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    /// Newest section first
    sections: Vec<XRefSection>,
}

impl XRefTable {
    /// Locate `startxref` and load the whole `/Prev` chain. Sections are
    /// applied oldest to newest, so the last write wins per object number.
    pub fn load(data: &[u8], options: &ParseOptions) -> ParseResult<Self> {
        let startxref = find_startxref(data)?;

        let mut sections: Vec<XRefSection> = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(startxref);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                return Err(ParseError::xref(format!(
                    "/Prev chain loops back to byte {offset}"
                )));
            }
            if sections.len() >= options.max_xref_sections {
                return Err(ParseError::xref(format!(
                    "more than {} cross-reference sections",
                    options.max_xref_sections
                )));
            }

            let mut section = parse_section(data, offset, options)?;

            // Hybrid file: the stream carries the entries hidden from old readers
            if section.kind == XRefKind::Table {
                if let Some(stm) = section
                    .trailer
                    .get("XRefStm")
                    .and_then(PdfObject::as_integer)
                    .and_then(|i| usize::try_from(i).ok())
                {
                    if visited.insert(stm) {
                        let hidden = parse_section(data, stm, options)?;
                        for (number, entry) in hidden.entries {
                            let overridable = section
                                .entries
                                .get(&number)
                                .map_or(true, XRefEntry::is_free);
                            if overridable {
                                section.entries.insert(number, entry);
                            }
                        }
                    }
                }
            }

            tracing::debug!(
                "xref section at byte {} ({:?}, {} entries)",
                offset,
                section.kind,
                section.entries.len()
            );
            next = prev_offset(&section.trailer);
            sections.push(section);
        }

        let mut entries = BTreeMap::new();
        for section in sections.iter().rev() {
            entries.extend(section.entries.iter().map(|(n, e)| (*n, *e)));
        }

        Ok(XRefTable { entries, sections })
    }

    /// Entry for an object number
    pub fn get(&self, number: u32) -> Option<XRefEntry> {
        self.entries.get(&number).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, *e))
    }

    /// Sections of the chain, newest first
    pub fn sections(&self) -> &[XRefSection] {
        &self.sections
    }

    /// Ids of every object that is in use
    pub fn live_ids(&self) -> Vec<ObjectId> {
        self.iter()
            .filter_map(|(number, entry)| match entry {
                XRefEntry::InUse { generation, .. } => Some(ObjectId::new(number, generation)),
                XRefEntry::Compressed { .. } => Some(ObjectId::new(number, 0)),
                XRefEntry::Free { .. } => None,
            })
            .collect()
    }

    /// Highest object number named by any section
    pub fn max_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// The effective trailer of the newest revision
    pub fn trailer(&self) -> PdfTrailer {
        let (offset, kind) = self
            .sections
            .first()
            .map(|s| (s.offset, s.kind))
            .unwrap_or((0, XRefKind::Table));
        PdfTrailer::merge(self.sections.iter().rev().map(|s| &s.trailer), offset, kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the `startxref` offset by scanning backward from end-of-file
pub fn find_startxref(data: &[u8]) -> ParseResult<usize> {
    let tail_start = data.len().saturating_sub(1024);
    let position = rfind_bytes(&data[tail_start..], b"startxref")
        .map(|p| p + tail_start)
        .or_else(|| rfind_bytes(data, b"startxref"))
        .ok_or_else(|| ParseError::xref("startxref not found"))?;

    let mut lexer = Lexer::new(data);
    lexer.seek(position);
    match (lexer.next_token(), lexer.next_significant()) {
        (Ok(Token::StartXRef), Ok(Token::Integer(offset))) => usize::try_from(offset)
            .ok()
            .filter(|offset| *offset < data.len())
            .ok_or_else(|| ParseError::xref(format!("startxref offset {offset} out of range"))),
        _ => Err(ParseError::xref("startxref is not followed by an offset")),
    }
}

/// Parse the section at `offset`, turning syntax failures into `InvalidXref`
fn parse_section(data: &[u8], offset: usize, options: &ParseOptions) -> ParseResult<XRefSection> {
    if offset >= data.len() {
        return Err(ParseError::xref(format!(
            "section offset {offset} is past end of file"
        )));
    }
    let mut lexer = Lexer::new(data);
    lexer.seek(offset);
    let result = match lexer.peek_token() {
        Ok(Token::XRef) => parse_table(&mut lexer, offset, options),
        Ok(Token::Integer(_)) => parse_stream_section(&mut lexer, offset, options),
        _ => Err(ParseError::xref(format!(
            "no cross-reference section at byte {offset}"
        ))),
    };
    result.map_err(|e| match e {
        ParseError::InvalidXref(_)
        | ParseError::UnsupportedEncryption
        | ParseError::ResourceLimitExceeded { .. } => e,
        other => ParseError::xref(format!("section at byte {offset}: {other}")),
    })
}

fn parse_table(lexer: &mut Lexer<'_>, offset: usize, options: &ParseOptions) -> ParseResult<XRefSection> {
    lexer.next_significant()?; // xref
    let mut entries = BTreeMap::new();

    loop {
        match lexer.next_significant()? {
            Token::Trailer => break,
            Token::Integer(first) => {
                let count = match lexer.next_significant()? {
                    Token::Integer(count) => count,
                    other => {
                        return Err(ParseError::xref(format!(
                            "bad subsection header near {other:?}"
                        )))
                    }
                };
                let first = u32::try_from(first)
                    .map_err(|_| ParseError::xref("negative subsection start"))?;
                let count = u32::try_from(count)
                    .map_err(|_| ParseError::xref("negative subsection count"))?;
                for i in 0..count {
                    let number = first
                        .checked_add(i)
                        .ok_or_else(|| ParseError::xref("object number overflow"))?;
                    entries.insert(number, parse_table_entry(lexer)?);
                }
            }
            other => {
                return Err(ParseError::xref(format!(
                    "expected subsection or trailer, found {other:?}"
                )))
            }
        }
    }

    let ctx = ParseContext::standalone(options.max_depth);
    let trailer = match PdfObject::parse(lexer, &ctx)? {
        PdfObject::Dictionary(dict) => dict,
        _ => return Err(ParseError::xref("trailer is not a dictionary")),
    };

    Ok(XRefSection {
        offset,
        kind: XRefKind::Table,
        entries,
        trailer,
    })
}

/// One `nnnnnnnnnn ggggg n` entry. Tokens make any EOL style acceptable.
fn parse_table_entry(lexer: &mut Lexer<'_>) -> ParseResult<XRefEntry> {
    let tokens = (
        lexer.next_significant()?,
        lexer.next_significant()?,
        lexer.next_significant()?,
    );
    let (Token::Integer(field), Token::Integer(generation), Token::Keyword(flag)) = tokens else {
        return Err(ParseError::xref("malformed table entry"));
    };
    let generation =
        u16::try_from(generation).map_err(|_| ParseError::xref("generation out of range"))?;
    match flag.as_str() {
        "n" => Ok(XRefEntry::InUse {
            offset: usize::try_from(field).map_err(|_| ParseError::xref("negative offset"))?,
            generation,
        }),
        "f" => Ok(XRefEntry::Free {
            next: u32::try_from(field).unwrap_or(0),
            generation,
        }),
        other => Err(ParseError::xref(format!("unknown entry flag '{other}'"))),
    }
}

fn parse_stream_section(
    lexer: &mut Lexer<'_>,
    offset: usize,
    options: &ParseOptions,
) -> ParseResult<XRefSection> {
    let id = match (
        lexer.next_significant()?,
        lexer.next_significant()?,
        lexer.next_significant()?,
    ) {
        (Token::Integer(n), Token::Integer(g), Token::Obj) => ObjectId::new(
            u32::try_from(n).map_err(|_| ParseError::xref("bad object number"))?,
            u16::try_from(g).map_err(|_| ParseError::xref("bad generation"))?,
        ),
        _ => return Err(ParseError::xref("expected xref stream object")),
    };
    lexer.seek(offset);

    let ctx = ParseContext {
        max_depth: options.max_depth,
        lenient: options.lenient_syntax,
        lengths: &super::objects::NoLengthResolution,
    };
    let stream = match PdfObject::parse_indirect(lexer, &ctx, id)? {
        PdfObject::Stream(stream) if stream.dict.get_type() == Some("XRef") => stream,
        _ => return Err(ParseError::xref(format!("object {id} is not an xref stream"))),
    };

    let entries = decode_xref_stream(&stream, options.max_decoded_bytes)?;
    Ok(XRefSection {
        offset,
        kind: XRefKind::Stream,
        entries,
        trailer: stream.dict,
    })
}

/// Decode the binary rows of an xref stream using `/W` and `/Index`
pub(crate) fn decode_xref_stream(stream: &PdfStream, max_decoded: usize) -> ParseResult<BTreeMap<u32, XRefEntry>> {
    let dict = &stream.dict;
    let int = |obj: &PdfObject| obj.as_integer().and_then(|i| u32::try_from(i).ok());

    let size = dict
        .get("Size")
        .and_then(int)
        .ok_or_else(|| ParseError::xref("xref stream without /Size"))?;

    let index: Vec<(u32, u32)> = match dict.get("Index").and_then(PdfObject::as_array) {
        Some(array) => {
            if array.len() % 2 != 0 {
                return Err(ParseError::xref("/Index must hold pairs"));
            }
            array
                .0
                .chunks(2)
                .map(|pair| match (int(&pair[0]), int(&pair[1])) {
                    (Some(first), Some(count)) => Ok((first, count)),
                    _ => Err(ParseError::xref("/Index values must be integers")),
                })
                .collect::<ParseResult<_>>()?
        }
        None => vec![(0, size)],
    };

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(PdfObject::as_array)
        .filter(|w| w.len() == 3)
        .ok_or_else(|| ParseError::xref("/W must hold three widths"))?
        .iter()
        .map(|w| {
            int(w)
                .map(|w| w as usize)
                .filter(|w| *w <= 8)
                .ok_or_else(|| ParseError::xref("invalid /W width"))
        })
        .collect::<ParseResult<_>>()?;
    let row_len = widths.iter().sum::<usize>();
    if row_len == 0 {
        return Err(ParseError::xref("/W widths are all zero"));
    }

    let data = stream.decode(max_decoded)?;
    let mut rows = data.chunks_exact(row_len);
    let mut entries = BTreeMap::new();

    for (first, count) in index {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| ParseError::xref("xref stream data truncated"))?;
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let (f2, f3) = (read_field(f2), read_field(f3));
            let number = first
                .checked_add(i)
                .ok_or_else(|| ParseError::xref("object number overflow"))?;

            let entry = match kind {
                0 => XRefEntry::Free {
                    next: f2 as u32,
                    generation: f3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: f2 as usize,
                    generation: f3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: f2 as u32,
                    index: f3 as u32,
                },
                other => {
                    tracing::warn!("unknown xref entry type {other} for object {number}");
                    XRefEntry::Free {
                        next: 0,
                        generation: 0,
                    }
                }
            };
            entries.insert(number, entry);
        }
    }

    Ok(entries)
}

/// Big-endian field of up to eight bytes
fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}
