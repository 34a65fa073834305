//! PDF serialization
//!
//! Two modes: an incremental update appended to the original bytes, or a full
//! rewrite with a single cross-reference table. Either way the produced bytes
//! are parsed again before they are returned.

use crate::parser::lexer::is_regular;
use crate::parser::{
    ObjectId, ParseError, ParseOptions, PdfArray, PdfDictionary, PdfDocument, PdfObject, PdfStream,
    PdfString, XRefKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// How the output file is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Append changed objects to the untouched original
    #[default]
    Incremental,
    /// Write every live object into a fresh file
    FullRewrite,
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be read while it was copied
    #[error("Cannot read source object: {0}")]
    Source(#[from] ParseError),

    #[error("Written output does not parse back: {0}")]
    Verification(ParseError),

    #[error("Cannot serialize: {0}")]
    Unsupported(String),
}

pub type WriteResult<T> = Result<T, SerializationError>;

pub struct PdfWriter<W: Write> {
    writer: W,
    xref_positions: BTreeMap<u32, (usize, u16)>,
    current_position: usize,
}

impl PdfWriter<Vec<u8>> {
    /// Serialize `doc` and verify the result
    pub fn write(doc: &mut PdfDocument<'_>, mode: WriteMode) -> WriteResult<Vec<u8>> {
        let (bytes, written) = match mode {
            WriteMode::Incremental => write_incremental(doc)?,
            WriteMode::FullRewrite => write_full(doc)?,
        };
        verify(&bytes, doc.options(), &written)?;
        tracing::debug!(
            "serialized {} objects ({:?}), {} bytes",
            written.len(),
            mode,
            bytes.len()
        );
        Ok(bytes)
    }
}

impl<W: Write> PdfWriter<W> {
    pub fn new_with_writer(writer: W) -> Self {
        Self {
            writer,
            xref_positions: BTreeMap::new(),
            current_position: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self, version: &str) -> WriteResult<()> {
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        // Binary comment to ensure file is treated as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    /// Write `n g obj ... endobj` and record its offset
    fn write_object(&mut self, id: ObjectId, object: &PdfObject) -> WriteResult<()> {
        self.xref_positions
            .insert(id.number, (self.current_position, id.generation));
        self.write_bytes(format!("{} {} obj\n", id.number, id.generation).as_bytes())?;
        self.write_object_value(object)?;
        self.write_bytes(b"\nendobj\n")
    }

    fn write_object_value(&mut self, object: &PdfObject) -> WriteResult<()> {
        match object {
            PdfObject::Null => self.write_bytes(b"null")?,
            PdfObject::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            PdfObject::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            PdfObject::Real(r) => self.write_bytes(format_real(*r).as_bytes())?,
            PdfObject::String(s) => self.write_bytes(&escape_string(s))?,
            PdfObject::Name(n) => self.write_bytes(&escape_name(n.as_str()))?,
            PdfObject::Array(array) => {
                self.write_bytes(b"[")?;
                for (i, item) in array.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(item)?;
                }
                self.write_bytes(b"]")?;
            }
            PdfObject::Dictionary(dict) => self.write_dictionary(dict)?,
            PdfObject::Stream(stream) => {
                let mut dict = stream.dict.clone();
                dict.insert("Length", PdfObject::Integer(stream.data.len() as i64));
                self.write_dictionary(&dict)?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(&stream.data)?;
                self.write_bytes(b"\nendstream")?;
            }
            PdfObject::Reference(id) => {
                self.write_bytes(format!("{} {} R", id.number, id.generation).as_bytes())?
            }
        }
        Ok(())
    }

    fn write_dictionary(&mut self, dict: &PdfDictionary) -> WriteResult<()> {
        self.write_bytes(b"<<")?;
        for (key, value) in dict.iter() {
            self.write_bytes(b" ")?;
            self.write_bytes(&escape_name(key.as_str()))?;
            self.write_bytes(b" ")?;
            self.write_object_value(value)?;
        }
        self.write_bytes(b" >>")
    }

    /// Classic table over the recorded positions. With `complete`, one
    /// subsection from 0 with gaps as free entries; otherwise one subsection
    /// per run of consecutive object numbers.
    fn write_xref_table(&mut self, complete: bool) -> WriteResult<()> {
        self.write_bytes(b"xref\n")?;
        let mut table = String::new();
        if complete {
            let size = self.xref_positions.keys().max().map_or(1, |max| max + 1);
            table.push_str(&format!("0 {size}\n0000000000 65535 f \n"));
            for number in 1..size {
                match self.xref_positions.get(&number) {
                    Some((offset, generation)) => {
                        table.push_str(&format!("{offset:010} {generation:05} n \n"))
                    }
                    None => table.push_str("0000000000 00000 f \n"),
                }
            }
        } else {
            for run in runs(self.xref_positions.keys().copied()) {
                table.push_str(&format!("{} {}\n", run.0, run.1));
                for number in run.0..run.0 + run.1 {
                    if let Some((offset, generation)) = self.xref_positions.get(&number) {
                        table.push_str(&format!("{offset:010} {generation:05} n \n"));
                    }
                }
            }
        }
        self.write_bytes(table.as_bytes())
    }

    fn write_trailer(&mut self, trailer: &PdfDictionary, xref_position: usize) -> WriteResult<()> {
        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(trailer)?;
        self.write_startxref(xref_position)
    }

    fn write_startxref(&mut self, xref_position: usize) -> WriteResult<()> {
        self.write_bytes(format!("\nstartxref\n{xref_position}\n%%EOF\n").as_bytes())
    }

    /// Cross-reference stream (`/W [1 4 2]`, uncompressed) for the recorded
    /// positions plus the stream itself
    fn write_xref_stream(&mut self, id: ObjectId, mut dict: PdfDictionary) -> WriteResult<usize> {
        let position = self.current_position;
        self.xref_positions.insert(id.number, (position, id.generation));

        let mut index = PdfArray::new();
        let mut rows = Vec::new();
        for (start, count) in runs(self.xref_positions.keys().copied()) {
            index.push(PdfObject::Integer(start as i64));
            index.push(PdfObject::Integer(count as i64));
            for number in start..start + count {
                if let Some((offset, generation)) = self.xref_positions.get(&number) {
                    let offset = u32::try_from(*offset).map_err(|_| {
                        SerializationError::Unsupported(format!("offset {offset} does not fit /W [1 4 2]"))
                    })?;
                    rows.push(1u8);
                    rows.extend_from_slice(&offset.to_be_bytes());
                    rows.extend_from_slice(&generation.to_be_bytes());
                }
            }
        }

        dict.insert("Type", PdfObject::name("XRef"));
        dict.insert(
            "W",
            PdfObject::Array(PdfArray(vec![
                PdfObject::Integer(1),
                PdfObject::Integer(4),
                PdfObject::Integer(2),
            ])),
        );
        dict.insert("Index", PdfObject::Array(index));
        dict.remove("Filter");
        dict.remove("DecodeParms");

        let stream = PdfObject::Stream(PdfStream { dict, data: rows });
        self.write_bytes(format!("{} {} obj\n", id.number, id.generation).as_bytes())?;
        self.write_object_value(&stream)?;
        self.write_bytes(b"\nendobj\n")?;
        Ok(position)
    }

    fn write_bytes(&mut self, data: &[u8]) -> WriteResult<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len();
        Ok(())
    }
}

/// Runs of consecutive numbers as `(start, count)`
fn runs(numbers: impl Iterator<Item = u32>) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for number in numbers {
        match runs.last_mut() {
            Some((start, count)) if *start + *count == number => *count += 1,
            _ => runs.push((number, 1)),
        }
    }
    runs
}

type Written = Vec<(ObjectId, PdfObject)>;

fn write_incremental(doc: &mut PdfDocument<'_>) -> WriteResult<(Vec<u8>, Written)> {
    let data = doc.data();
    if !doc.is_modified() {
        return Ok((data.to_vec(), Vec::new()));
    }

    let mut writer = PdfWriter::new_with_writer(Vec::with_capacity(data.len() + 4096));
    writer.write_bytes(data)?;
    if !data.ends_with(b"\n") && !data.ends_with(b"\r") {
        writer.write_bytes(b"\n")?;
    }

    let mut written = Vec::new();
    for (id, object) in doc.modified_objects() {
        writer.write_object(id, object)?;
        written.push((id, normalized(object)));
    }

    let previous = doc.trailer();
    let mut trailer = previous.dict.clone();
    trailer.insert("Prev", PdfObject::Integer(previous.xref_offset as i64));
    let size = doc.next_object_number().max(previous.size().unwrap_or(0));

    match previous.kind {
        XRefKind::Table => {
            trailer.insert("Size", PdfObject::Integer(size as i64));
            let xref_position = writer.current_position;
            writer.write_xref_table(false)?;
            writer.write_trailer(&trailer, xref_position)?;
        }
        XRefKind::Stream => {
            let stream_id = ObjectId::new(size, 0);
            trailer.insert("Size", PdfObject::Integer(size as i64 + 1));
            let xref_position = writer.write_xref_stream(stream_id, trailer)?;
            writer.write_startxref(xref_position)?;
        }
    }

    Ok((writer.into_inner(), written))
}

fn write_full(doc: &mut PdfDocument<'_>) -> WriteResult<(Vec<u8>, Written)> {
    let mut writer = PdfWriter::new_with_writer(Vec::with_capacity(doc.data().len()));
    writer.write_header(doc.version())?;

    let mut written = Vec::new();
    for id in doc.live_object_ids() {
        let object = doc.get(id)?;
        if let PdfObject::Stream(stream) = &object {
            if matches!(stream.dict.get_type(), Some("ObjStm") | Some("XRef")) {
                continue;
            }
        }
        writer.write_object(id, &object)?;
        written.push((id, normalized(&object)));
    }

    let previous = doc.trailer();
    let size = writer.xref_positions.keys().max().map_or(1, |max| max + 1);
    let mut trailer = PdfDictionary::new();
    trailer.insert("Size", PdfObject::Integer(size as i64));
    trailer.insert("Root", PdfObject::Reference(previous.root()?));
    if let Some(info) = previous.info() {
        trailer.insert("Info", PdfObject::Reference(info));
    }
    let id = match previous.id() {
        Some(id) => PdfObject::Array(id.clone()),
        None => derived_id(doc.data()),
    };
    trailer.insert("ID", id);

    let xref_position = writer.current_position;
    writer.write_xref_table(true)?;
    writer.write_trailer(&trailer, xref_position)?;
    Ok((writer.into_inner(), written))
}

/// `/ID` pair from an MD5 of the input
fn derived_id(data: &[u8]) -> PdfObject {
    let digest = md5::compute(data);
    let id = PdfObject::String(PdfString::new(digest.0.to_vec()));
    PdfObject::Array(PdfArray(vec![id.clone(), id]))
}

/// The object as it reads back once written
fn normalized(object: &PdfObject) -> PdfObject {
    match object {
        PdfObject::Stream(stream) => {
            let mut stream = stream.clone();
            stream
                .dict
                .insert("Length", PdfObject::Integer(stream.data.len() as i64));
            PdfObject::Stream(stream)
        }
        other => other.clone(),
    }
}

/// Parse the output again and compare every written object
fn verify(bytes: &[u8], options: &ParseOptions, written: &[(ObjectId, PdfObject)]) -> WriteResult<()> {
    let options = ParseOptions {
        max_input_bytes: usize::MAX,
        ..options.clone()
    };
    let mut reparsed = PdfDocument::parse(bytes, &options).map_err(SerializationError::Verification)?;
    for (id, expected) in written {
        let actual = reparsed.get(*id).map_err(SerializationError::Verification)?;
        if &actual != expected {
            return Err(SerializationError::Verification(ParseError::CorruptObject {
                id: *id,
                message: "object differs after re-parsing".to_string(),
            }));
        }
    }
    Ok(())
}

/// Shortest round-trip form, never with an exponent, always with a point
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        tracing::warn!("non-finite real {value} written as 0.0");
        return "0.0".to_string();
    }
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// `/Name` with `#xx` escapes outside the regular printable set
pub fn escape_name(name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for ch in name.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => bytes.push(byte),
            Err(_) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    let mut out = vec![b'/'];
    for byte in bytes {
        if byte > b' ' && byte < 0x7F && byte != b'#' && is_regular(byte) {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        }
    }
    out
}

/// Literal string with every parenthesis and control byte escaped
pub fn escape_string(string: &PdfString) -> Vec<u8> {
    let mut out = vec![b'('];
    for &byte in string.as_bytes() {
        match byte {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            0x00..=0x1F | 0x7F => out.extend_from_slice(format!("\\{byte:03o}").as_bytes()),
            _ => out.push(byte),
        }
    }
    out.push(b')');
    out
}
