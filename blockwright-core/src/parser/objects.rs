//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an indirect object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object. Each char holds one byte of the decoded name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfName(pub String);

/// PDF String object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object. Keys are kept sorted so serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub BTreeMap<PdfName, PdfObject>);

/// PDF Stream object. `data` holds the raw, still encoded, bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Get the decoded stream data, failing once it grows past `limit` bytes
    pub fn decode(&self, limit: usize) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(&self.data, &self.dict, limit)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

/// Lookup of indirect `/Length` values while a stream is being parsed
pub trait ResolveLength {
    fn resolve_length(&self, id: ObjectId) -> Option<usize>;
}

/// Used where indirect lengths cannot be followed (inside object streams)
pub struct NoLengthResolution;

impl ResolveLength for NoLengthResolution {
    fn resolve_length(&self, _id: ObjectId) -> Option<usize> {
        None
    }
}

/// Knobs shared by every object parse
pub struct ParseContext<'r> {
    pub max_depth: usize,
    pub lenient: bool,
    pub lengths: &'r dyn ResolveLength,
}

impl ParseContext<'static> {
    /// Strict context without indirect length resolution
    pub fn standalone(max_depth: usize) -> Self {
        ParseContext {
            max_depth,
            lenient: false,
            lengths: &NoLengthResolution,
        }
    }
}

impl PdfObject {
    /// Parse a PDF object from a lexer
    pub fn parse(lexer: &mut Lexer<'_>, ctx: &ParseContext<'_>) -> ParseResult<Self> {
        parse_value(lexer, ctx, 0)
    }

    /// Parse `n g obj ... endobj` at the lexer position, checking the header
    /// against `expected`.
    pub fn parse_indirect(
        lexer: &mut Lexer<'_>,
        ctx: &ParseContext<'_>,
        expected: ObjectId,
    ) -> ParseResult<Self> {
        let header = (
            lexer.next_significant()?,
            lexer.next_significant()?,
            lexer.next_significant()?,
        );
        match header {
            (Token::Integer(n), Token::Integer(g), Token::Obj)
                if n == i64::from(expected.number) && g == i64::from(expected.generation) => {}
            (Token::Integer(n), Token::Integer(g), Token::Obj) => {
                return Err(ParseError::CorruptObject {
                    id: expected,
                    message: format!("object header reads {n} {g} obj"),
                });
            }
            _ => {
                return Err(ParseError::CorruptObject {
                    id: expected,
                    message: "missing object header".to_string(),
                });
            }
        }

        let object = Self::parse(lexer, ctx).map_err(|e| e.within_object(expected))?;

        let end = lexer.position();
        match lexer.next_significant() {
            Ok(Token::EndObj) => Ok(object),
            _ if ctx.lenient => {
                lexer.seek(end);
                Ok(object)
            }
            _ => Err(ParseError::CorruptObject {
                id: expected,
                message: "missing endobj".to_string(),
            }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an Integer or a Real
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Integer(i) => Some(*i as f64),
            PdfObject::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary of a Dictionary or a Stream
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn name(value: &str) -> Self {
        PdfObject::Name(PdfName::new(value))
    }
}

fn parse_value(lexer: &mut Lexer<'_>, ctx: &ParseContext<'_>, depth: usize) -> ParseResult<PdfObject> {
    let start = lexer.position();
    let token = lexer.next_significant()?;
    match token {
        Token::Null => Ok(PdfObject::Null),
        Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
        Token::Real(r) => Ok(PdfObject::Real(r)),
        Token::String(s) => Ok(PdfObject::String(PdfString(s))),
        Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
        Token::Integer(n) => Ok(try_reference(lexer, n)),
        Token::ArrayStart => {
            check_depth(start, ctx, depth)?;
            parse_array(lexer, ctx, depth + 1)
        }
        Token::DictStart => {
            check_depth(start, ctx, depth)?;
            let dict = parse_dictionary(lexer, ctx, depth + 1)?;
            parse_stream_tail(lexer, ctx, dict)
        }
        Token::Eof => Err(ParseError::syntax(start, "Unexpected end of data")),
        other => Err(ParseError::syntax(start, format!("Unexpected token {other:?}"))),
    }
}

fn check_depth(position: usize, ctx: &ParseContext<'_>, depth: usize) -> ParseResult<()> {
    if depth >= ctx.max_depth {
        return Err(ParseError::syntax(
            position,
            format!("Nesting deeper than {} levels", ctx.max_depth),
        ));
    }
    Ok(())
}

/// `n g R` is recognised by lookahead; anything else leaves `n` as an integer
fn try_reference(lexer: &mut Lexer<'_>, number: i64) -> PdfObject {
    let saved = lexer.position();
    if let (Ok(number), Ok(Token::Integer(generation))) =
        (u32::try_from(number), lexer.next_significant())
    {
        if let (Ok(generation), Ok(Token::R)) = (u16::try_from(generation), lexer.next_significant())
        {
            return PdfObject::Reference(ObjectId::new(number, generation));
        }
    }
    lexer.seek(saved);
    PdfObject::Integer(number)
}

/// Run `item` and, in lenient mode, skip over malformed tokens
fn lenient_step<T>(
    lexer: &mut Lexer<'_>,
    ctx: &ParseContext<'_>,
    mut item: impl FnMut(&mut Lexer<'_>) -> ParseResult<T>,
) -> ParseResult<T> {
    loop {
        match item(lexer) {
            Err(ParseError::MalformedToken { position, message }) if ctx.lenient => {
                tracing::debug!("skipping malformed token at byte {position}: {message}");
                lexer.seek(position);
                lexer.recover();
            }
            result => return result,
        }
    }
}

fn parse_array(lexer: &mut Lexer<'_>, ctx: &ParseContext<'_>, depth: usize) -> ParseResult<PdfObject> {
    let mut elements = Vec::new();

    loop {
        let start = lexer.position();
        let token = lenient_step(lexer, ctx, |lx| lx.next_significant())?;
        match token {
            Token::ArrayEnd => break,
            Token::Eof => return Err(ParseError::syntax(start, "Unterminated array")),
            _ => {
                lexer.seek(start);
                let value = lenient_step(lexer, ctx, |lx| parse_value(lx, ctx, depth))?;
                elements.push(value);
            }
        }
    }

    Ok(PdfObject::Array(PdfArray(elements)))
}

fn parse_dictionary(
    lexer: &mut Lexer<'_>,
    ctx: &ParseContext<'_>,
    depth: usize,
) -> ParseResult<PdfDictionary> {
    let mut dict = PdfDictionary::new();

    loop {
        let start = lexer.position();
        let token = lenient_step(lexer, ctx, |lx| lx.next_significant())?;
        let key = match token {
            Token::DictEnd => break,
            Token::Name(name) => PdfName(name),
            Token::Eof => return Err(ParseError::syntax(start, "Unterminated dictionary")),
            other if ctx.lenient => {
                tracing::debug!("ignoring non-name dictionary key {other:?} at byte {start}");
                continue;
            }
            other => {
                return Err(ParseError::syntax(
                    start,
                    format!("Expected dictionary key, found {other:?}"),
                ))
            }
        };

        let value = lenient_step(lexer, ctx, |lx| parse_value(lx, ctx, depth))?;
        // A null value is equivalent to the key being absent
        if !value.is_null() {
            dict.0.insert(key, value);
        }
    }

    Ok(dict)
}

/// A dictionary followed by `stream` becomes a stream object
fn parse_stream_tail(
    lexer: &mut Lexer<'_>,
    ctx: &ParseContext<'_>,
    dict: PdfDictionary,
) -> ParseResult<PdfObject> {
    let after_dict = lexer.position();
    if !matches!(lexer.peek_token(), Ok(Token::Stream)) {
        lexer.seek(after_dict);
        return Ok(PdfObject::Dictionary(dict));
    }
    lexer.next_significant()?;
    let data_start = lexer.read_stream_start();

    let declared = match dict.get("Length") {
        Some(PdfObject::Integer(n)) => usize::try_from(*n).ok(),
        Some(PdfObject::Reference(id)) => ctx.lengths.resolve_length(*id),
        _ => None,
    };

    let data = lexer.data();
    let data_end = match declared.filter(|len| ends_at_endstream(data, data_start, *len)) {
        Some(len) => data_start + len,
        None if ctx.lenient => {
            let found = lexer.find_ahead(b"endstream").ok_or_else(|| {
                ParseError::syntax(data_start, "Stream without endstream")
            })?;
            trim_eol(data, data_start, found)
        }
        None => {
            let message = match declared {
                Some(len) => format!("Stream /Length {len} does not end at endstream"),
                None => "Stream /Length missing or unresolvable".to_string(),
            };
            return Err(ParseError::syntax(data_start, message));
        }
    };

    let bytes = data[data_start..data_end].to_vec();
    lexer.seek(data_end);
    match lexer.next_significant()? {
        Token::EndStream => {}
        _ => return Err(ParseError::syntax(data_end, "Expected endstream")),
    }

    Ok(PdfObject::Stream(PdfStream { dict, data: bytes }))
}

fn ends_at_endstream(data: &[u8], start: usize, len: usize) -> bool {
    let Some(mut pos) = start.checked_add(len) else {
        return false;
    };
    while pos < data.len() && super::lexer::is_whitespace(data[pos]) {
        pos += 1;
    }
    data.get(pos..).is_some_and(|rest| rest.starts_with(b"endstream"))
}

/// Drop the end-of-line that precedes `endstream`
fn trim_eol(data: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && data[end - 1] == b'\r' {
        end -= 1;
    }
    end
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfObject> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: &str, value: PdfObject) {
        self.0.insert(PdfName::new(key), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Value of `/Type`
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(PdfObject::as_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PdfArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }
}

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
