//! Parsed PDF document
//!
//! Owns the cross-reference table and an arena of materialised objects keyed
//! by [`ObjectId`]. Objects are parsed on first access and cached; edits made
//! by the form writer live in a separate overlay so the serializer knows
//! exactly which objects changed.

use super::lexer::find_bytes;
use super::object_stream::ObjectStream;
use super::objects::{ObjectId, ParseContext, PdfDictionary, PdfObject, ResolveLength};
use super::trailer::PdfTrailer;
use super::xref::{XRefEntry, XRefTable};
use super::{Lexer, ParseError, ParseOptions, ParseResult};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A parsed, lazily materialised PDF document
#[derive(Debug)]
pub struct PdfDocument<'a> {
    data: &'a [u8],
    version: String,
    xref: XRefTable,
    trailer: PdfTrailer,
    options: ParseOptions,
    /// Cache of loaded objects
    cache: HashMap<ObjectId, PdfObject>,
    /// Cache of decoded object streams, keyed by stream object number
    object_streams: HashMap<u32, ObjectStream>,
    /// Objects replaced or added since parsing
    modified: BTreeMap<ObjectId, PdfObject>,
    next_number: u32,
}

impl<'a> PdfDocument<'a> {
    /// Parse the header, the cross-reference chain and the trailer
    pub fn parse(data: &'a [u8], options: &ParseOptions) -> ParseResult<Self> {
        if data.is_empty() {
            return Err(ParseError::EmptyInput);
        }
        if data.len() > options.max_input_bytes {
            return Err(ParseError::ResourceLimitExceeded {
                size: data.len(),
                limit: options.max_input_bytes,
            });
        }

        let version = parse_header(data)?;
        let xref = XRefTable::load(data, options)?;
        let trailer = xref.trailer();
        trailer.validate()?;

        let next_number = xref
            .max_number()
            .max(trailer.size().unwrap_or(0).saturating_sub(1))
            .saturating_add(1);

        tracing::debug!(
            "parsed PDF {} with {} xref entries in {} section(s)",
            version,
            xref.len(),
            xref.sections().len()
        );

        Ok(PdfDocument {
            data,
            version,
            xref,
            trailer,
            options: options.clone(),
            cache: HashMap::new(),
            object_streams: HashMap::new(),
            modified: BTreeMap::new(),
            next_number,
        })
    }

    /// Original input bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Header version, e.g. "1.7"
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Get an indirect object. Absent and free entries resolve to Null.
    pub fn get(&mut self, id: ObjectId) -> ParseResult<PdfObject> {
        if let Some(object) = self.modified.get(&id) {
            return Ok(object.clone());
        }
        if let Some(object) = self.cache.get(&id) {
            return Ok(object.clone());
        }

        let object = match self.xref.get(id.number) {
            Some(XRefEntry::InUse { offset, generation }) if generation == id.generation => {
                self.load_uncompressed(id, offset)?
            }
            Some(XRefEntry::Compressed { stream, index }) if id.generation == 0 => {
                self.load_compressed(id, stream, index as usize)?
            }
            entry => {
                tracing::debug!("{id} resolves to null (xref entry {entry:?})");
                PdfObject::Null
            }
        };

        self.cache.insert(id, object.clone());
        Ok(object)
    }

    /// Follow references until a direct object is reached
    pub fn resolve(&mut self, object: &PdfObject) -> ParseResult<PdfObject> {
        let PdfObject::Reference(mut id) = object else {
            return Ok(object.clone());
        };
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(id) {
                return Err(ParseError::CorruptObject {
                    id,
                    message: "reference cycle".to_string(),
                });
            }
            match self.get(id)? {
                PdfObject::Reference(next) => id = next,
                direct => return Ok(direct),
            }
        }
    }

    /// Resolve `object` and return it as a dictionary, if it is one
    pub fn resolve_dict(&mut self, object: &PdfObject) -> ParseResult<Option<PdfDictionary>> {
        Ok(match self.resolve(object)? {
            PdfObject::Dictionary(dict) => Some(dict),
            PdfObject::Stream(stream) => Some(stream.dict),
            _ => None,
        })
    }

    /// The document catalog (`/Root`)
    pub fn catalog(&mut self) -> ParseResult<PdfDictionary> {
        let root = self.trailer.root()?;
        self.resolve_dict(&PdfObject::Reference(root))?
            .ok_or_else(|| ParseError::CorruptObject {
                id: root,
                message: "catalog is not a dictionary".to_string(),
            })
    }

    /// Replace an object. Returns `false`, and records nothing, when the new
    /// value equals the current one.
    pub fn update(&mut self, id: ObjectId, object: PdfObject) -> ParseResult<bool> {
        if self.get(id)? == object {
            return Ok(false);
        }
        self.modified.insert(id, object);
        Ok(true)
    }

    /// Add a new indirect object
    pub fn add(&mut self, object: PdfObject) -> ObjectId {
        let id = ObjectId::new(self.next_number, 0);
        self.next_number += 1;
        self.modified.insert(id, object);
        id
    }

    /// Objects replaced or added since parsing, in id order
    pub fn modified_objects(&self) -> impl Iterator<Item = (ObjectId, &PdfObject)> {
        self.modified.iter().map(|(id, object)| (*id, object))
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Every in-use object id, including added ones
    pub fn live_object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.xref.live_ids();
        ids.extend(self.modified.keys());
        ids.sort();
        ids.dedup();
        ids
    }

    /// One past the highest object number in use
    pub fn next_object_number(&self) -> u32 {
        self.next_number
    }

    fn context<'r>(&self, lengths: &'r dyn ResolveLength) -> ParseContext<'r> {
        ParseContext {
            max_depth: self.options.max_depth,
            lenient: self.options.lenient_syntax,
            lengths,
        }
    }

    fn load_uncompressed(&self, id: ObjectId, offset: usize) -> ParseResult<PdfObject> {
        if offset >= self.data.len() {
            return Err(ParseError::CorruptObject {
                id,
                message: format!("offset {offset} is past end of file"),
            });
        }
        let lengths = XRefLengths {
            data: self.data,
            xref: &self.xref,
            max_depth: self.options.max_depth,
        };
        let mut lexer = Lexer::new(self.data);
        lexer.seek(offset);
        PdfObject::parse_indirect(&mut lexer, &self.context(&lengths), id)
    }

    fn load_compressed(&mut self, id: ObjectId, stream: u32, index: usize) -> ParseResult<PdfObject> {
        if !self.object_streams.contains_key(&stream) {
            let stream_id = match self.xref.get(stream) {
                Some(XRefEntry::InUse { generation, .. }) => ObjectId::new(stream, generation),
                _ => {
                    return Err(ParseError::CorruptObject {
                        id,
                        message: format!("object stream {stream} is not an uncompressed object"),
                    })
                }
            };
            let decoded = match self.get(stream_id)? {
                PdfObject::Stream(s) => ObjectStream::parse(&s, &self.options)
                    .map_err(|e| e.within_object(stream_id))?,
                _ => {
                    return Err(ParseError::CorruptObject {
                        id: stream_id,
                        message: "object stream is not a stream".to_string(),
                    })
                }
            };
            self.object_streams.insert(stream, decoded);
        }

        Ok(self
            .object_streams
            .get(&stream)
            .and_then(|objstm| objstm.get(index, id.number))
            .cloned()
            .unwrap_or(PdfObject::Null))
    }
}

/// Resolves indirect `/Length` values straight from the file
struct XRefLengths<'d> {
    data: &'d [u8],
    xref: &'d XRefTable,
    max_depth: usize,
}

impl ResolveLength for XRefLengths<'_> {
    fn resolve_length(&self, id: ObjectId) -> Option<usize> {
        let Some(XRefEntry::InUse { offset, generation }) = self.xref.get(id.number) else {
            return None;
        };
        if generation != id.generation {
            return None;
        }
        let mut lexer = Lexer::new(self.data);
        lexer.seek(offset);
        PdfObject::parse_indirect(&mut lexer, &ParseContext::standalone(self.max_depth), id)
            .ok()
            .and_then(|object| object.as_integer())
            .and_then(|length| usize::try_from(length).ok())
    }
}

/// `%PDF-x.y` within the first 1024 bytes
fn parse_header(data: &[u8]) -> ParseResult<String> {
    let window = &data[..data.len().min(1024)];
    let start = find_bytes(window, b"%PDF-").ok_or(ParseError::InvalidHeader)? + 5;
    let version: String = data[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|b| char::from(*b))
        .collect();
    if version.is_empty() || !version.contains('.') {
        return Err(ParseError::InvalidHeader);
    }
    Ok(version)
}
