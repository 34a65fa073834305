//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+, ISO 32000-1
//! Section 7.5.7)

use super::lexer::{Lexer, Token};
use super::objects::{ParseContext, PdfObject, PdfStream};
use super::{ParseError, ParseOptions, ParseResult};

/// A decoded object stream: `(object number, object)` in stream order
#[derive(Debug, Clone)]
pub struct ObjectStream {
    objects: Vec<(u32, PdfObject)>,
}

impl ObjectStream {
    /// Decode an object stream and parse every object it holds
    pub fn parse(stream: &PdfStream, options: &ParseOptions) -> ParseResult<Self> {
        let dict = &stream.dict;
        if dict.get_type() != Some("ObjStm") {
            return Err(ParseError::StreamDecodeError(
                "not an object stream".to_string(),
            ));
        }

        let count = |key: &str| {
            dict.get(key)
                .and_then(PdfObject::as_integer)
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| ParseError::MissingKey(key.to_string()))
        };
        let n = count("N")?;
        let first = count("First")?;

        let data = stream.decode(options.max_decoded_bytes)?;
        if first > data.len() {
            return Err(ParseError::StreamDecodeError(format!(
                "/First {first} is past the decoded data"
            )));
        }

        let mut lexer = Lexer::new(&data);
        let mut offsets = Vec::with_capacity(n.min(data.len()));
        for _ in 0..n {
            match (lexer.next_significant()?, lexer.next_significant()?) {
                (Token::Integer(number), Token::Integer(offset)) => {
                    let number = u32::try_from(number).map_err(|_| {
                        ParseError::StreamDecodeError("negative object number".to_string())
                    })?;
                    let offset = usize::try_from(offset).map_err(|_| {
                        ParseError::StreamDecodeError("negative object offset".to_string())
                    })?;
                    offsets.push((number, offset));
                }
                _ => {
                    return Err(ParseError::StreamDecodeError(
                        "Expected object number and offset pairs".to_string(),
                    ))
                }
            }
        }

        let ctx = ParseContext::standalone(options.max_depth);
        let mut objects = Vec::with_capacity(offsets.len());
        for (number, offset) in offsets {
            lexer.seek(first + offset);
            let object = PdfObject::parse(&mut lexer, &ctx)?;
            objects.push((number, object));
        }

        Ok(ObjectStream { objects })
    }

    /// Object at `index`, provided it carries the expected number
    pub fn get(&self, index: usize, number: u32) -> Option<&PdfObject> {
        match self.objects.get(index) {
            Some((n, object)) if *n == number => Some(object),
            // Index disagrees with the header: fall back to a number lookup
            _ => self
                .objects
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, object)| object),
        }
    }

    /// All objects, in stream order
    pub fn objects(&self) -> &[(u32, PdfObject)] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
