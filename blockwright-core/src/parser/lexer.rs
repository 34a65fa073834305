//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! over a borrowed byte slice so that the object parser can jump to any
//! cross-reference offset with [`Lexer::seek`].

use super::{ParseError, ParseResult};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal)
    String(Vec<u8>),

    /// Name object (e.g., /Type). Each byte of the decoded name is one char.
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Stream keyword
    Stream,

    /// Endstream keyword
    EndStream,

    /// Obj keyword
    Obj,

    /// Endobj keyword
    EndObj,

    /// StartXRef keyword
    StartXRef,

    /// Xref keyword
    XRef,

    /// Trailer keyword
    Trailer,

    /// Reference marker R
    R,

    /// Null object
    Null,

    /// Any other bare word
    Keyword(String),

    /// Comment (usually ignored)
    Comment(Vec<u8>),

    /// End of file
    Eof,
}

/// Byte is PDF whitespace (ISO 32000-1 Table 1)
pub(crate) fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

/// Byte is a PDF delimiter (ISO 32000-1 Table 2)
pub(crate) fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Byte belongs to a regular character run
pub(crate) fn is_regular(ch: u8) -> bool {
    !is_whitespace(ch) && !is_delimiter(ch)
}

/// PDF Lexer for tokenizing PDF content
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
    pushed: Option<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            pushed: None,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        match &self.pushed {
            Some((_, start)) => *start,
            None => self.position,
        }
    }

    /// Restart lexing at `position`
    pub fn seek(&mut self, position: usize) {
        self.pushed = None;
        self.position = position.min(self.data.len());
    }

    /// The underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        if let Some((token, _)) = self.pushed.take() {
            return Ok(token);
        }

        self.skip_whitespace();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.position += 1;
                if self.peek_char() == Some(b'>') {
                    self.position += 1;
                    Ok(Token::DictEnd)
                } else {
                    Err(self.malformed(self.position - 1, "Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.position += 1;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.position += 1;
                Ok(Token::ArrayEnd)
            }
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number(),
            b')' | b'{' | b'}' => Err(self.malformed(self.position, "Unexpected delimiter")),
            _ => Ok(self.read_keyword()),
        }
    }

    /// Get the next token that is not a comment
    pub fn next_significant(&mut self) -> ParseResult<Token> {
        loop {
            match self.next_token()? {
                Token::Comment(_) => continue,
                token => return Ok(token),
            }
        }
    }

    /// Look at the next significant token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Token> {
        if let Some((token, _)) = &self.pushed {
            return Ok(token.clone());
        }
        let saved = self.position;
        let token = self.next_significant();
        self.position = saved;
        token
    }

    /// Push a token back so the next call to `next_token` returns it.
    /// Only one token of push-back is supported; `start` is where it began.
    pub fn push_token(&mut self, token: Token, start: usize) {
        self.pushed = Some((token, start));
    }

    /// Skip to the next plausible token boundary after a malformed token
    pub fn recover(&mut self) {
        self.pushed = None;
        self.position = (self.position + 1).min(self.data.len());
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
        }
    }

    /// Skip whitespace and return the number of bytes skipped
    pub(crate) fn skip_whitespace(&mut self) -> usize {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_whitespace(ch) {
                break;
            }
            self.position += 1;
        }
        self.position - start
    }

    /// Consume the end-of-line that must follow the `stream` keyword and
    /// return the offset of the first data byte.
    pub fn read_stream_start(&mut self) -> usize {
        match self.peek_char() {
            Some(b'\r') => {
                self.position += 1;
                if self.peek_char() == Some(b'\n') {
                    self.position += 1;
                }
            }
            Some(b'\n') => self.position += 1,
            _ => {}
        }
        self.position
    }

    /// Read exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ParseError::syntax(self.position, "Unexpected end of data"))?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Consume one end-of-line marker (CR, LF or CRLF), if present
    pub fn skip_eol(&mut self) {
        self.read_stream_start();
    }

    /// Find the first occurrence of `needle` at or after the current position
    pub fn find_ahead(&self, needle: &[u8]) -> Option<usize> {
        find_bytes(&self.data[self.position..], needle).map(|p| p + self.position)
    }

    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn consume_char(&mut self) -> Option<u8> {
        let ch = self.peek_char()?;
        self.position += 1;
        Some(ch)
    }

    fn malformed(&self, position: usize, message: &str) -> ParseError {
        ParseError::MalformedToken {
            position,
            message: message.to_string(),
        }
    }

    fn read_comment(&mut self) -> Token {
        self.position += 1; // consume '%'
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.position += 1;
        }
        Token::Comment(self.data[start..self.position].to_vec())
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        self.position += 1; // consume '/'
        let mut name = String::new();

        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            let escape_at = self.position;
            self.position += 1;

            // Hex codes in names, e.g. /A#20B means "A B"
            if ch == b'#' {
                let digits = self
                    .data
                    .get(self.position..self.position + 2)
                    .filter(|d| d.iter().all(u8::is_ascii_hexdigit))
                    .ok_or_else(|| self.malformed(escape_at, "Invalid hex escape in name"))?;
                name.push(char::from(hex_pair(digits[0], digits[1])));
                self.position += 2;
            } else {
                name.push(char::from(ch));
            }
        }

        Ok(Token::Name(name))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        let start = self.position;
        self.position += 1; // consume '('
        let mut string = Vec::new();
        let mut depth = 1;

        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.malformed(start, "Unterminated string"))?;

            match ch {
                b'\\' => {
                    let escaped = self
                        .consume_char()
                        .ok_or_else(|| self.malformed(start, "Unterminated string"))?;
                    match escaped {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(b'\x08'),
                        b'f' => string.push(b'\x0C'),
                        b'(' | b')' | b'\\' => string.push(escaped),
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek_char() {
                                    Some(next @ b'0'..=b'7') => {
                                        self.position += 1;
                                        value = value * 8 + u32::from(next - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            // High-order overflow is ignored
                            string.push((value & 0xFF) as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.peek_char() == Some(b'\n') {
                                self.position += 1;
                            }
                        }
                        b'\n' => {}
                        // Unknown escape: the backslash is dropped
                        other => string.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    string.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    string.push(ch);
                }
                b'\r' => {
                    if self.peek_char() == Some(b'\n') {
                        self.position += 1;
                    }
                    string.push(b'\n');
                }
                _ => string.push(ch),
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        let start = self.position;
        self.position += 1; // consume '<'

        if self.peek_char() == Some(b'<') {
            self.position += 1;
            return Ok(Token::DictStart);
        }

        let mut digits = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.malformed(start, "Unterminated hex string"))?;
            if ch == b'>' {
                break;
            }
            if ch.is_ascii_hexdigit() {
                digits.push(ch);
            } else if !is_whitespace(ch) {
                return Err(self.malformed(self.position - 1, "Invalid character in hex string"));
            }
        }

        // Pad with 0 if odd number of digits
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }

        let bytes = digits
            .chunks(2)
            .map(|pair| hex_pair(pair[0], pair[1]))
            .collect();
        Ok(Token::String(bytes))
    }

    /// Read a number (integer or real)
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;
        let mut has_digit = false;

        if matches!(self.peek_char(), Some(b'+' | b'-')) {
            self.position += 1;
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    has_digit = true;
                    self.position += 1;
                }
                b'.' if !has_dot => {
                    has_dot = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        // Exponents are not PDF syntax but some producers emit them
        if has_digit && matches!(self.peek_char(), Some(b'e' | b'E')) {
            let mark = self.position;
            self.position += 1;
            if matches!(self.peek_char(), Some(b'+' | b'-')) {
                self.position += 1;
            }
            let exp_start = self.position;
            while matches!(self.peek_char(), Some(b'0'..=b'9')) {
                self.position += 1;
            }
            if self.position == exp_start {
                self.position = mark;
            } else {
                has_dot = true;
            }
        }

        // Numbers run straight into the next token only at a delimiter
        if let Some(ch) = self.peek_char() {
            if is_regular(ch) {
                return Err(self.malformed(start, "Invalid number"));
            }
        }

        if !has_digit {
            return Err(self.malformed(start, "Number without digits"));
        }

        // The slice only contains ASCII sign, digits, '.', 'e' and 'E'
        let text = String::from_utf8_lossy(&self.data[start..self.position]);
        if has_dot {
            text.parse::<f64>()
                .map(Token::Real)
                .map_err(|_| self.malformed(start, "Invalid real number"))
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(Token::Integer(value)),
                // Out-of-range integers degrade to reals
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Real)
                    .map_err(|_| self.malformed(start, "Invalid integer")),
            }
        }
    }

    /// Read a bare word and classify it
    fn read_keyword(&mut self) -> Token {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            self.position += 1;
        }
        let word = &self.data[start..self.position];
        match word {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            b"obj" => Token::Obj,
            b"endobj" => Token::EndObj,
            b"stream" => Token::Stream,
            b"endstream" => Token::EndStream,
            b"R" => Token::R,
            b"xref" => Token::XRef,
            b"trailer" => Token::Trailer,
            b"startxref" => Token::StartXRef,
            other => Token::Keyword(other.iter().map(|b| char::from(*b)).collect()),
        }
    }
}

fn hex_value(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'f' => ch - b'a' + 10,
        b'A'..=b'F' => ch - b'A' + 10,
        _ => 0,
    }
}

fn hex_pair(high: u8, low: u8) -> u8 {
    (hex_value(high) << 4) | hex_value(low)
}

/// Position of the first occurrence of `needle` in `haystack`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle` in `haystack`
pub(crate) fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            match lexer.next_token().unwrap() {
                Token::Eof => break,
                token => out.push(token),
            }
        }
        out
    }

    #[test]
    fn test_lexer_basic_tokens() {
        assert_eq!(
            tokens(b"true false null 123 -456 3.14 .5 -.25"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Null,
                Token::Integer(123),
                Token::Integer(-456),
                Token::Real(3.14),
                Token::Real(0.5),
                Token::Real(-0.25),
            ]
        );
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            tokens(b"obj endobj stream endstream R xref trailer startxref n f"),
            vec![
                Token::Obj,
                Token::EndObj,
                Token::Stream,
                Token::EndStream,
                Token::R,
                Token::XRef,
                Token::Trailer,
                Token::StartXRef,
                Token::Keyword("n".to_string()),
                Token::Keyword("f".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_string_escapes() {
        assert_eq!(
            tokens(br"(a\nb\(c\)\\d\101\0)"),
            vec![Token::String(b"a\nb(c)\\dA\0".to_vec())]
        );
    }

    #[test]
    fn test_lexer_string_nested_parens_and_continuation() {
        assert_eq!(
            tokens(b"(outer (inner) text)"),
            vec![Token::String(b"outer (inner) text".to_vec())]
        );
        assert_eq!(
            tokens(b"(split \\\r\nline)"),
            vec![Token::String(b"split line".to_vec())]
        );
    }

    #[test]
    fn test_lexer_string_eol_normalised() {
        assert_eq!(
            tokens(b"(a\r\nb\rc\nd)"),
            vec![Token::String(b"a\nb\nc\nd".to_vec())]
        );
    }

    #[test]
    fn test_lexer_hex_strings() {
        assert_eq!(
            tokens(b"<48 65 6C6c6F> <ABC>"),
            vec![
                Token::String(b"Hello".to_vec()),
                Token::String(vec![0xAB, 0xC0]),
            ]
        );
    }

    #[test]
    fn test_lexer_names_with_escapes() {
        assert_eq!(
            tokens(b"/Type /A#20B /Lime#47reen /"),
            vec![
                Token::Name("Type".to_string()),
                Token::Name("A B".to_string()),
                Token::Name("LimeGreen".to_string()),
                Token::Name(String::new()),
            ]
        );
    }

    #[test]
    fn test_lexer_dictionary_and_array() {
        assert_eq!(
            tokens(b"<</Kids[1 0 R]>>"),
            vec![
                Token::DictStart,
                Token::Name("Kids".to_string()),
                Token::ArrayStart,
                Token::Integer(1),
                Token::Integer(0),
                Token::R,
                Token::ArrayEnd,
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(
            tokens(b"%PDF-1.7\n1 % trailing\n2"),
            vec![
                Token::Comment(b"PDF-1.7".to_vec()),
                Token::Integer(1),
                Token::Comment(b" trailing".to_vec()),
                Token::Integer(2),
            ]
        );
    }

    #[test]
    fn test_lexer_errors() {
        let cases: [&[u8]; 5] = [b"(unterminated", b"<4142", b"<41G2>", b"/Bad#Z1", b")"];
        for input in cases {
            let err = Lexer::new(input).next_token().unwrap_err();
            assert!(
                matches!(err, ParseError::MalformedToken { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_lexer_peek_and_push_back() {
        let mut lexer = Lexer::new(b"1 2 R");
        assert_eq!(lexer.peek_token().unwrap(), Token::Integer(1));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(1));
        let start = lexer.position();
        let token = lexer.next_token().unwrap();
        lexer.push_token(token, start);
        assert_eq!(lexer.position(), start);
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(2));
        assert_eq!(lexer.next_token().unwrap(), Token::R);
    }

    #[test]
    fn test_lexer_seek() {
        let mut lexer = Lexer::new(b"/A /B /C");
        lexer.seek(3);
        assert_eq!(lexer.next_token().unwrap(), Token::Name("B".to_string()));
        assert_eq!(lexer.position(), 5);
    }

    #[test]
    fn test_lexer_recover_skips_bad_token() {
        let mut lexer = Lexer::new(b"12abc /Next");
        assert!(lexer.next_token().is_err());
        lexer.recover();
        assert_eq!(lexer.next_token().unwrap(), Token::Name("Next".to_string()));
    }

    #[test]
    fn test_lexer_stream_start() {
        let mut lexer = Lexer::new(b"stream\r\nDATA");
        assert_eq!(lexer.next_token().unwrap(), Token::Stream);
        let start = lexer.read_stream_start();
        assert_eq!(start, 8);
        assert_eq!(lexer.read_bytes(4).unwrap(), b"DATA");
        assert!(lexer.read_bytes(1).is_err());
    }

    #[test]
    fn test_find_helpers() {
        assert_eq!(find_bytes(b"abcabc", b"bc"), Some(1));
        assert_eq!(rfind_bytes(b"abcabc", b"bc"), Some(4));
        assert_eq!(find_bytes(b"abc", b"zz"), None);
    }
}
