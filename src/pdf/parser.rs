//! PDF object parser - recursive descent over the token stream
//!
//! Parses data objects, indirect objects (including stream payloads) and
//! classic cross-reference sections. The parser is deliberately independent
//! of document loading: the object store hands it an offset and gets exactly
//! one object back.

use crate::base::error::{Error, Result};
use crate::pdf::lexer::{LexBuf, Lexer, Token};
use crate::pdf::object::{Dict, Name, ObjRef, Object, PdfString, StreamObject};
use crate::pdf::xref::XrefEntry;

/// Resolves an indirect `/Length` while a stream payload is being read.
///
/// The store passes its own lookup; standalone parsing can pass `|_| None`
/// and the parser falls back to scanning for `endstream`.
pub type LengthResolver<'r> = dyn Fn(ObjRef) -> Option<i64> + 'r;

/// PDF parser over a byte slice
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    buf: LexBuf,
    data: &'a [u8],
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            buf: LexBuf::new(),
            data,
        }
    }

    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::new_at(data, offset),
            buf: LexBuf::new(),
            data,
        }
    }

    /// Current byte offset
    pub fn pos(&self) -> usize {
        self.lexer.pos()
    }

    /// Parse the next data object
    pub fn parse_object(&mut self) -> Result<Object> {
        let token = self.next_token()?;
        self.parse_object_from(token)
    }

    fn parse_object_from(&mut self, token: Token) -> Result<Object> {
        match token {
            Token::Null => Ok(Object::Null),
            Token::True => Ok(Object::Bool(true)),
            Token::False => Ok(Object::Bool(false)),
            Token::Real => Ok(Object::Real(self.buf.as_float())),
            Token::Int => {
                let num = self.buf.as_int();
                // "num gen R" lookahead: two non-negative integers and an R
                // collapse into a reference, anything else restores.
                let saved = self.lexer.pos();
                if num >= 0 && num <= u32::MAX as i64 {
                    if let Ok(Token::Int) = self.next_token() {
                        let generation = self.buf.as_int();
                        if generation >= 0
                            && generation <= u16::MAX as i64
                            && matches!(self.next_token(), Ok(Token::R))
                        {
                            return Ok(Object::Ref(ObjRef::new(num as u32, generation as u16)));
                        }
                    }
                }
                self.lexer.seek(saved);
                Ok(Object::Int(num))
            }
            Token::String => Ok(Object::String(PdfString::new(self.buf.buffer.clone()))),
            Token::HexString => Ok(Object::String(PdfString::hex(self.buf.buffer.clone()))),
            Token::Name => Ok(Object::Name(Name::new(&self.buf.as_str()))),
            Token::OpenArray => self.parse_array(),
            Token::OpenDict => self.parse_dict().map(Object::Dict),
            Token::Eof => Err(Error::Eof),
            other => Err(Error::syntax(format!(
                "unexpected token {:?} at offset {}",
                other,
                self.lexer.pos()
            ))),
        }
    }

    fn parse_array(&mut self) -> Result<Object> {
        let mut arr = Vec::new();
        loop {
            let token = self.next_token()?;
            match token {
                Token::CloseArray => break,
                Token::Eof => return Err(Error::syntax("unterminated array")),
                other => arr.push(self.parse_object_from(other)?),
            }
        }
        Ok(Object::Array(arr))
    }

    fn parse_dict(&mut self) -> Result<Dict> {
        let mut dict = Dict::new();
        loop {
            let token = self.next_token()?;
            match token {
                Token::CloseDict => break,
                Token::Eof => return Err(Error::syntax("unterminated dictionary")),
                Token::Name => {
                    let key = Name::new(&self.buf.as_str());
                    let value = self.parse_object()?;
                    dict.insert(key, value);
                }
                other => {
                    return Err(Error::syntax(format!(
                        "dictionary key must be a name, got {:?}",
                        other
                    )));
                }
            }
        }
        Ok(dict)
    }

    /// Parse an indirect object: `num gen obj ... endobj`.
    ///
    /// Stream payloads are extracted using the `/Length` entry; an indirect
    /// length goes through `resolve_length`, and a wrong or unresolvable
    /// length falls back to scanning for the `endstream` keyword.
    pub fn parse_indirect_object(
        &mut self,
        resolve_length: &LengthResolver<'_>,
    ) -> Result<(u32, u16, Object)> {
        let num = self.expect_int()?;
        let generation = self.expect_int()?;
        if num < 0 || num > u32::MAX as i64 || generation < 0 || generation > u16::MAX as i64 {
            return Err(Error::syntax(format!(
                "object identifier {} {} out of range",
                num, generation
            )));
        }
        self.expect_token(Token::Obj)?;

        let obj = self.parse_object()?;

        let saved = self.lexer.pos();
        match self.next_token()? {
            Token::Stream => {
                let dict = match obj {
                    Object::Dict(d) => d,
                    _ => return Err(Error::syntax("stream keyword without a dictionary")),
                };
                let data = self.read_stream_payload(&dict, resolve_length)?;
                // endobj is customary after endstream; tolerate its absence.
                let after = self.lexer.pos();
                if !matches!(self.next_token(), Ok(Token::EndObj)) {
                    self.lexer.seek(after);
                }
                Ok((
                    num as u32,
                    generation as u16,
                    Object::Stream(StreamObject { dict, data }),
                ))
            }
            Token::EndObj => Ok((num as u32, generation as u16, obj)),
            _ => {
                // Missing endobj: report the object anyway, repositioned.
                self.lexer.seek(saved);
                Ok((num as u32, generation as u16, obj))
            }
        }
    }

    fn read_stream_payload(
        &mut self,
        dict: &Dict,
        resolve_length: &LengthResolver<'_>,
    ) -> Result<Vec<u8>> {
        self.lexer.skip_stream_eol();
        let start = self.lexer.pos();

        let length = match dict.get("Length") {
            Some(Object::Int(n)) if *n >= 0 => Some(*n as usize),
            Some(Object::Ref(r)) => resolve_length(*r).filter(|n| *n >= 0).map(|n| n as usize),
            _ => None,
        };

        if let Some(len) = length {
            if start + len <= self.data.len() {
                self.lexer.seek(start + len);
                let saved = self.lexer.pos();
                if matches!(self.next_token(), Ok(Token::EndStream)) {
                    return Ok(self.data[start..start + len].to_vec());
                }
                self.lexer.seek(saved);
            }
        }

        // Length missing or wrong: scan for the closing keyword.
        let rest = &self.data[start..];
        let end = find_keyword(rest, b"endstream")
            .ok_or_else(|| Error::syntax("stream without endstream"))?;
        let mut payload = &rest[..end];
        // The spec puts an EOL before endstream; strip one if present.
        if payload.ends_with(b"\n") {
            payload = &payload[..payload.len() - 1];
        }
        if payload.ends_with(b"\r") {
            payload = &payload[..payload.len() - 1];
        }
        self.lexer.seek(start + end);
        self.expect_token(Token::EndStream)?;
        Ok(payload.to_vec())
    }

    /// Parse a classic cross-reference section plus its trailer.
    ///
    /// The leading `xref` keyword must be next in the input. Returns the
    /// entries in file order and the trailer dictionary.
    pub fn parse_xref_section(&mut self) -> Result<(Vec<XrefEntry>, Dict)> {
        self.expect_token(Token::Xref)?;

        let mut entries = Vec::new();
        loop {
            let saved = self.lexer.pos();
            match self.next_token()? {
                Token::Trailer => break,
                Token::Int => {
                    let start = self.buf.as_int();
                    let count = self.expect_int()?;
                    if start < 0 || count < 0 {
                        return Err(Error::syntax("negative xref subsection header"));
                    }
                    for i in 0..count as u32 {
                        entries.push(self.parse_xref_entry(start as u32 + i)?);
                    }
                }
                other => {
                    self.lexer.seek(saved);
                    return Err(Error::syntax(format!(
                        "unexpected {:?} in xref section",
                        other
                    )));
                }
            }
        }

        let trailer = self.parse_dict_after_trailer()?;
        Ok((entries, trailer))
    }

    fn parse_xref_entry(&mut self, num: u32) -> Result<XrefEntry> {
        let offset = self.expect_int()?;
        let generation = self.expect_int()?;
        if offset < 0 || generation < 0 || generation > u16::MAX as i64 {
            return Err(Error::syntax(format!("invalid xref entry for object {}", num)));
        }
        match self.next_token()? {
            Token::Keyword if self.buf.as_bytes() == b"n" => {
                Ok(XrefEntry::in_use(num, generation as u16, offset as u64))
            }
            Token::Keyword if self.buf.as_bytes() == b"f" => {
                Ok(XrefEntry::free(num, generation as u16))
            }
            other => Err(Error::syntax(format!(
                "xref entry type must be n or f, got {:?}",
                other
            ))),
        }
    }

    fn parse_dict_after_trailer(&mut self) -> Result<Dict> {
        match self.parse_object()? {
            Object::Dict(d) => Ok(d),
            _ => Err(Error::syntax("trailer must be a dictionary")),
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<()> {
        let token = self.next_token()?;
        if token != expected {
            return Err(Error::syntax(format!(
                "expected {:?}, got {:?} at offset {}",
                expected,
                token,
                self.lexer.pos()
            )));
        }
        Ok(())
    }

    fn expect_int(&mut self) -> Result<i64> {
        match self.next_token()? {
            Token::Int => Ok(self.buf.as_int()),
            other => Err(Error::syntax(format!("expected integer, got {:?}", other))),
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.lexer.lex(&mut self.buf)
    }
}

/// Find a bare keyword in raw bytes (must not run into a longer token)
fn find_keyword(data: &[u8], keyword: &[u8]) -> Option<usize> {
    data.windows(keyword.len())
        .position(|window| window == keyword)
}

/// Parse the `%PDF-x.y` header, returning the version string
pub fn parse_header(data: &[u8]) -> Result<String> {
    if data.len() < 8 || !data.starts_with(b"%PDF-") {
        return Err(Error::format("not a PDF file"));
    }
    let line_end = data
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(data.len().min(16));
    let version = String::from_utf8_lossy(&data[5..line_end]).trim().to_string();
    Ok(version)
}

/// Find the byte offset recorded after the last `startxref` keyword
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let window = data.len().min(2048);
    let tail = &data[data.len() - window..];
    let pos = tail
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| Error::format("startxref not found"))?;

    let mut parser = Parser::new_at(data, data.len() - window + pos + 9);
    let offset = parser.expect_int()?;
    if offset < 0 || offset as usize >= data.len() {
        return Err(Error::format(format!("startxref offset {} out of range", offset)));
    }
    Ok(offset as u64)
}
