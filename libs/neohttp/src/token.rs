//! Pull tokenizer over a streamed JSON body.
//!
//! Only structural state (open containers and what may follow) is kept in
//! memory; strings and numbers are handed to `serde_json` one literal at a
//! time, so a response is never buffered as a whole.

use std::io::{self, BufRead, BufReader, Read};

use cypher_api::{Error, Number, Result};
use serde::de::DeserializeOwned;

/// Nesting limit for decoded values, same as `serde_json`'s default.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    /// Object member name. The `:` separator is consumed with it.
    Key(String),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// Position inside an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Open,
    AfterKey,
    AfterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(Slot),
    Array(Slot),
}

/// Single-reader token stream. Not reentrant.
pub struct TokenStream<R> {
    reader: BufReader<R>,
    stack: Vec<Frame>,
    offset: u64,
    finished: bool,
}

impl<R: Read> TokenStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            stack: Vec::new(),
            offset: 0,
            finished: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next token, or `None` once the top-level value is complete and only
    /// whitespace remains.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_ws()?;
        match self.stack.last().copied() {
            None if self.finished => match self.peek()? {
                None => Ok(None),
                Some(b) => Err(self.unexpected(b, "end of stream")),
            },
            None => self.read_value_token().map(Some),
            Some(Frame::Object(Slot::AfterKey)) => self.read_value_token().map(Some),
            Some(Frame::Object(slot)) => {
                let b = self.require_byte("object key or '}'")?;
                if b == b'}' {
                    self.bump();
                    self.close_container();
                    return Ok(Some(Token::EndObject));
                }
                if slot == Slot::AfterValue {
                    self.expect_byte(b',')?;
                    self.skip_ws()?;
                }
                let b = self.require_byte("object key")?;
                if b != b'"' {
                    return Err(self.unexpected(b, "object key"));
                }
                let key = self.read_string()?;
                self.skip_ws()?;
                self.expect_byte(b':')?;
                self.set_top(Slot::AfterKey);
                Ok(Some(Token::Key(key)))
            }
            Some(Frame::Array(slot)) => {
                let b = self.require_byte("array element or ']'")?;
                if b == b']' {
                    self.bump();
                    self.close_container();
                    return Ok(Some(Token::EndArray));
                }
                if slot == Slot::AfterValue {
                    self.expect_byte(b',')?;
                    self.skip_ws()?;
                }
                self.read_value_token().map(Some)
            }
        }
    }

    /// Whether the innermost open container has another member.
    pub fn has_more(&mut self) -> Result<bool> {
        self.skip_ws()?;
        Ok(!matches!(self.peek()?, None | Some(b']') | Some(b'}')))
    }

    /// Read the next token and fail unless it equals `expected`.
    pub fn expect_token(&mut self, expected: Token) -> Result<()> {
        let offset = self.offset;
        match self.next_token()? {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(Error::decode(
                offset,
                format!("expected {expected:?}, found {t:?}"),
            )),
            None => Err(Error::decode(
                offset,
                format!("expected {expected:?}, found end of stream"),
            )),
        }
    }

    /// Read the next object member name.
    pub fn next_key(&mut self) -> Result<String> {
        let offset = self.offset;
        match self.next_token()? {
            Some(Token::Key(key)) => Ok(key),
            Some(t) => Err(Error::decode(offset, format!("expected object key, found {t:?}"))),
            None => Err(Error::decode(offset, "expected object key, found end of stream")),
        }
    }

    /// Decode the complete value at the cursor into `T`.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<T> {
        let offset = self.offset;
        let value = self.decode_value()?;
        serde_json::from_value(value).map_err(|e| Error::decode(offset, e.to_string()))
    }

    /// Decode the complete value at the cursor as untyped JSON.
    pub fn decode_value(&mut self) -> Result<serde_json::Value> {
        let token = self.require_token()?;
        self.build(token, 0)
    }

    /// Consume the complete value at the cursor without keeping it.
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let offset = self.offset;
            match self.require_token()? {
                Token::BeginObject | Token::BeginArray => depth += 1,
                Token::EndObject | Token::EndArray if depth > 0 => depth -= 1,
                Token::Key(_) if depth > 0 => continue,
                t @ (Token::EndObject | Token::EndArray | Token::Key(_)) => {
                    return Err(Error::decode(offset, format!("expected a value, found {t:?}")));
                }
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    fn build(&mut self, token: Token, depth: usize) -> Result<serde_json::Value> {
        if depth > MAX_DEPTH {
            return Err(Error::decode(self.offset, "value nested too deeply"));
        }
        match token {
            Token::Null => Ok(serde_json::Value::Null),
            Token::Bool(b) => Ok(serde_json::Value::Bool(b)),
            Token::Number(n) => Ok(serde_json::Value::Number(n)),
            Token::String(s) => Ok(serde_json::Value::String(s)),
            Token::BeginArray => {
                let mut items = Vec::new();
                loop {
                    match self.require_token()? {
                        Token::EndArray => return Ok(serde_json::Value::Array(items)),
                        t => items.push(self.build(t, depth + 1)?),
                    }
                }
            }
            Token::BeginObject => {
                let mut entries = serde_json::Map::new();
                loop {
                    let offset = self.offset;
                    match self.require_token()? {
                        Token::EndObject => return Ok(serde_json::Value::Object(entries)),
                        Token::Key(key) => {
                            let t = self.require_token()?;
                            let value = self.build(t, depth + 1)?;
                            entries.insert(key, value);
                        }
                        t => {
                            return Err(Error::decode(offset, format!("expected object key, found {t:?}")));
                        }
                    }
                }
            }
            t => Err(Error::decode(self.offset, format!("expected a value, found {t:?}"))),
        }
    }

    fn require_token(&mut self) -> Result<Token> {
        match self.next_token()? {
            Some(t) => Ok(t),
            None => Err(Error::decode(self.offset, "unexpected end of stream")),
        }
    }

    fn read_value_token(&mut self) -> Result<Token> {
        let b = self.require_byte("a value")?;
        let token = match b {
            b'{' => {
                self.bump();
                self.stack.push(Frame::Object(Slot::Open));
                return Ok(Token::BeginObject);
            }
            b'[' => {
                self.bump();
                self.stack.push(Frame::Array(Slot::Open));
                return Ok(Token::BeginArray);
            }
            b'"' => Token::String(self.read_string()?),
            b't' => {
                self.read_literal(b"true")?;
                Token::Bool(true)
            }
            b'f' => {
                self.read_literal(b"false")?;
                Token::Bool(false)
            }
            b'n' => {
                self.read_literal(b"null")?;
                Token::Null
            }
            b'-' | b'0'..=b'9' => Token::Number(self.read_number()?),
            other => return Err(self.unexpected(other, "a value")),
        };
        self.value_done();
        Ok(token)
    }

    fn close_container(&mut self) {
        self.stack.pop();
        self.value_done();
    }

    fn value_done(&mut self) {
        if self.stack.is_empty() {
            self.finished = true;
        } else {
            self.set_top(Slot::AfterValue);
        }
    }

    fn set_top(&mut self, slot: Slot) {
        if let Some(frame) = self.stack.last_mut() {
            *frame = match frame {
                Frame::Object(_) => Frame::Object(slot),
                Frame::Array(_) => Frame::Array(slot),
            };
        }
    }

    /// Raw string literal (quotes and escapes included) is collected, then
    /// unescaped by `serde_json`.
    fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        self.expect_byte(b'"')?;
        let mut raw = vec![b'"'];
        let mut escaped = false;
        loop {
            let offset = self.offset;
            let buf = self.reader.fill_buf().map_err(|e| read_failed(offset, e))?;
            if buf.is_empty() {
                return Err(Error::decode(start, "unterminated string"));
            }
            let mut used = 0;
            let mut closed = false;
            for &b in buf {
                used += 1;
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    closed = true;
                    break;
                }
            }
            raw.extend_from_slice(&buf[..used]);
            self.reader.consume(used);
            self.offset += used as u64;
            if closed {
                break;
            }
        }
        serde_json::from_slice(&raw).map_err(|e| Error::decode(start, format!("invalid string: {e}")))
    }

    fn read_number(&mut self) -> Result<Number> {
        let start = self.offset;
        let mut raw = Vec::new();
        while let Some(b) = self.peek()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            raw.push(b);
            self.bump();
        }
        serde_json::from_slice(&raw).map_err(|e| Error::decode(start, format!("invalid number: {e}")))
    }

    fn read_literal(&mut self, word: &'static [u8]) -> Result<()> {
        let start = self.offset;
        for &expected in word {
            match self.peek()? {
                Some(b) if b == expected => self.bump(),
                _ => {
                    return Err(Error::decode(
                        start,
                        format!("invalid literal, expected '{}'", String::from_utf8_lossy(word)),
                    ));
                }
            }
        }
        Ok(())
    }

    fn skip_ws(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.bump();
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let offset = self.offset;
        let buf = self.reader.fill_buf().map_err(|e| read_failed(offset, e))?;
        Ok(buf.first().copied())
    }

    fn require_byte(&mut self, what: &str) -> Result<u8> {
        match self.peek()? {
            Some(b) => Ok(b),
            None => Err(Error::decode(self.offset, format!("expected {what}, found end of stream"))),
        }
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        let b = self.require_byte(&format!("'{}'", expected as char))?;
        if b != expected {
            return Err(self.unexpected(b, &format!("'{}'", expected as char)));
        }
        self.bump();
        Ok(())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn unexpected(&self, found: u8, expected: &str) -> Error {
        Error::decode(
            self.offset,
            format!("expected {expected}, found '{}'", found.escape_ascii()),
        )
    }
}

fn read_failed(offset: u64, e: io::Error) -> Error {
    Error::transport(format!("reading response body at byte {offset}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut stream = TokenStream::new(input.as_bytes());
        let mut out = Vec::new();
        while let Some(t) = stream.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn walks_nested_structure() {
        let got = tokens(r#" {"a": [1, "x\"y", true], "b": {"c": null}} "#);
        assert_eq!(
            got,
            vec![
                Token::BeginObject,
                Token::Key("a".into()),
                Token::BeginArray,
                Token::Number(1.into()),
                Token::String("x\"y".into()),
                Token::Bool(true),
                Token::EndArray,
                Token::Key("b".into()),
                Token::BeginObject,
                Token::Key("c".into()),
                Token::Null,
                Token::EndObject,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn has_more_tracks_innermost_container() {
        let mut s = TokenStream::new(&b"[1, 2]"[..]);
        s.expect_token(Token::BeginArray).unwrap();
        assert!(s.has_more().unwrap());
        s.skip_value().unwrap();
        assert!(s.has_more().unwrap());
        s.skip_value().unwrap();
        assert!(!s.has_more().unwrap());
        s.expect_token(Token::EndArray).unwrap();
        assert_eq!(s.next_token().unwrap(), None);
    }

    #[test]
    fn decode_reads_exactly_one_value() {
        let mut s = TokenStream::new(&br#"{"columns":["n","m"],"data":[]}"#[..]);
        s.expect_token(Token::BeginObject).unwrap();
        assert_eq!(s.next_key().unwrap(), "columns");
        let cols: Vec<String> = s.decode().unwrap();
        assert_eq!(cols, vec!["n", "m"]);
        assert_eq!(s.next_key().unwrap(), "data");
        s.expect_token(Token::BeginArray).unwrap();
    }

    #[test]
    fn unicode_escapes_are_unescaped() {
        assert_eq!(tokens(r#""caf\u00e9""#), vec![Token::String("café".into())]);
    }

    #[test]
    fn trailing_comma_is_rejected() {
        let mut s = TokenStream::new(&b"[1,]"[..]);
        s.next_token().unwrap();
        s.next_token().unwrap();
        let err = s.next_token().unwrap_err();
        assert!(matches!(err, Error::ProtocolDecode { offset: 3, .. }), "{err}");
    }

    #[test]
    fn truncated_stream_is_decode_error() {
        let mut s = TokenStream::new(&br#"{"results":[{"#[..]);
        let err = s.decode_value().unwrap_err();
        assert!(matches!(err, Error::ProtocolDecode { .. }), "{err}");
    }

    #[test]
    fn missing_colon_is_reported() {
        let mut s = TokenStream::new(&br#"{"a" 1}"#[..]);
        s.next_token().unwrap();
        assert!(matches!(s.next_token(), Err(Error::ProtocolDecode { .. })));
    }

    #[test]
    fn garbage_after_top_level_value() {
        let mut s = TokenStream::new(&b"{} x"[..]);
        s.skip_value().unwrap();
        assert!(matches!(s.next_token(), Err(Error::ProtocolDecode { .. })));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let input = "[".repeat(MAX_DEPTH + 2);
        let mut s = TokenStream::new(input.as_bytes());
        let err = s.decode_value().unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{err}");
    }

    #[test]
    fn io_failure_is_transport_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let mut s = TokenStream::new(Broken);
        assert!(matches!(s.next_token(), Err(Error::Transport(_))));
    }
}
