//! 🌊 JSON event scanner — read a JSON document as a stream of `(prefix, event, value)`
//! triples without ever holding the whole thing in memory.
//!
//! For a document like `{"item": [{"content": "hi"}]}` the scanner produces:
//!
//! ```text
//! ("",                start_map,   None)
//! ("",                map_key,     "item")
//! ("item",            start_array, None)
//! ("item.item",       start_map,   None)
//! ("item.item",       map_key,     "content")
//! ("item.item.content", string,    "hi")
//! ("item.item",       end_map,     None)
//! ("item",            end_array,   None)
//! ("",                end_map,     None)
//! ```
//!
//! Prefixes are the dotted path of map keys leading to the value; every array level
//! contributes an `item` segment. Map keys are reported under the prefix of the map
//! that owns them.
//!
//! 🧠 Knowledge graph:
//! - Reads fixed-size chunks from any `AsyncRead`; strings are scanned with `memchr2`
//!   for the closing quote or an escape, then handed to serde_json for unescaping.
//! - Numbers are validated by serde_json too. We tokenize, serde_json judges.
//! - One top-level value per document. Anything after it besides whitespace is an error.

use std::fmt;

use anyhow::{Context, Result, bail};
use memchr::memchr2;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 📏 64KiB per read. Big enough to amortize syscalls, small enough to not care.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// 🏷️ The event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonEventKind {
    Null,
    Boolean,
    Number,
    String,
    MapKey,
    StartMap,
    EndMap,
    StartArray,
    EndArray,
}

impl JsonEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::MapKey => "map_key",
            Self::StartMap => "start_map",
            Self::EndMap => "end_map",
            Self::StartArray => "start_array",
            Self::EndArray => "end_array",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "number" => Self::Number,
            "string" => Self::String,
            "map_key" => Self::MapKey,
            "start_map" => Self::StartMap,
            "end_map" => Self::EndMap,
            "start_array" => Self::StartArray,
            "end_array" => Self::EndArray,
            _ => return None,
        })
    }
}

impl fmt::Display for JsonEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🎯 One observation from the scanner. Structural events carry no value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonEvent {
    pub prefix: String,
    pub kind: JsonEventKind,
    pub value: Option<Value>,
}

#[derive(Debug)]
enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Colon,
    Comma,
    Str(String),
    Scalar(JsonEventKind, Value),
}

#[derive(Debug, Clone, Copy)]
enum ObjectState {
    KeyOrEnd,
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy)]
enum ArrayState {
    ValueOrEnd,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object(ObjectState),
    Array(ArrayState),
}

/// 🌊 Pull-based event scanner over an async byte source.
pub struct JsonEventReader<R> {
    reader: R,
    chunk_size: usize,
    buf: Vec<u8>,
    pos: usize,
    // -- absolute offset of buf[0], for error messages that point somewhere useful
    buf_offset: u64,
    eof: bool,
    frames: Vec<Frame>,
    path: Vec<String>,
    finished: bool,
    scratch: Vec<u8>,
}

impl<R> fmt::Debug for JsonEventReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEventReader")
            .field("offset", &(self.buf_offset + self.pos as u64))
            .field("depth", &self.frames.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> JsonEventReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            buf: Vec::new(),
            pos: 0,
            buf_offset: 0,
            eof: false,
            frames: Vec::new(),
            path: Vec::new(),
            finished: false,
            scratch: Vec::new(),
        }
    }

    /// 📍 Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.buf_offset + self.pos as u64
    }

    /// 📄 The next event, `Ok(None)` once the top-level value is closed and only
    /// whitespace remains.
    pub async fn next_event(&mut self) -> Result<Option<JsonEvent>> {
        loop {
            if self.finished {
                return match self.next_token().await? {
                    None => Ok(None),
                    Some(token) => bail!(
                        "💀 trailing data after the top-level JSON value at byte {}: {:?}",
                        self.position(),
                        token
                    ),
                };
            }

            let Some(token) = self.next_token().await? else {
                if self.frames.is_empty() {
                    bail!("💀 the JSON document is empty. Nothing to scan, nothing to stream.");
                }
                bail!(
                    "💀 unexpected end of JSON at byte {} with {} container(s) still open",
                    self.position(),
                    self.frames.len()
                );
            };

            let Some(top) = self.frames.last().copied() else {
                return self.begin_value(token).map(Some);
            };

            match top {
                Frame::Object(state) => match (state, token) {
                    (ObjectState::KeyOrEnd | ObjectState::CommaOrEnd, Token::EndObject) => {
                        return Ok(Some(self.close_container(JsonEventKind::EndMap)));
                    }
                    (ObjectState::KeyOrEnd | ObjectState::Key, Token::Str(key)) => {
                        self.set_top(Frame::Object(ObjectState::Colon));
                        let prefix = self.parent_prefix();
                        if let Some(last) = self.path.last_mut() {
                            last.clone_from(&key);
                        }
                        return Ok(Some(JsonEvent {
                            prefix,
                            kind: JsonEventKind::MapKey,
                            value: Some(Value::String(key)),
                        }));
                    }
                    (ObjectState::Colon, Token::Colon) => {
                        self.set_top(Frame::Object(ObjectState::Value));
                    }
                    (ObjectState::Value, token) => {
                        self.set_top(Frame::Object(ObjectState::CommaOrEnd));
                        return self.begin_value(token).map(Some);
                    }
                    (ObjectState::CommaOrEnd, Token::Comma) => {
                        self.set_top(Frame::Object(ObjectState::Key));
                    }
                    (state, token) => bail!(
                        "💀 malformed JSON object at byte {}: got {:?} while expecting {:?}",
                        self.position(),
                        token,
                        state
                    ),
                },
                Frame::Array(state) => match (state, token) {
                    (ArrayState::ValueOrEnd | ArrayState::CommaOrEnd, Token::EndArray) => {
                        return Ok(Some(self.close_container(JsonEventKind::EndArray)));
                    }
                    (ArrayState::CommaOrEnd, Token::Comma) => {
                        self.set_top(Frame::Array(ArrayState::Value));
                    }
                    (ArrayState::ValueOrEnd | ArrayState::Value, token) => {
                        self.set_top(Frame::Array(ArrayState::CommaOrEnd));
                        return self.begin_value(token).map(Some);
                    }
                    (state, token) => bail!(
                        "💀 malformed JSON array at byte {}: got {:?} while expecting {:?}",
                        self.position(),
                        token,
                        state
                    ),
                },
            }
        }
    }

    fn prefix(&self) -> String {
        self.path.join(".")
    }

    fn parent_prefix(&self) -> String {
        let parents = self.path.len().saturating_sub(1);
        self.path[..parents].join(".")
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.frames.last_mut() {
            *top = frame;
        }
    }

    fn begin_value(&mut self, token: Token) -> Result<JsonEvent> {
        let prefix = self.prefix();
        let (kind, value) = match token {
            Token::BeginObject => {
                self.frames.push(Frame::Object(ObjectState::KeyOrEnd));
                self.path.push(String::new());
                (JsonEventKind::StartMap, None)
            }
            Token::BeginArray => {
                self.frames.push(Frame::Array(ArrayState::ValueOrEnd));
                self.path.push("item".to_string());
                (JsonEventKind::StartArray, None)
            }
            Token::Str(s) => (JsonEventKind::String, Some(Value::String(s))),
            Token::Scalar(kind, value) => (kind, Some(value)),
            other => bail!(
                "💀 expected a JSON value at byte {}, found {:?}",
                self.position(),
                other
            ),
        };
        if self.frames.is_empty() {
            self.finished = true;
        }
        Ok(JsonEvent {
            prefix,
            kind,
            value,
        })
    }

    fn close_container(&mut self, kind: JsonEventKind) -> JsonEvent {
        self.frames.pop();
        self.path.pop();
        if self.frames.is_empty() {
            self.finished = true;
        }
        JsonEvent {
            prefix: self.prefix(),
            kind,
            value: None,
        }
    }

    async fn fill(&mut self) -> Result<bool> {
        if self.pos < self.buf.len() {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        self.buf_offset += self.buf.len() as u64;
        self.buf.resize(self.chunk_size, 0);
        let bytes_read = self
            .reader
            .read(&mut self.buf[..])
            .await
            .context("💀 the JSON byte stream hiccuped mid-read")?;
        self.buf.truncate(bytes_read);
        self.pos = 0;
        if bytes_read == 0 {
            self.eof = true;
            return Ok(false);
        }
        Ok(true)
    }

    async fn peek(&mut self) -> Result<Option<u8>> {
        if !self.fill().await? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.pos]))
    }

    async fn next_token(&mut self) -> Result<Option<Token>> {
        let first = loop {
            match self.peek().await? {
                Some(b' ' | b'\n' | b'\r' | b'\t') => self.pos += 1,
                Some(byte) => break byte,
                None => return Ok(None),
            }
        };

        let token = match first {
            b'{' => self.single(Token::BeginObject),
            b'}' => self.single(Token::EndObject),
            b'[' => self.single(Token::BeginArray),
            b']' => self.single(Token::EndArray),
            b':' => self.single(Token::Colon),
            b',' => self.single(Token::Comma),
            b'"' => Token::Str(self.lex_string().await?),
            b'-' | b'0'..=b'9' => self.lex_number().await?,
            b't' | b'f' | b'n' => self.lex_literal().await?,
            other => bail!(
                "💀 unexpected byte {:?} at offset {} — that is not how JSON starts anything",
                other as char,
                self.position()
            ),
        };
        Ok(Some(token))
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    async fn lex_string(&mut self) -> Result<String> {
        let start = self.position();
        self.scratch.clear();
        self.scratch.push(b'"');
        self.pos += 1;

        loop {
            if !self.fill().await? {
                bail!("💀 unterminated JSON string starting at byte {start}");
            }
            let window = &self.buf[self.pos..];
            match memchr2(b'"', b'\\', window) {
                None => {
                    self.scratch.extend_from_slice(window);
                    self.pos = self.buf.len();
                }
                Some(i) => {
                    let stop = window[i];
                    self.scratch.extend_from_slice(&window[..=i]);
                    self.pos += i + 1;
                    if stop == b'"' {
                        break;
                    }
                    // -- escaped byte rides along verbatim, serde_json decodes it below
                    if !self.fill().await? {
                        bail!("💀 JSON string starting at byte {start} ends mid-escape");
                    }
                    self.scratch.push(self.buf[self.pos]);
                    self.pos += 1;
                }
            }
        }

        serde_json::from_slice::<String>(&self.scratch)
            .with_context(|| format!("💀 invalid JSON string starting at byte {start}"))
    }

    async fn lex_number(&mut self) -> Result<Token> {
        let start = self.position();
        self.scratch.clear();
        while let Some(byte) = self.peek().await? {
            if !matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.scratch.push(byte);
            self.pos += 1;
        }
        let number = serde_json::from_slice::<serde_json::Number>(&self.scratch)
            .with_context(|| format!("💀 invalid JSON number at byte {start}"))?;
        Ok(Token::Scalar(JsonEventKind::Number, Value::Number(number)))
    }

    async fn lex_literal(&mut self) -> Result<Token> {
        let start = self.position();
        self.scratch.clear();
        while let Some(byte) = self.peek().await? {
            if !byte.is_ascii_alphabetic() {
                break;
            }
            self.scratch.push(byte);
            self.pos += 1;
        }
        Ok(match self.scratch.as_slice() {
            b"true" => Token::Scalar(JsonEventKind::Boolean, Value::Bool(true)),
            b"false" => Token::Scalar(JsonEventKind::Boolean, Value::Bool(false)),
            b"null" => Token::Scalar(JsonEventKind::Null, Value::Null),
            other => bail!(
                "💀 unknown JSON literal '{}' at byte {start}",
                String::from_utf8_lossy(other)
            ),
        })
    }
}
