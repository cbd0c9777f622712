//! RESP encoding and the length-driven frame decoder.
//!
//! Replies are built as [`RespValue`]s and encoded to strings. Requests arrive as arrays
//! of bulk strings and are decoded into [`Frame`]s straight out of a per-connection
//! [`BytesMut`] buffer: a frame is only produced once every declared byte has arrived,
//! and a trailing partial frame stays in the buffer for the next read.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Largest bulk string the decoder accepts (same limit as Redis' proto-max-bulk-len).
const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("expected array, found '{0}'")]
    ExpectedArray(String),
    #[error("invalid array length '{0}'")]
    InvalidArrayLength(String),
    #[error("empty array")]
    EmptyArray,
    #[error("expected bulk string, found '{0}'")]
    ExpectedBulkString(String),
    #[error("invalid bulk string length '{0}'")]
    InvalidBulkStringLength(String),
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unexpected reply '{0}'")]
    UnexpectedReply(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds an array of bulk strings, the shape every request takes on the wire.
    pub fn command<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(part.into()))
                .collect(),
        )
    }

    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(e) => format!("-{}\r\n", e),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());

                for element in elements {
                    encoded.push_str(&element.encode());
                }

                encoded
            }
        }
    }

    /// Decodes a single-line status or error reply (`+...` / `-...`).
    ///
    /// Used on the replica side of the handshake, where the master answers each step
    /// with a one-line reply. Returns `Ok(None)` until the whole line has arrived.
    pub fn decode_reply(buffer: &mut BytesMut) -> Result<Option<Self>, RespError> {
        let Some((line, consumed)) = read_line(buffer, 0) else {
            return Ok(None);
        };

        let line = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?;

        let reply = if let Some(text) = line.strip_prefix('+') {
            RespValue::SimpleString(text.to_string())
        } else if let Some(text) = line.strip_prefix('-') {
            RespValue::Error(text.to_string())
        } else {
            let line = line.to_string();
            buffer.advance(consumed);
            return Err(RespError::UnexpectedReply(line));
        };

        buffer.advance(consumed);
        Ok(Some(reply))
    }
}

/// Decodes the full-resync snapshot: `$<len>\r\n` followed by exactly `len` raw bytes
/// with no trailing CRLF.
pub fn decode_snapshot(buffer: &mut BytesMut) -> Result<Option<Bytes>, RespError> {
    let Some((header, content_start)) = read_line(buffer, 0) else {
        return Ok(None);
    };

    let length = parse_bulk_header(header)?;

    if buffer.len() < content_start + length {
        return Ok(None);
    }

    buffer.advance(content_start);
    Ok(Some(buffer.split_to(length).freeze()))
}

/// One decoded command: its arguments in wire order and the number of bytes it took up
/// on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    arguments: Vec<String>,
    wire_length: usize,
}

impl Frame {
    /// Builds a frame as if it had been received, computing its wire length from the
    /// canonical encoding.
    pub fn new<I, S>(arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let arguments: Vec<String> = arguments.into_iter().map(Into::into).collect();
        let wire_length = RespValue::command(arguments.iter().cloned()).encode().len();

        Self {
            arguments,
            wire_length,
        }
    }

    /// Decodes the next complete frame from the front of `buffer`.
    ///
    /// * `Ok(Some(frame))` - a frame was decoded and its bytes consumed
    /// * `Ok(None)` - the buffer holds only part of a frame; nothing was consumed
    /// * `Err(_)` - the frame is malformed; its header line was discarded so the next
    ///   call resynchronises on the following line
    pub fn decode(buffer: &mut BytesMut) -> Result<Option<Self>, RespError> {
        match parse_frame(buffer) {
            Ok(Some((arguments, wire_length))) => {
                buffer.advance(wire_length);

                Ok(Some(Self {
                    arguments,
                    wire_length,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let header_length = read_line(buffer, 0).map(|(_, consumed)| consumed);

                if let Some(consumed) = header_length {
                    buffer.advance(consumed);
                }

                Err(e)
            }
        }
    }

    /// The command name, case-folded for dispatch.
    pub fn name(&self) -> String {
        self.arguments
            .first()
            .map(|name| name.to_lowercase())
            .unwrap_or_default()
    }

    /// All arguments including the command name, with their original case.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn wire_length(&self) -> usize {
        self.wire_length
    }

    pub fn into_arguments(self) -> Vec<String> {
        self.arguments
    }
}

fn parse_frame(buffer: &[u8]) -> Result<Option<(Vec<String>, usize)>, RespError> {
    let Some((header, mut position)) = read_line(buffer, 0) else {
        return Ok(None);
    };

    let Some(count) = header.strip_prefix(b"*") else {
        return Err(RespError::ExpectedArray(lossy(header)));
    };

    let count = std::str::from_utf8(count)
        .ok()
        .and_then(|count| count.parse::<usize>().ok())
        .ok_or_else(|| RespError::InvalidArrayLength(lossy(count)))?;

    if count == 0 {
        return Err(RespError::EmptyArray);
    }

    let mut arguments = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        let Some((bulk_header, content_start)) = read_line(buffer, position) else {
            return Ok(None);
        };

        let length = parse_bulk_header(bulk_header)?;
        let content_end = content_start + length;

        if buffer.len() < content_end + 2 {
            return Ok(None);
        }

        if &buffer[content_end..content_end + 2] != b"\r\n" {
            return Err(RespError::MissingTerminator);
        }

        let argument = std::str::from_utf8(&buffer[content_start..content_end])
            .map_err(|_| RespError::InvalidUtf8)?;

        arguments.push(argument.to_string());
        position = content_end + 2;
    }

    Ok(Some((arguments, position)))
}

fn parse_bulk_header(line: &[u8]) -> Result<usize, RespError> {
    let Some(length) = line.strip_prefix(b"$") else {
        return Err(RespError::ExpectedBulkString(lossy(line)));
    };

    std::str::from_utf8(length)
        .ok()
        .and_then(|length| length.parse::<usize>().ok())
        .filter(|length| *length <= MAX_BULK_LENGTH)
        .ok_or_else(|| RespError::InvalidBulkStringLength(lossy(length)))
}

/// Finds the CRLF-terminated line starting at `start`.
///
/// Returns the line without its terminator and the position just past the terminator.
fn read_line(buffer: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let remaining = buffer.get(start..)?;
    let end = remaining.windows(2).position(|window| window == b"\r\n")?;

    Some((&remaining[..end], start + end + 2))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
