//! Tokio codecs for IRC line framing.
//!
//! [`LineCodec`] frames CR-LF terminated lines (bare LF accepted) with the
//! 512-byte limit; [`IrcCodec`] layers [`Message`] parsing and serialization
//! on top.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{Message, MAX_LINE_LEN};

/// Frames raw IRC lines. Decoded lines have their CR-LF stripped; encoded
/// lines get CR-LF appended.
pub struct LineCodec {
    max_len: usize,
}

impl LineCodec {
    /// Codec with the standard 512-byte limit.
    pub fn new() -> Self {
        LineCodec {
            max_len: MAX_LINE_LEN,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        let Some(pos) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let frame = src.split_to(pos + 1);
        if frame.len() > self.max_len {
            return Err(ProtocolError::LineTooLong {
                actual: frame.len(),
                limit: self.max_len,
            });
        }
        let line = String::from_utf8_lossy(&frame);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if line.len() + 2 > self.max_len {
            return Err(ProtocolError::LineTooLong {
                actual: line.len() + 2,
                limit: self.max_len,
            });
        }
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Encodes and decodes [`Message`] values over [`LineCodec`] framing.
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// A codec with the standard line limit.
    pub fn new() -> Self {
        IrcCodec {
            inner: LineCodec::new(),
        }
    }

    /// Reject outgoing content that would break framing.
    fn sanitize(rendered: String) -> Result<String, ProtocolError> {
        match rendered.chars().find(|&c| c == '\r' || c == '\n' || c == '\0') {
            Some(c) => Err(ProtocolError::IllegalCharacter(c)),
            None => Ok(rendered),
        }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        // Empty lines between messages are tolerated and skipped.
        loop {
            match self.inner.decode(src)? {
                Some(line) if line.is_empty() => continue,
                Some(line) => return line.parse::<Message>().map(Some),
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = Self::sanitize(msg.to_string())?;
        self.inner.encode(line, dst)
    }
}
