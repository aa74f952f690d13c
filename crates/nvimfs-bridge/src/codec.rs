//! Framing of msgpack values on a byte stream.
//!
//! msgpack is self-delimiting, so a frame is exactly one encoded value.
//! The decoder waits for more bytes whenever the buffer ends in the middle of
//! a value.

use bytes::{Buf, BytesMut};
use rmpv::Value;
use std::io::{self, Cursor};
use tokio_util::codec::{Decoder, Encoder};

/// Codec turning a byte stream into msgpack values and back.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgpackCodec;

impl MsgpackCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Decoder for MsgpackCodec {
    type Item = Value;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Value>> {
        if src.is_empty() {
            return Ok(None);
        }
        let mut cursor = Cursor::new(&src[..]);
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let consumed = usize::try_from(cursor.position())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                src.advance(consumed);
                Ok(Some(value))
            }
            Err(
                rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e),
            ) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
        }
    }
}

impl Encoder<Value> for MsgpackCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> io::Result<()> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &item).map_err(|e| io::Error::other(e.to_string()))?;
        dst.extend_from_slice(&buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, value).unwrap();
        buf
    }

    #[test]
    fn test_partial_frame_waits() {
        let value = Value::Array(vec![Value::from(1), Value::from("a longer string")]);
        let bytes = encoded(&value);
        let mut codec = MsgpackCodec::new();

        let mut buf = BytesMut::from(&bytes[..bytes.len() - 3]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), bytes.len() - 3);

        buf.extend_from_slice(&bytes[bytes.len() - 3..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(value));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut bytes = encoded(&Value::from(1));
        bytes.extend(encoded(&Value::from("two")));
        let mut buf = BytesMut::from(&bytes[..]);
        let mut codec = MsgpackCodec::new();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Value::from(1)));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Value::from("two")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_appends() {
        let mut codec = MsgpackCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Value::Nil, &mut buf).unwrap();
        codec.encode(Value::Boolean(true), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0xc0, 0xc3]);
    }
}
