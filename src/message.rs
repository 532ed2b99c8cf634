use crate::error::{CloseCode, Error};
use crate::frame::{Frame, OpCode};

/// A complete logical WebSocket message, reassembled from one or more frames.
///
/// Unlike `Frame`, a `Message` never carries `OpCode::Continue` — the assembler consumes
/// continuation fragments internally and only ever yields one of the variants below.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
}

impl Message {
    /// Converts a reassembled opcode/payload pair into a `Message`. `payload` must already be
    /// the full message body (continuation fragments folded in by the caller).
    pub fn from_parts(opcode: OpCode, payload: Vec<u8>) -> Result<Self, Error> {
        match opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(payload)?)),
            OpCode::Binary => Ok(Message::Binary(payload)),
            OpCode::Close => {
                let (code, reason) = decode_close(&payload)?;
                Ok(Message::Close { code, reason })
            }
            OpCode::Ping => Ok(Message::Ping(payload)),
            OpCode::Pong => Ok(Message::Pong(payload)),
            OpCode::Continue => Err(Error::InvalidContinuationFrame),
        }
    }

    /// Converts this message into the single frame that carries it. The codec never fragments
    /// outbound payloads, so this is always `final_fragment = true`.
    pub fn into_frame(self) -> Frame {
        match self {
            Message::Text(text) => Frame::new(true, OpCode::Text, text.into_bytes()),
            Message::Binary(data) => Frame::new(true, OpCode::Binary, data),
            Message::Close { code, reason } => {
                Frame::new(true, OpCode::Close, encode_close(code, reason.as_deref()))
            }
            Message::Ping(data) => Frame::new(true, OpCode::Ping, data),
            Message::Pong(data) => Frame::new(true, OpCode::Pong, data),
        }
    }
}

/// Builds a CLOSE payload: a 2-byte big-endian status code followed by a UTF-8 reason, per
/// RFC 6455 §5.5.1. With no code, the payload is empty.
pub fn encode_close(code: Option<u16>, reason: Option<&str>) -> Vec<u8> {
    let mut data = Vec::new();
    if let Some(code) = code {
        data.extend_from_slice(&code.to_be_bytes());
        if let Some(reason) = reason {
            data.extend_from_slice(reason.as_bytes());
        }
    }
    data
}

pub fn encode_close_code(code: CloseCode, reason: Option<&str>) -> Vec<u8> {
    encode_close(Some(code.as_u16()), reason)
}

/// Decodes a CLOSE payload back into its status code and reason. An empty or single-byte
/// payload is a code-less close (both `None`) — there's no status code to recover from one byte.
pub fn decode_close(data: &[u8]) -> Result<(Option<u16>, Option<String>), Error> {
    if data.len() < 2 {
        return Ok((None, None));
    }
    let code = u16::from_be_bytes([data[0], data[1]]);
    let reason = if data.len() > 2 {
        Some(String::from_utf8(data[2..].to_vec())?)
    } else {
        None
    };
    Ok((Some(code), reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_with_reason() {
        let payload = encode_close_code(CloseCode::Normal, Some("bye"));
        let (code, reason) = decode_close(&payload).unwrap();
        assert_eq!(code, Some(1000));
        assert_eq!(reason.as_deref(), Some("bye"));
    }

    #[test]
    fn decode_empty_payload_has_no_code() {
        let (code, reason) = decode_close(&[]).unwrap();
        assert_eq!(code, None);
        assert_eq!(reason, None);
    }

    #[test]
    fn decode_rejects_invalid_utf8_reason() {
        let mut payload = 1000u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert!(decode_close(&payload).is_err());
    }

    #[test]
    fn from_parts_rejects_invalid_utf8_text() {
        let err = Message::from_parts(OpCode::Text, vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::FromUtf8Error { .. }));
    }
}
