use crate::config::WebSocketConfig;
use crate::error::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continue),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub final_fragment: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(final_fragment: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            final_fragment,
            opcode,
            payload,
        }
    }
}

/// Stateless parser/serializer for a single WebSocket frame. Holds no buffering or connection
/// state of its own — everything it needs comes from the reader/writer it's handed.
pub struct FrameCodec;

impl FrameCodec {
    /// Reads one frame off `reader`, server role: the peer's frames must be masked, ours never
    /// are. `config.max_frame_size` bounds the declared payload length before a single byte of
    /// it is read, so a hostile length prefix can't force an unbounded allocation.
    pub async fn read_frame<R: AsyncRead + Unpin>(
        reader: &mut R,
        config: &WebSocketConfig,
    ) -> Result<Frame, Error> {
        let mut header = [0u8; 2];
        reader.read_exact(&mut header).await?;

        // Bit 7 of byte 0 is FIN, bits 4-6 are RSV1-3, bits 0-3 are the opcode.
        let final_fragment = (header[0] & 0b1000_0000) != 0;
        let rsv1 = (header[0] & 0b0100_0000) != 0;
        let rsv2 = (header[0] & 0b0010_0000) != 0;
        let rsv3 = (header[0] & 0b0001_0000) != 0;
        let opcode = OpCode::from(header[0] & 0b0000_1111)?;

        // No extension negotiates the RSV bits in this profile; any of them set is a protocol error.
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::RSVNotZero);
        }

        if !final_fragment && opcode.is_control() {
            return Err(Error::ControlFramesFragmented);
        }

        // Bit 7 of byte 1 is the mask flag, bits 0-6 are the length hint.
        let masked = (header[1] & 0b1000_0000) != 0;
        let mut length = (header[1] & 0b0111_1111) as u64;

        if length > 125 && opcode.is_control() {
            return Err(Error::ControlFramePayloadSize);
        }

        if length == 126 {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await?;
            length = u16::from_be_bytes(ext) as u64;
        } else if length == 127 {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext).await?;
            length = u64::from_be_bytes(ext);
            // The high bit of the 64-bit extended length must be zero (RFC 6455 §5.2).
            if length & 0x8000_0000_0000_0000 != 0 {
                return Err(Error::RSVNotZero);
            }
        }

        let max_frame_size = config.max_frame_size as u64;
        if length > max_frame_size {
            return Err(Error::MaxFrameSize);
        }

        // A server must reject frames that aren't masked: only clients mask.
        if !masked {
            return Err(Error::UnmaskedClientFrame);
        }
        let mut mask = [0u8; 4];
        reader.read_exact(&mut mask).await?;

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload).await?;
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }

        Ok(Frame {
            final_fragment,
            opcode,
            payload,
        })
    }

    /// Serializes `frame` and writes it in full, unmasked (server-originated frames are never
    /// masked), then flushes the sink so the caller observes a drained write.
    pub async fn write_frame<W: AsyncWrite + Unpin>(
        writer: &mut W,
        frame: &Frame,
    ) -> Result<(), Error> {
        let first_byte = (frame.final_fragment as u8) << 7 | frame.opcode.as_u8();
        let payload_len = frame.payload.len();

        writer.write_all(&[first_byte]).await?;

        if payload_len <= 125 {
            writer.write_all(&[payload_len as u8]).await?;
        } else if payload_len <= 65535 {
            writer
                .write_all(&[126, (payload_len >> 8) as u8, payload_len as u8])
                .await?;
        } else {
            let bytes = (payload_len as u64).to_be_bytes();
            writer.write_all(&[127]).await?;
            writer.write_all(&bytes).await?;
        }

        writer.write_all(&frame.payload).await?;
        writer.flush().await?;

        Ok(())
    }
}
