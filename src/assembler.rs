use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{FrameCodec, OpCode};
use crate::message::Message;
use tokio::io::AsyncRead;

struct InProgress {
    opcode: OpCode,
    buffer: Vec<u8>,
}

/// Turns a sequence of frames off the wire into complete logical messages, folding
/// continuation fragments into the message they belong to.
///
/// A control frame (CLOSE/PING/PONG) may legally arrive between the fragments of a data
/// message — RFC 6455 explicitly allows this — and is surfaced immediately as its own
/// message without disturbing the fragment buffer underneath it.
pub struct MessageAssembler {
    in_progress: Option<InProgress>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self { in_progress: None }
    }

    /// Reads frames from `reader` until a complete message is available, then returns it.
    /// May read more than one frame per call when a message is fragmented.
    pub async fn next_message<S: AsyncRead + Unpin>(
        &mut self,
        reader: &mut S,
        config: &WebSocketConfig,
    ) -> Result<Message, Error> {
        loop {
            let frame = FrameCodec::read_frame(reader, config).await?;

            match frame.opcode {
                OpCode::Text | OpCode::Binary => {
                    if self.in_progress.is_some() {
                        return Err(Error::FragmentedInProgress);
                    }
                    if frame.final_fragment {
                        return Message::from_parts(frame.opcode, frame.payload);
                    }
                    self.in_progress = Some(InProgress {
                        opcode: frame.opcode,
                        buffer: frame.payload,
                    });
                }
                OpCode::Continue => {
                    let in_progress = self
                        .in_progress
                        .as_mut()
                        .ok_or(Error::InvalidContinuationFrame)?;
                    in_progress.buffer.extend_from_slice(&frame.payload);
                    if in_progress.buffer.len() > config.max_message_size {
                        self.in_progress = None;
                        return Err(Error::MaxMessageSize);
                    }
                    if frame.final_fragment {
                        let in_progress = self.in_progress.take().unwrap();
                        return Message::from_parts(in_progress.opcode, in_progress.buffer);
                    }
                }
                OpCode::Close | OpCode::Ping | OpCode::Pong => {
                    return Message::from_parts(frame.opcode, frame.payload);
                }
            }
        }
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}
