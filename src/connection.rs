use crate::assembler::MessageAssembler;
use crate::config::WebSocketConfig;
use crate::error::{CloseCode, Error};
use crate::frame::{Frame, FrameCodec, OpCode};
use crate::message::{encode_close, Message};
use crate::utils::generate_connection_id;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;
use uuid::Uuid;

/// Identity of an accepted connection, used as the server's live-set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where an accepted connection is in its close sequence. Transitions only forward:
/// `Open -> Closing -> Closed`, and every transition is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,
    Closing,
    Closed,
}

pub(crate) type Registry = Arc<Mutex<HashMap<ConnectionId, ConnectionHandle>>>;

/// State shared between the task that owns the reader and any other task (the handler, or the
/// server's shutdown fan-out) that wants to send or close concurrently.
struct Shared {
    id: ConnectionId,
    status: Mutex<ConnectionStatus>,
    closed: Notify,
    writer: Mutex<WriteHalf<TcpStream>>,
    config: WebSocketConfig,
    registry: Registry,
}

impl Shared {
    async fn status(&self) -> ConnectionStatus {
        *self.status.lock().await
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        FrameCodec::write_frame(&mut *writer, frame).await
    }

    /// Tears the connection down exactly once: marks it `Closed`, shuts down the write half,
    /// drops it from the server's live set and wakes anyone waiting in `close()`.
    async fn teardown(&self) {
        {
            let mut status = self.status.lock().await;
            if *status == ConnectionStatus::Closed {
                return;
            }
            *status = ConnectionStatus::Closed;
        }
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }
        self.registry.lock().await.remove(&self.id);
        self.closed.notify_waiters();
    }

    /// Drives the close handshake: moves `Open` to `Closing`, sends the CLOSE frame, then waits
    /// up to `config.close_timeout` for the peer's acknowledgement (observed by whichever task
    /// reads it) before tearing down unconditionally. A no-op once the connection has already
    /// left `Open` — callable from the connection's own task or the server's shutdown fan-out.
    async fn close(&self, code: Option<CloseCode>, reason: Option<String>) -> Result<(), Error> {
        {
            let mut status = self.status.lock().await;
            if *status != ConnectionStatus::Open {
                return Ok(());
            }
            *status = ConnectionStatus::Closing;
        }

        let payload = encode_close(code.map(CloseCode::as_u16), reason.as_deref());
        let _ = self
            .write_frame(&Frame::new(true, OpCode::Close, payload))
            .await;

        let notified = self.closed.notified();
        tokio::pin!(notified);
        if self.status().await != ConnectionStatus::Closed {
            let _ = timeout(self.config.close_timeout, notified).await;
        }

        self.teardown().await;
        Ok(())
    }

    async fn send(&self, frame: Frame) -> Result<(), Error> {
        if self.status().await != ConnectionStatus::Open {
            return Ok(());
        }
        self.write_frame(&frame).await
    }
}

/// A cheap, cloneable reference to an accepted connection. Handed to the application `Handler`
/// and stored in the server's live-connection set; closing or sending through it never requires
/// holding the reader, so the server can fan a shutdown out across many connections at once.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.shared.status().await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.shared
            .send(Frame::new(true, OpCode::Text, text.into().into_bytes()))
            .await
    }

    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.shared
            .send(Frame::new(true, OpCode::Binary, data.into()))
            .await
    }

    /// Sends any already-built `Message` (including PING/PONG, which `send_text`/`send_binary`
    /// have no way to express) as a single frame.
    pub async fn send_message(&self, message: Message) -> Result<(), Error> {
        self.shared.send(message.into_frame()).await
    }

    pub async fn close(
        &self,
        code: Option<CloseCode>,
        reason: Option<String>,
    ) -> Result<(), Error> {
        self.shared.close(code, reason).await
    }
}

/// Per-connection state machine layered on [`MessageAssembler`]. Owns the read half exclusively
/// — it is the only thing in the server that ever reads from this connection's socket.
pub struct ConnectionProtocol {
    shared: Arc<Shared>,
    reader: ReadHalf<TcpStream>,
    assembler: MessageAssembler,
}

impl ConnectionProtocol {
    pub fn new(
        stream: TcpStream,
        config: WebSocketConfig,
        registry: Registry,
    ) -> (Self, ConnectionHandle) {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared {
            id: ConnectionId(generate_connection_id()),
            status: Mutex::new(ConnectionStatus::Open),
            closed: Notify::new(),
            writer: Mutex::new(writer),
            config,
            registry,
        });
        let protocol = ConnectionProtocol {
            shared: shared.clone(),
            reader,
            assembler: MessageAssembler::new(),
        };
        (protocol, ConnectionHandle { shared })
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Waits for the next complete message. Returns `Err(ConnectionClosed)` if the connection has
    /// already been torn down. While `Closing`, keeps reading (draining) rather than stopping —
    /// the peer's mirrored CLOSE is what finally reaches `teardown`; any data frames observed in
    /// the meantime are still returned and it's up to the caller whether to dispatch them.
    pub async fn recv(&mut self) -> Result<Message, Error> {
        if self.shared.status().await == ConnectionStatus::Closed {
            return Err(Error::ConnectionClosed);
        }

        let message = self
            .assembler
            .next_message(&mut self.reader, &self.shared.config)
            .await?;

        if let Message::Close { .. } = &message {
            let was_open = self.shared.status().await == ConnectionStatus::Open;
            if was_open {
                let _ = self
                    .shared
                    .write_frame(&Frame::new(true, OpCode::Close, Vec::new()))
                    .await;
            }
            self.shared.teardown().await;
        }

        Ok(message)
    }

    /// Closes the connection in response to a protocol or I/O failure: maps `err` to a close code
    /// when one applies and runs the same close sequence `ConnectionHandle::close` does,
    /// otherwise tears down directly since there's no well-formed frame left to send.
    pub async fn fail(&self, err: &Error) {
        match err.to_close_code() {
            Some(code) => {
                let _ = self.shared.close(Some(code), None).await;
            }
            None => self.shared.teardown().await,
        }
    }
}
