use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Close codes the connection state machine can report to a peer (RFC 6455 §7.4.1, subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    UnexpectedType = 1003,
    WrongType = 1007,
    PolicyViolation = 1008,
    MessageTooBig = 1009,
    ExtensionExpected = 1010,
    UnexpectedCondition = 1011,
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Handshake Errors
    #[error("Couldn't find Sec-WebSocket-Key header in the request")]
    NoSecWebsocketKey,

    #[error("handshake header line exceeded the maximum allowed length")]
    HeaderLineTooLong,

    #[error("handshake request exceeded the maximum allowed header count")]
    TooManyHeaders,

    #[error("handshake header line was malformed")]
    MalformedHeaderLine,

    // Framing Errors
    #[error("RSV not zero")]
    RSVNotZero,

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame with invalid payload size, can't be greater than 125")]
    ControlFramePayloadSize,

    #[error("Max frame size reached")]
    MaxFrameSize,

    #[error("Max message size reached")]
    MaxMessageSize,

    #[error("client frames must be masked")]
    UnmaskedClientFrame,

    // Fragmentation Errors
    #[error("Invalid frame while there is a fragmented message in progress")]
    InvalidFrameFragmentation,

    #[error("Incoming fragmented message but there is one already in progress")]
    FragmentedInProgress,

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("Invalid Opcode")]
    InvalidOpcode,

    // Connection state errors
    #[error("connection is closed")]
    ConnectionClosed,
}

impl Error {
    /// Maps a protocol failure to the close code the connection should report to the peer.
    ///
    /// Errors that never reach the wire (I/O failures, timeouts, a handshake that never
    /// produced a connection) return `None`.
    pub fn to_close_code(&self) -> Option<CloseCode> {
        match self {
            Error::RSVNotZero
            | Error::ControlFramesFragmented
            | Error::ControlFramePayloadSize
            | Error::UnmaskedClientFrame
            | Error::InvalidFrameFragmentation
            | Error::InvalidContinuationFrame
            | Error::FragmentedInProgress
            | Error::InvalidOpcode
            | Error::MaxFrameSize => Some(CloseCode::ProtocolError),
            Error::MaxMessageSize => Some(CloseCode::MessageTooBig),
            Error::FromUtf8Error { .. } => Some(CloseCode::WrongType),
            Error::IOError { .. }
            | Error::Timeout { .. }
            | Error::ConnectionClosed
            | Error::NoSecWebsocketKey
            | Error::HeaderLineTooLong
            | Error::TooManyHeaders
            | Error::MalformedHeaderLine => None,
        }
    }
}
