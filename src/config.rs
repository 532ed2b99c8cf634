use std::time::Duration;

/// Per-connection protocol limits, shared by the frame codec, the message assembler and the
/// connection state machine.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Caps a single frame's declared payload length. Checked before the payload is read, so a
    /// hostile length prefix can't force an unbounded allocation.
    pub max_frame_size: usize,
    /// Caps the assembler's accumulated buffer for a fragmented message.
    pub max_message_size: usize,
    /// Bounds how long `close()` waits for the peer's CLOSE acknowledgement before tearing
    /// down anyway.
    pub close_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level server configuration: where to listen, and the protocol limits every accepted
/// connection is built with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub web_socket_config: WebSocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 0,
            web_socket_config: WebSocketConfig::default(),
        }
    }
}
