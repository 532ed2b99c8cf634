use async_trait::async_trait;
use socket_flow::config::ServerConfig;
use socket_flow::connection::ConnectionHandle;
use socket_flow::handler::Handler;
use socket_flow::message::Message;
use socket_flow::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn recv(&mut self, connection: &ConnectionHandle, message: Message) {
        match message {
            Message::Text(text) => {
                let _ = connection.send_text(text).await;
            }
            Message::Binary(data) => {
                let _ = connection.send_binary(data).await;
            }
            _ => {}
        }
    }
}

async fn connected_client(port: u16) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = "GET / HTTP/1.1\r\n\
         Host: 127.0.0.1\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n";
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = [0u8; 512];
    let mut total = 0;
    loop {
        let n = stream.read(&mut response[total..]).await.unwrap();
        total += n;
        if response[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    assert!(String::from_utf8_lossy(&response[..total]).starts_with("HTTP/1.1 101"));
    stream
}

/// Writes a masked client frame, as a real browser/client peer would.
async fn send_masked(stream: &mut TcpStream, opcode: u8, payload: &[u8]) {
    let mask_key = [0x01u8, 0x02, 0x03, 0x04];
    let masked: Vec<u8> = payload
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ mask_key[i % 4])
        .collect();

    let mut bytes = vec![0x80 | opcode];
    let len = masked.len();
    if len <= 125 {
        bytes.push(0x80 | len as u8);
    } else {
        bytes.push(0x80 | 126);
        bytes.extend_from_slice(&(len as u16).to_be_bytes());
    }
    bytes.extend_from_slice(&mask_key);
    bytes.extend_from_slice(&masked);
    stream.write_all(&bytes).await.unwrap();
}

/// Reads one unmasked server frame: `(opcode, payload)`.
async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    let opcode = header[0] & 0x0f;
    let mut len = (header[1] & 0x7f) as u64;
    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).await.unwrap();
        len = u16::from_be_bytes(ext) as u64;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).await.unwrap();
        len = u64::from_be_bytes(ext);
    }
    assert_eq!(header[1] & 0x80, 0, "server frames must not be masked");
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    (opcode, payload)
}

#[tokio::test]
async fn echoes_a_text_message_round_trip() {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, || EchoHandler).await.unwrap();
    let port = server.config().port;

    let mut client = connected_client(port).await;
    send_masked(&mut client, 0x1, b"hello").await;

    let (opcode, payload) = read_frame(&mut client).await;
    assert_eq!(opcode, 0x1);
    assert_eq!(payload, b"hello");
}

#[tokio::test]
async fn close_handshake_is_mirrored_and_connection_is_deregistered() {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, || EchoHandler).await.unwrap();
    let port = server.config().port;

    let mut client = connected_client(port).await;
    let close_payload = 1000u16.to_be_bytes();
    send_masked(&mut client, 0x8, &close_payload).await;

    let (opcode, _) = read_frame(&mut client).await;
    assert_eq!(opcode, 0x8);

    for _ in 0..50 {
        if server.connection_count().await == 0 {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("connection was not deregistered after the close handshake completed");
}

#[tokio::test]
async fn server_close_fans_out_to_every_live_connection() {
    // The test clients never mirror the CLOSE frame back, so each connection's close() call
    // would otherwise block for the default 10s close_timeout before tearing down anyway.
    let mut web_socket_config = socket_flow::config::WebSocketConfig::default();
    web_socket_config.close_timeout = Duration::from_millis(200);
    let config = ServerConfig {
        port: 0,
        web_socket_config,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, || EchoHandler).await.unwrap();
    let port = server.config().port;

    let mut clients = vec![
        connected_client(port).await,
        connected_client(port).await,
        connected_client(port).await,
    ];

    for _ in 0..50 {
        if server.connection_count().await == clients.len() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.connection_count().await, clients.len());

    server.close(Some("shutting down".to_string())).await;

    for client in clients.iter_mut() {
        let (opcode, payload) = read_frame(client).await;
        assert_eq!(opcode, 0x8);
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        assert_eq!(code, 1001);
    }

    assert_eq!(server.connection_count().await, 0);
}

struct ConcurrentSendHandler;

#[async_trait]
impl Handler for ConcurrentSendHandler {
    async fn recv(&mut self, connection: &ConnectionHandle, _message: Message) {
        let first = connection.send_text("a".repeat(70_000));
        let second = connection.send_text("b".repeat(70_000));
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();
    }
}

#[tokio::test]
async fn concurrent_sends_land_as_two_complete_non_interleaved_frames() {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, || ConcurrentSendHandler).await.unwrap();
    let port = server.config().port;

    let mut client = connected_client(port).await;
    send_masked(&mut client, 0x1, b"go").await;

    let (opcode_one, payload_one) = read_frame(&mut client).await;
    let (opcode_two, payload_two) = read_frame(&mut client).await;

    assert_eq!(opcode_one, 0x1);
    assert_eq!(opcode_two, 0x1);
    assert_eq!(payload_one.len(), 70_000);
    assert_eq!(payload_two.len(), 70_000);
    // a single frame's payload must be uniformly one repeated byte: any interleaving between the
    // two concurrent sends would show up as a mix of b'a' and b'b' within one frame.
    assert!(payload_one.iter().all(|&b| b == payload_one[0]));
    assert!(payload_two.iter().all(|&b| b == payload_two[0]));
    assert_ne!(payload_one[0], payload_two[0]);
}

struct RecordingHandler {
    closes: std::sync::Arc<tokio::sync::Mutex<Vec<Option<u16>>>>,
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn recv(&mut self, _connection: &ConnectionHandle, _message: Message) {}

    async fn on_close(
        &mut self,
        _connection: &ConnectionHandle,
        code: Option<u16>,
        _reason: Option<String>,
    ) {
        self.closes.lock().await.push(code);
    }
}

#[tokio::test]
async fn reserved_bit_set_closes_with_protocol_error_and_notifies_handler() {
    let closes = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let factory_closes = closes.clone();
    // the test client never mirrors the CLOSE frame back, so close() would otherwise wait out
    // the default 10s close_timeout before tearing down.
    let mut web_socket_config = socket_flow::config::WebSocketConfig::default();
    web_socket_config.close_timeout = Duration::from_millis(200);
    let config = ServerConfig {
        port: 0,
        web_socket_config,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, move || RecordingHandler {
        closes: factory_closes.clone(),
    })
    .await
    .unwrap();
    let port = server.config().port;

    let mut client = connected_client(port).await;

    // a well-formed masked text frame with RSV1 (bit 6 of byte 0) forced on.
    let mask_key = [0x01u8, 0x02, 0x03, 0x04];
    let payload: Vec<u8> = b"hi".iter().enumerate().map(|(i, b)| b ^ mask_key[i % 4]).collect();
    let mut bytes = vec![0x80 | 0x40 | 0x1, 0x80 | payload.len() as u8];
    bytes.extend_from_slice(&mask_key);
    bytes.extend_from_slice(&payload);
    client.write_all(&bytes).await.unwrap();

    let (opcode, payload) = read_frame(&mut client).await;
    assert_eq!(opcode, 0x8);
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    assert_eq!(code, 1002);

    for _ in 0..50 {
        if !closes.lock().await.is_empty() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(closes.lock().await.as_slice(), &[Some(1002)]);
}
