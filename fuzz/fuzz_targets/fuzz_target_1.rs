#![no_main]

use libfuzzer_sys::fuzz_target;
use socket_flow::handshake::accept;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

fuzz_target!(|data: &[u8]| {
    let runtime = Runtime::new().unwrap();
    let data = Vec::from(data);

    runtime.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let handshake = build_fuzzed_handshake(&data);
                let _ = socket.write_all(&handshake).await;
            }
        });

        if let Ok(mut client_stream) = TcpStream::connect(addr).await {
            // accept() only reads and validates the request; the outcome (success or a
            // specific Error variant) is all this target checks for — neither should ever
            // panic regardless of what bytes follow the request line.
            let _ = accept(&mut client_stream).await;
        }
    });
});

/// Builds a syntactically-plausible upgrade request around fuzzed header content, so the fuzzer
/// spends its budget on header parsing rather than rediscovering the request line from scratch.
fn build_fuzzed_handshake(data: &[u8]) -> Vec<u8> {
    let mut handshake = b"GET / HTTP/1.1\r\n\
                          Host: 127.0.0.1\r\n\
                          Upgrade: websocket\r\n\
                          Connection: Upgrade\r\n"
        .to_vec();

    let key = base64::Engine::encode(&base64::prelude::BASE64_STANDARD, data);
    handshake.extend_from_slice(format!("Sec-WebSocket-Key: {key}\r\n").as_bytes());
    handshake.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");

    if data.len() % 2 == 0 {
        handshake.extend_from_slice(b"Connection: Fuzzed-Value\r\n");
    }

    handshake.extend_from_slice(data);
    handshake.extend_from_slice(b"\r\n\r\n");
    handshake
}
