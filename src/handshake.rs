use crate::error::Error;
use crate::utils::generate_websocket_accept_value;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

/// Bounds on the inbound HTTP/1.1 upgrade request, so a peer that never sends a blank line
/// can't grow the header map without limit.
const MAX_HEADERS: usize = 256;
const MAX_LINE: usize = 4096;

/// Time budget for the entire handshake read. A connection that completes the TCP accept but
/// then goes silent shouldn't tie up a task forever.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

/// Reads an HTTP/1.1 upgrade request, validates it, and writes the 101 Switching Protocols
/// response. Leaves `stream` untouched on success so the caller can hand it straight to
/// `ConnectionProtocol`; on failure the caller is expected to drop the transport without
/// attempting a response.
pub async fn accept<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S) -> Result<(), Error> {
    let headers = timeout(HANDSHAKE_TIMEOUT, read_headers(stream)).await??;

    let key = headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(Error::NoSecWebsocketKey)?;
    let accept_value = generate_websocket_accept_value(key);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_value}\r\n\
         \r\n"
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}

/// Reads the request-line (discarded — method and target aren't inspected in this minimal
/// profile) followed by `name: value` header lines, terminated by a blank line.
async fn read_headers<S: AsyncRead + Unpin>(
    stream: &mut S,
) -> Result<HashMap<String, String>, Error> {
    read_line(stream).await?;

    let mut headers = HashMap::new();
    for _ in 0..MAX_HEADERS {
        let line = read_line(stream).await?;
        if line.is_empty() {
            return Ok(headers);
        }
        let (name, value) = line.split_once(':').ok_or(Error::MalformedHeaderLine)?;
        headers.insert(name.trim().to_lowercase(), value.trim().to_string());
    }
    Err(Error::TooManyHeaders)
}

/// Reads one CR-LF terminated line, stripping the terminator. Bounded at `MAX_LINE` bytes so
/// a peer can't stream an unbounded "line" to exhaust memory.
async fn read_line<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String, Error> {
    let mut buf = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == b'\n' {
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            break;
        }
        buf.push(byte);
        // +1: a trailing `\r` lands in `buf` one byte ahead of the `\n` that would strip it, so
        // the content-only bound (excluding the CRLF terminator) needs that much headroom here.
        if buf.len() > MAX_LINE + 1 {
            return Err(Error::HeaderLineTooLong);
        }
    }
    String::from_utf8(buf).map_err(|_| Error::MalformedHeaderLine)
}
