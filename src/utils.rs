use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use uuid::Uuid;

pub(crate) const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes `base64(sha1(key || GUID))`, the `Sec-WebSocket-Accept` value for `key`.
pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Generates an identity for a newly-accepted connection, used as the live-set key.
pub(crate) fn generate_connection_id() -> Uuid {
    Uuid::new_v4()
}
