use crate::connection::ConnectionHandle;
use crate::message::Message;
use async_trait::async_trait;

/// Application contract for a single accepted connection. The server drives exactly one
/// `Handler` instance per connection, calling `on_connect` once, `recv` for every inbound data
/// message and `on_close` exactly once when the connection's loop ends, however it ended.
///
/// Implementations are free to hold onto the `ConnectionHandle` they're given (in `on_connect`
/// or each `recv` call) to send messages back or initiate a close from application logic.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Called once the handshake has completed and the connection is registered with the
    /// server. The default implementation does nothing.
    async fn on_connect(&mut self, connection: &ConnectionHandle) {
        let _ = connection;
    }

    /// Called for every TEXT, BINARY, PING or PONG message the assembler produces while the
    /// connection is `Open`. CLOSE is handled by the connection state machine itself and never
    /// reaches this method — see `on_close`.
    async fn recv(&mut self, connection: &ConnectionHandle, message: Message);

    /// Called exactly once, after the connection's receive loop has exited for any reason: a
    /// peer-initiated close, an application-initiated close, or a protocol/I/O error. `code` and
    /// `reason` are `None` when the connection ended without a CLOSE frame ever being decoded.
    async fn on_close(&mut self, connection: &ConnectionHandle, code: Option<u16>, reason: Option<String>) {
        let _ = (connection, code, reason);
    }
}

/// Builds one `Handler` per accepted connection. The server calls this once per connection
/// rather than sharing a single `Handler` instance, so implementations don't need interior
/// mutability to keep per-connection state.
pub trait HandlerFactory: Send + Sync {
    type Handler: Handler + 'static;

    fn build(&self) -> Self::Handler;
}

impl<F, H> HandlerFactory for F
where
    F: Fn() -> H + Send + Sync,
    H: Handler + 'static,
{
    type Handler = H;

    fn build(&self) -> H {
        self()
    }
}
