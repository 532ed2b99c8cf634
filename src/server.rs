use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, ConnectionId, ConnectionProtocol, Registry};
use crate::error::CloseCode;
use crate::handler::HandlerFactory;
use crate::handshake;
use crate::message::Message;
use log::{error, info, warn};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A running WebSocket server: one task accepting connections, one task per accepted connection
/// running its `Handler`, and a live-connection registry used to fan a shutdown out across all
/// of them.
pub struct Server {
    config: ServerConfig,
    registry: Registry,
}

impl Server {
    /// Binds `config.host:config.port` and spawns the accept loop, which hands every accepted
    /// connection a fresh `Handler` built from `factory` and drives it to completion on its own
    /// task. Returns once the listener is bound; the accept loop keeps running in the background
    /// until `close` is called.
    pub async fn bind<F>(config: ServerConfig, factory: F) -> io::Result<Self>
    where
        F: HandlerFactory + 'static,
    {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let web_socket_config = config.web_socket_config.clone();

        info!("listening on {}", local_addr);

        let loop_registry = registry.clone();
        tokio::spawn(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("accept failed: {}", err);
                        continue;
                    }
                };

                let registry = loop_registry.clone();
                let web_socket_config = web_socket_config.clone();
                let handler = factory.build();

                tokio::spawn(async move {
                    run_connection(stream, peer_addr, web_socket_config, registry, handler).await;
                });
            }
        });

        Ok(Server {
            config: ServerConfig { port: local_addr.port(), ..config },
            registry,
        })
    }

    /// The address the listener is bound to, including the OS-assigned port when `config.port`
    /// was 0.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The number of connections currently in the live set.
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Closes every live connection with `GoingAway`, concurrently, and waits for each to finish
    /// tearing down. The server is fully stopped once this returns: the live set is empty and the
    /// accept loop, having no more work to hand off, is left running only to reject or immediately
    /// close whatever connects afterward — callers that also want to stop accepting new
    /// connections should drop the `Server` after this resolves.
    pub async fn close(&self, reason: Option<String>) {
        let handles: Vec<ConnectionHandle> = self.registry.lock().await.values().cloned().collect();
        info!("closing {} connection(s)", handles.len());

        let closes = handles.into_iter().map(|handle| {
            let reason = reason.clone();
            async move {
                let _ = handle.close(Some(CloseCode::GoingAway), reason).await;
            }
        });
        futures::future::join_all(closes).await;
    }
}

async fn run_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    web_socket_config: crate::config::WebSocketConfig,
    registry: Registry,
    mut handler: impl crate::handler::Handler,
) {
    let mut stream = stream;
    if let Err(err) = handshake::accept(&mut stream).await {
        warn!("handshake with {} failed: {}", peer_addr, err);
        return;
    }

    let (mut connection, handle) = ConnectionProtocol::new(stream, web_socket_config, registry.clone());
    let id: ConnectionId = connection.id();
    registry.lock().await.insert(id, handle.clone());
    info!("{} connected from {}", id, peer_addr);

    handler.on_connect(&handle).await;

    let (close_code, close_reason) = loop {
        match connection.recv().await {
            Ok(Message::Close { code, reason }) => break (code, reason),
            Ok(message) => {
                if handle.status().await == crate::connection::ConnectionStatus::Open {
                    handler.recv(&handle, message).await;
                }
            }
            Err(err) => {
                error!("{} protocol error: {}", id, err);
                connection.fail(&err).await;
                break (err.to_close_code().map(CloseCode::as_u16), None);
            }
        }
    };

    info!("{} disconnected", id);
    handler.on_close(&handle, close_code, close_reason).await;
}
