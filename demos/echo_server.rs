use async_trait::async_trait;
use log::*;
use socket_flow::config::ServerConfig;
use socket_flow::connection::ConnectionHandle;
use socket_flow::handler::Handler;
use socket_flow::message::Message;
use socket_flow::server::Server;

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn recv(&mut self, connection: &ConnectionHandle, message: Message) {
        let result = match message {
            Message::Text(text) => connection.send_text(text).await,
            Message::Binary(data) => connection.send_binary(data).await,
            Message::Ping(data) => connection.send_binary(data).await,
            Message::Pong(_) | Message::Close { .. } => Ok(()),
        };
        if let Err(err) = result {
            error!("failed to echo message: {}", err);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = ServerConfig {
        port: 9002,
        ..ServerConfig::default()
    };

    let server = Server::bind(config, || EchoHandler)
        .await
        .expect("failed to bind");
    info!("listening on {}:{}", server.config().host, server.config().port);

    // Keep the process alive; the accept loop runs on its own task.
    std::future::pending::<()>().await;
}
