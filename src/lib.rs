//! Async WebSocket server core for the Tokio stack.
//!
//! Wraps a Tokio `TcpStream` with the server-side half of the [WebSocket Protocol
//! RFC](https://datatracker.ietf.org/doc/html/rfc6455): the HTTP/1.1 upgrade handshake, frame
//! parsing and masking, fragmentation reassembly, and a per-connection close handshake, all
//! driven by a small [`Handler`](handler::Handler) trait the application implements.

mod assembler;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod message;
pub mod server;
mod utils;
