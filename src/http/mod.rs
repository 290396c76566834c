//! HTTP/1.x protocol layer.
//!
//! # Architecture
//!
//! - **`buffer`**: Receive buffer the parser consumes lines and bodies from
//! - **`headers`**: Case-insensitive multi-valued header set
//! - **`parser`**: Resumable request parser fed with arbitrary byte chunks
//! - **`request`**: Parsed request and a builder for tests and tools
//! - **`response`**: Response under construction, head fixed once body bytes are written
//! - **`writer`**: Serializes and writes responses to the client
//! - **`connection`**: Per-connection state machine tying everything together
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! One request per connection; every path ends in `Closed`.
//!
//! ```text
//!   Accepted ─▶ Reading ─▶ Parsed ─▶ Routed ─▶ HandlerInvoked ─▶ Responding ─▶ Closed
//!                  │          │         │                             ▲
//!                  │          └─────────┴──▶ Erroring ────────────────┘
//!                  ├──────────────────────────▲
//!                  └─ idle timeout / EOF ──────────────────────────────────────▶ Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vhostd::http::connection::{Connection, ConnectionInfo, ConnectionSettings};
//! use vhostd::routing::Registry;
//! use vhostd::server::dispatcher::Dispatcher;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = Arc::new(Dispatcher::new(Registry::new()));
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     let (socket, peer) = listener.accept().await?;
//!     let info = ConnectionInfo::new(1, Some(peer));
//!     let mut conn = Connection::new(socket, info, dispatcher, ConnectionSettings::default());
//!     conn.run().await
//! }
//! ```

pub mod buffer;
pub mod connection;
pub mod headers;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
