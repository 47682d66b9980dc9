//! rtmp-handshake: async server-side RTMP handshake
//!
//! This library negotiates the RTMP handshake (C0/C1, S0/S1/S2, C2) and
//! hands established connections to an application layer:
//! - Sans-IO handshake state machine with strict C2 validation
//! - Per-connection sessions that tolerate partial reads
//! - Acceptor that spawns one session per TCP connection
//! - Handoff of the live stream plus any bytes read past C2
//!
//! # Example: Simple Server
//!
//! ```no_run
//! use rtmp_handshake::{ConnectionAcceptor, EstablishedConnection, HandshakeHandler, ServerConfig};
//! use tokio::net::TcpStream;
//!
//! struct MyHandler;
//!
//! #[async_trait::async_trait]
//! impl HandshakeHandler for MyHandler {
//!     async fn on_established(&self, conn: EstablishedConnection<TcpStream>) {
//!         println!("Handshake done: {}", conn.context().peer_addr);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let acceptor = ConnectionAcceptor::new(ServerConfig::with_port(1935), MyHandler);
//!     acceptor.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;

// Re-export main types for convenience
pub use client::{ClientConfig, ClientConnection, HandshakeConnector};
pub use error::{Error, HandshakeError, Result};
pub use protocol::{Handshake, HandshakePacket, HandshakeStage};
pub use server::config::ServerConfig;
pub use server::handler::{HandshakeHandler, LoggingHandler};
pub use server::listener::ConnectionAcceptor;
pub use server::session::HandshakeSession;
pub use session::{EstablishedConnection, SessionContext};
pub use stats::{ServerStats, ServerStatsSnapshot};
