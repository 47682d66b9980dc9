//! RTMP handshake server
//!
//! This module provides the server-side handshake:
//! - TCP acceptor spawning one session per connection
//! - Per-connection handshake session
//! - Handler trait for the post-handshake handoff

pub mod config;
pub mod handler;
pub mod listener;
pub mod session;

pub use config::ServerConfig;
pub use handler::{HandshakeHandler, LoggingHandler};
pub use listener::ConnectionAcceptor;
pub use session::HandshakeSession;
