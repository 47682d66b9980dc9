//! RTMP client handshake
//!
//! Performs the client half of the handshake against any RTMP server.

pub mod config;
pub mod connector;

pub use config::ClientConfig;
pub use connector::{ClientConnection, HandshakeConnector};
