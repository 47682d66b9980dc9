//! Handshake handler trait
//!
//! The extension point for applications built on top of the handshake.
//! Implement this trait to filter connections, observe failures, and take
//! over established connections.

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::Error;
use crate::session::{EstablishedConnection, SessionContext};

/// Handler trait for handshake servers
///
/// All methods have default implementations: every connection is admitted,
/// failures and disconnects are ignored, and established connections are
/// closed.
///
/// # Example
///
/// ```ignore
/// use rtmp_handshake::{EstablishedConnection, HandshakeHandler};
/// use tokio::net::TcpStream;
///
/// struct ChunkStreamHandoff;
///
/// #[async_trait::async_trait]
/// impl HandshakeHandler for ChunkStreamHandoff {
///     async fn on_established(&self, conn: EstablishedConnection<TcpStream>) {
///         // Read chunk stream data from `conn`; leftover handshake bytes
///         // are replayed first.
///     }
/// }
/// ```
#[async_trait]
pub trait HandshakeHandler: Send + Sync + 'static {
    /// Called when a new TCP connection is accepted, before any read
    ///
    /// Return false to immediately close the connection.
    /// Use this for IP-based rate limiting or blocklists.
    async fn on_connection(&self, _ctx: &SessionContext) -> bool {
        true
    }

    /// Called once C2 validates; the handler owns the connection from here
    ///
    /// Dropping `conn` closes the socket.
    async fn on_established(&self, conn: EstablishedConnection<TcpStream>) {
        tracing::debug!(
            session_id = conn.context().session_id,
            "No application layer, closing established connection"
        );
    }

    /// Called when a handshake fails (transport or validation)
    async fn on_failed(&self, _ctx: &SessionContext, _error: &Error) {}

    /// Called after the server closed a connection it still owned
    ///
    /// Fires for rejected and failed connections. Established connections
    /// belong to the handler and are not reported here.
    async fn on_disconnect(&self, _ctx: &SessionContext) {}
}

/// A simple handler that accepts all connections and logs events
pub struct LoggingHandler;

#[async_trait]
impl HandshakeHandler for LoggingHandler {
    async fn on_connection(&self, ctx: &SessionContext) -> bool {
        tracing::info!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            "New connection"
        );
        true
    }

    async fn on_established(&self, conn: EstablishedConnection<TcpStream>) {
        let ctx = conn.context();
        tracing::info!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            client_version = ?ctx.client_version,
            buffered = conn.buffered().len(),
            "Handshake ok"
        );
    }

    async fn on_failed(&self, ctx: &SessionContext, error: &Error) {
        tracing::info!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            stage = %ctx.stage,
            error = %error,
            "Handshake failed"
        );
    }

    async fn on_disconnect(&self, ctx: &SessionContext) {
        tracing::info!(
            session_id = ctx.session_id,
            bytes_received = ctx.stats.bytes_received,
            "Connection closed"
        );
    }
}
