//! Handler context
//!
//! Context passed to handler callbacks containing session information.

use std::net::SocketAddr;

use crate::protocol::handshake::HandshakeStage;
use crate::stats::SessionStats;

/// Context passed to HandshakeHandler callbacks
///
/// Provides read-only access to session information.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Version byte the client sent in C0 (once received)
    pub client_version: Option<u8>,

    /// Handshake stage reached
    pub stage: HandshakeStage,

    /// Stage in progress when the handshake failed
    pub failed_at: Option<HandshakeStage>,

    /// Current session statistics
    pub stats: SessionStats,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            client_version: None,
            stage: HandshakeStage::AwaitingC0C1,
            failed_at: None,
            stats: SessionStats::default(),
        }
    }

    /// Check if the handshake completed
    pub fn is_established(&self) -> bool {
        self.stage == HandshakeStage::Established
    }
}
