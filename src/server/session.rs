//! Per-connection handshake session
//!
//! Drives one client connection through the handshake:
//! 1. Read C0 + C1 (1537 bytes)
//! 2. Write S0 + S1 + S2 (3073 bytes, one buffer)
//! 3. Read C2 (1536 bytes) and validate it against S1
//! 4. Hand the connection off, or tear it down
//!
//! Reads may return any number of bytes. Everything read is appended to one
//! buffer and the handshake consumes exactly one frame at a time from its
//! front, so bytes that arrive early are kept for the next stage and bytes
//! sent after C2 end up in the handoff.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{Error, HandshakeError, Result};
use crate::protocol::constants::RTMP_VERSION;
use crate::protocol::handshake::{Handshake, HandshakeStage};
use crate::server::config::ServerConfig;
use crate::session::{EstablishedConnection, SessionContext};

/// Server side of one handshake
pub struct HandshakeSession<S> {
    /// Session context for callbacks
    context: SessionContext,

    stream: S,

    /// Bytes read but not yet consumed by the handshake
    read_buf: BytesMut,

    handshake: Handshake,

    handshake_timeout: Option<Duration>,
}

impl<S> HandshakeSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new session that owns `stream`
    pub fn new(session_id: u64, stream: S, peer_addr: SocketAddr, config: &ServerConfig) -> Self {
        Self {
            context: SessionContext::new(session_id, peer_addr),
            stream,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            handshake: Handshake::new().strict_version(config.strict_version),
            handshake_timeout: config.handshake_timeout,
        }
    }

    /// Replace the handshake state machine (e.g. one with a preset S1)
    pub fn with_handshake(mut self, handshake: Handshake) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn stage(&self) -> HandshakeStage {
        self.context.stage
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Run the handshake to completion
    ///
    /// On success the session is `Established` and
    /// [`into_established`](Self::into_established) yields the handoff. On
    /// error the session is `Failed` and should be dropped, which closes the
    /// stream. There is no retry.
    pub async fn run(&mut self) -> Result<()> {
        let started = Instant::now();
        let session_id = self.context.session_id;

        let result = match self.handshake_timeout {
            Some(limit) => match timeout(limit, self.drive()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            },
            None => self.drive().await,
        };

        self.context.stats.duration = started.elapsed();

        match result {
            Ok(()) => {
                tracing::debug!(
                    session_id = session_id,
                    peer = %self.context.peer_addr,
                    elapsed_ms = self.context.stats.duration.as_millis() as u64,
                    "Handshake complete"
                );
                Ok(())
            }
            Err(e) => {
                let stage = self.context.stage;
                self.context.client_version = self.handshake.client_version();
                self.context.failed_at = Some(stage);
                self.context.stage = HandshakeStage::Failed;

                if e.is_validation() {
                    tracing::warn!(
                        session_id = session_id,
                        peer = %self.context.peer_addr,
                        stage = %stage,
                        error = %e,
                        "Handshake rejected"
                    );
                } else {
                    tracing::debug!(
                        session_id = session_id,
                        peer = %self.context.peer_addr,
                        stage = %stage,
                        error = %e,
                        "Handshake aborted"
                    );
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<()> {
        let session_id = self.context.session_id;

        loop {
            if let Some(response) = self.handshake.process(&mut self.read_buf)? {
                self.on_c0c1();

                // S0 + S1 + S2 as a single buffer
                self.stream.write_all(&response).await?;
                self.stream.flush().await?;
                self.context.stats.add_sent(response.len());

                tracing::trace!(
                    session_id = session_id,
                    bytes = response.len(),
                    s1_timestamp = ?self.handshake.server_packet().map(|p| p.timestamp()),
                    "Sent S0S1S2"
                );
                self.context.stage = self.handshake.stage();
                continue;
            }

            if self.handshake.is_done() {
                self.context.stage = HandshakeStage::Established;
                return Ok(());
            }

            let needed = self.handshake.bytes_needed();
            self.read_buf.reserve(needed.saturating_sub(self.read_buf.len()));

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.context.stats.add_received(n);
        }
    }

    fn on_c0c1(&mut self) {
        let version = self.handshake.client_version();
        self.context.client_version = version;

        if let Some(c1) = self.handshake.client_packet() {
            tracing::trace!(
                session_id = self.context.session_id,
                client_version = ?version,
                client_timestamp = c1.timestamp(),
                client_zero = c1.echo(),
                "Received C0C1"
            );
        }

        // Non-strict mode accepts any version but makes it visible
        if let Some(v) = version.filter(|&v| v != RTMP_VERSION) {
            tracing::warn!(
                session_id = self.context.session_id,
                peer = %self.context.peer_addr,
                version = v,
                "Client sent unexpected RTMP version, continuing"
            );
        }
    }

    /// Hand off an established session
    ///
    /// Bytes the client sent after C2 that were already read travel with
    /// the connection.
    pub fn into_established(self) -> Result<EstablishedConnection<S>> {
        if !self.handshake.is_done() {
            return Err(HandshakeError::InvalidState.into());
        }
        Ok(EstablishedConnection::new(
            self.stream,
            self.read_buf.freeze(),
            self.context,
        ))
    }
}
