//! Connection acceptor
//!
//! Handles the TCP accept loop and spawns one handshake session per
//! connection. The next accept is issued as soon as the session task is
//! spawned, so a slow handshake never starves the listen queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::server::config::ServerConfig;
use crate::server::handler::HandshakeHandler;
use crate::server::session::HandshakeSession;
use crate::stats::ServerStats;

/// Accepts TCP connections and runs a handshake on each
pub struct ConnectionAcceptor<H: HandshakeHandler> {
    config: ServerConfig,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<H: HandshakeHandler> ConnectionAcceptor<H> {
    /// Create a new acceptor with the given configuration and handler
    pub fn new(config: ServerConfig, handler: H) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Bind the configured address and serve forever
    ///
    /// The port comes from the config; see [`ServerConfig::with_port`] or
    /// [`ConnectionAcceptor::run_on_port`]. Returns only if binding fails.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve forever on `0.0.0.0:port`, ignoring the configured address
    pub async fn run_on_port(&self, port: u16) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = self.bind_to(addr).await?;
        self.serve(listener).await
    }

    /// Validate the configuration and bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        self.bind_to(self.config.bind_addr).await
    }

    async fn bind_to(&self, addr: SocketAddr) -> Result<TcpListener> {
        self.config.validate()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        tracing::info!(addr = %addr, "RTMP handshake server listening");
        Ok(listener)
    }

    /// Run the acceptor until `shutdown` resolves
    ///
    /// Sessions already spawned keep running to completion.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections on an already bound listener
    ///
    /// Accept errors are logged and the loop keeps going.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        self.stats.on_accept();

        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.stats.on_reject();
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(session_id = session_id, error = %e, "Failed to configure socket");
            self.stats.on_reject();
            return;
        }

        let session = HandshakeSession::new(session_id, socket, peer_addr, &self.config);
        let handler = Arc::clone(&self.handler);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let _permit = permit;
            run_session(session, handler, stats).await;
            tracing::trace!(session_id = session_id, "Session task finished");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Server-wide statistics
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Drive one session and route its outcome to the handler
async fn run_session<H: HandshakeHandler>(
    mut session: HandshakeSession<TcpStream>,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
) {
    if !handler.on_connection(session.context()).await {
        tracing::debug!(
            session_id = session.context().session_id,
            "Connection rejected by handler"
        );
        stats.on_reject();
        let ctx = session.context().clone();
        drop(session);
        handler.on_disconnect(&ctx).await;
        return;
    }

    stats.on_session_start();
    let result = session.run().await;
    stats.on_close();

    match result {
        Ok(()) => match session.into_established() {
            Ok(conn) => {
                stats.on_established();
                handler.on_established(conn).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Session finished without reaching Established");
            }
        },
        Err(e) => {
            if e.is_validation() {
                stats.on_validation_failure();
            } else {
                stats.on_transport_failure();
            }
            handler.on_failed(session.context(), &e).await;

            let ctx = session.context().clone();
            drop(session);
            handler.on_disconnect(&ctx).await;
        }
    }
}
