//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent sessions (0 = unlimited)
    pub max_connections: usize,

    /// Handshake must complete within this time (None = wait forever)
    pub handshake_timeout: Option<Duration>,

    /// Reject clients whose C0 is not version 3
    pub strict_version: bool,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Initial capacity of the per-session read buffer
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, RTMP_PORT)),
            max_connections: 0, // Unlimited
            handshake_timeout: Some(Duration::from_secs(10)),
            strict_version: false,
            tcp_nodelay: true,
            read_buffer_size: 4096,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Listen on all interfaces at `port`
    pub fn with_port(port: u16) -> Self {
        Self::with_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Let a silent peer hold its session open indefinitely
    pub fn no_handshake_timeout(mut self) -> Self {
        self.handshake_timeout = None;
        self
    }

    /// Reject C0 versions other than 3
    pub fn strict_version(mut self, strict: bool) -> Self {
        self.strict_version = strict;
        self
    }

    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    /// Check the configuration before the acceptor starts
    pub fn validate(&self) -> Result<()> {
        if self.handshake_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("handshake timeout must be non-zero".into()));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::Config("read buffer size must be non-zero".into()));
        }
        Ok(())
    }
}
