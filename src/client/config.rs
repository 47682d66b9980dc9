//! Client configuration

use std::time::Duration;

use crate::protocol::constants::RTMP_VERSION;
use crate::protocol::handshake::HandshakePacket;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub addr: String,

    /// Timeout for TCP connect, and separately for the handshake
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Version byte to send in C0
    pub version: u8,

    /// Fail if S2 does not echo our C1 (servers often get this wrong)
    pub verify_echo: bool,

    /// Send this C1 instead of a freshly generated one
    pub c1: Option<HandshakePacket>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            connect_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            version: RTMP_VERSION,
            verify_echo: false,
            c1: None,
        }
    }
}

impl ClientConfig {
    /// Create a new config for the given server address
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Require S2 to echo C1 exactly
    pub fn verify_echo(mut self, verify: bool) -> Self {
        self.verify_echo = verify;
        self
    }

    pub fn with_c1(mut self, c1: HandshakePacket) -> Self {
        self.c1 = Some(c1);
        self
    }
}
