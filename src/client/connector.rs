//! Client-side handshake
//!
//! Sends C0+C1, reads S0+S1+S2, answers with C2. Used to exercise servers
//! and as the first step of any RTMP client.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, HandshakeError, Result};
use crate::protocol::constants::*;
use crate::protocol::handshake::{current_timestamp, verify_echo, HandshakePacket};

use super::config::ClientConfig;

/// Client handshake connector
pub struct HandshakeConnector;

/// A client connection after a completed handshake
#[derive(Debug)]
pub struct ClientConnection<S> {
    /// The underlying stream, positioned after S2
    pub stream: S,
    /// Bytes the server sent after S2 that were already read
    pub buffered: Bytes,
    /// Version byte from S0
    pub server_version: u8,
    /// C1 as sent
    pub c1: HandshakePacket,
    /// S1 as received
    pub s1: HandshakePacket,
    /// S2 as received
    pub s2: HandshakePacket,
}

impl HandshakeConnector {
    /// Connect to a server and perform the handshake
    pub async fn connect(config: &ClientConfig) -> Result<ClientConnection<TcpStream>> {
        let socket = timeout(config.connect_timeout, TcpStream::connect(&config.addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Io)?;

        if config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Self::handshake(socket, config).await
    }

    /// Perform the client handshake over an existing stream
    pub async fn handshake<S>(mut stream: S, config: &ClientConfig) -> Result<ClientConnection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let c1 = config.c1.clone().unwrap_or_else(HandshakePacket::generate);

        timeout(config.connect_timeout, async {
            // C0 + C1
            let mut c0c1 = BytesMut::with_capacity(C0C1_SIZE);
            c0c1.put_u8(config.version);
            c0c1.put_slice(c1.as_bytes());
            stream.write_all(&c0c1).await?;
            stream.flush().await?;

            // S0 + S1 + S2
            let mut read_buf = BytesMut::with_capacity(4096);
            while read_buf.len() < S0S1S2_SIZE {
                let n = stream.read_buf(&mut read_buf).await?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
            }

            let server_version = read_buf.get_u8();
            if server_version < RTMP_VERSION {
                return Err(HandshakeError::InvalidVersion(server_version).into());
            }

            let s1 = HandshakePacket::from_slice(&read_buf.split_to(HANDSHAKE_SIZE))
                .ok_or(HandshakeError::InvalidState)?;
            let s2 = HandshakePacket::from_slice(&read_buf.split_to(HANDSHAKE_SIZE))
                .ok_or(HandshakeError::InvalidState)?;

            if let Err(e) = verify_echo(&c1, &s2) {
                if config.verify_echo {
                    return Err(e.into());
                }
                tracing::debug!(error = %e, "Server S2 does not echo C1, continuing");
            }

            // C2: Echo S1
            let c2 = HandshakePacket::echo_of(&s1, current_timestamp());
            stream.write_all(c2.as_bytes()).await?;
            stream.flush().await?;

            Ok::<_, Error>(ClientConnection {
                stream,
                buffered: read_buf.freeze(),
                server_version,
                c1,
                s1,
                s2,
            })
        })
        .await
        .map_err(|_| Error::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_client_against_scripted_server() {
        let (client_io, mut server) = duplex(16384);
        let c1 = HandshakePacket::new(1000, 0, &[0u8; RANDOM_SIZE]);
        let config = ClientConfig::default().verify_echo(true).with_c1(c1.clone());

        let server_task = tokio::spawn(async move {
            let mut c0c1 = vec![0u8; C0C1_SIZE];
            server.read_exact(&mut c0c1).await.unwrap();
            assert_eq!(c0c1[0], RTMP_VERSION);

            let c1 = HandshakePacket::from_slice(&c0c1[1..]).unwrap();
            let s1 = HandshakePacket::new(77, 0, &[9u8; RANDOM_SIZE]);
            let s2 = HandshakePacket::echo_of(&c1, 77);

            let mut out = vec![RTMP_VERSION];
            out.extend_from_slice(s1.as_bytes());
            out.extend_from_slice(s2.as_bytes());
            out.extend_from_slice(b"extra");
            server.write_all(&out).await.unwrap();

            let mut c2 = vec![0u8; C2_SIZE];
            server.read_exact(&mut c2).await.unwrap();
            let c2 = HandshakePacket::from_slice(&c2).unwrap();
            verify_echo(&s1, &c2).unwrap();
        });

        let conn = HandshakeConnector::handshake(client_io, &config).await.unwrap();
        assert_eq!(conn.server_version, RTMP_VERSION);
        assert_eq!(conn.s1.timestamp(), 77);
        assert_eq!(conn.s2.echo(), 77);
        assert_eq!(&conn.buffered[..], b"extra");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_strict_echo_rejects_bad_s2() {
        let (client_io, mut server) = duplex(16384);
        let config = ClientConfig::default().verify_echo(true);

        tokio::spawn(async move {
            let mut c0c1 = vec![0u8; C0C1_SIZE];
            server.read_exact(&mut c0c1).await.unwrap();

            // S2 that does not echo C1
            let junk = HandshakePacket::new(1, 0, &[1u8; RANDOM_SIZE]);
            let mut out = vec![RTMP_VERSION];
            out.extend_from_slice(junk.as_bytes());
            out.extend_from_slice(junk.as_bytes());
            server.write_all(&out).await.unwrap();
            server
        });

        let err = HandshakeConnector::handshake(client_io, &config)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_client_server_closes() {
        let (client_io, server) = duplex(16384);
        drop(server);

        let err = HandshakeConnector::handshake(client_io, &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
