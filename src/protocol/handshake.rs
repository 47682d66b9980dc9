//! RTMP handshake implementation (server side)
//!
//! The RTMP handshake consists of three phases:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |                                        |
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |                                        |
//!   |------- C2 (1536 bytes: echo S1) ----->|
//!   |                                        |
//!   |          [Handshake Complete]          |
//! ```
//!
//! This implementation uses the "simple" handshake (no HMAC digest). Unlike
//! lenient servers, C2 is verified: it must echo both the timestamp and the
//! random payload of S1.
//!
//! [`Handshake`] does no I/O. It consumes bytes from a buffer the caller
//! fills and returns the bytes to send; `server::session` drives it over a
//! socket.
//!
//! Reference: RTMP Specification Section 5.2

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

use crate::error::{HandshakeError, Result};
use crate::protocol::constants::*;

/// Progress of a server-side handshake
///
/// Stages only move forward: `AwaitingC0C1 -> AwaitingC2 -> Established`,
/// with `Failed` reachable from either waiting stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStage {
    /// Waiting for C0 + C1 (1537 bytes)
    AwaitingC0C1,
    /// S0 + S1 + S2 produced, waiting for C2 (1536 bytes)
    AwaitingC2,
    /// C2 validated
    Established,
    /// Validation failed; the connection must be torn down
    Failed,
}

impl HandshakeStage {
    /// Terminal stages accept no further input
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeStage::Established | HandshakeStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStage::AwaitingC0C1 => "awaiting_c0c1",
            HandshakeStage::AwaitingC2 => "awaiting_c2",
            HandshakeStage::Established => "established",
            HandshakeStage::Failed => "failed",
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One 1536-byte handshake packet (C1, S1, C2 or S2)
///
/// Format:
/// - Bytes 0-3: Timestamp
/// - Bytes 4-7: Zero (C1/S1) or timestamp echo (C2/S2)
/// - Bytes 8-1535: Random data
///
/// The packet keeps its raw bytes so a peer's packet can be echoed back
/// verbatim. Integers we write ourselves are big-endian.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    bytes: [u8; HANDSHAKE_SIZE],
}

impl HandshakePacket {
    /// Build a packet from its three fields
    pub fn new(timestamp: u32, echo: u32, random: &[u8; RANDOM_SIZE]) -> Self {
        let mut bytes = [0u8; HANDSHAKE_SIZE];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..8].copy_from_slice(&echo.to_be_bytes());
        bytes[RANDOM_OFFSET..].copy_from_slice(random);
        Self { bytes }
    }

    /// Generate a fresh C1/S1: current timestamp, zero field, random payload
    pub fn generate() -> Self {
        let mut bytes = [0u8; HANDSHAKE_SIZE];
        bytes[0..4].copy_from_slice(&current_timestamp().to_be_bytes());
        rand::thread_rng().fill_bytes(&mut bytes[RANDOM_OFFSET..]);
        Self { bytes }
    }

    /// Parse a packet from exactly [`HANDSHAKE_SIZE`] bytes
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; HANDSHAKE_SIZE] = data.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Build the echo of a peer packet (S2 for C1, C2 for S1)
    ///
    /// The peer's bytes are copied verbatim except bytes 4-7, which carry
    /// our own timestamp.
    pub fn echo_of(peer: &HandshakePacket, our_timestamp: u32) -> Self {
        let mut echo = peer.clone();
        echo.bytes[4..8].copy_from_slice(&our_timestamp.to_be_bytes());
        echo
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Bytes 4-7: zero in C1/S1, timestamp echo in C2/S2
    pub fn echo(&self) -> u32 {
        u32::from_be_bytes([self.bytes[4], self.bytes[5], self.bytes[6], self.bytes[7]])
    }

    pub fn random(&self) -> &[u8] {
        &self.bytes[RANDOM_OFFSET..]
    }

    pub fn as_bytes(&self) -> &[u8; HANDSHAKE_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for HandshakePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakePacket")
            .field("timestamp", &self.timestamp())
            .field("echo", &self.echo())
            .field("random_len", &RANDOM_SIZE)
            .finish()
    }
}

/// Check that `echo` replays the timestamp and random payload of `sent`
///
/// Used by the server to validate C2 against S1, and by the client to
/// validate S2 against C1.
pub fn verify_echo(
    sent: &HandshakePacket,
    echo: &HandshakePacket,
) -> std::result::Result<(), HandshakeError> {
    if echo.timestamp() != sent.timestamp() {
        return Err(HandshakeError::TimestampMismatch {
            expected: sent.timestamp(),
            actual: echo.timestamp(),
        });
    }

    if let Some(offset) = sent
        .random()
        .iter()
        .zip(echo.random())
        .position(|(a, b)| a != b)
    {
        return Err(HandshakeError::RandomMismatch { offset });
    }

    Ok(())
}

/// Server handshake state machine
#[derive(Debug)]
pub struct Handshake {
    stage: HandshakeStage,
    /// Reject C0 values other than [`RTMP_VERSION`]
    strict_version: bool,
    /// Version byte from C0
    client_version: Option<u8>,
    /// C1, echoed into S2
    client_packet: Option<HandshakePacket>,
    /// S1, which C2 must echo. Generated when C0C1 arrives unless preset.
    server_packet: Option<HandshakePacket>,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    /// Create a new server handshake in the `AwaitingC0C1` stage
    pub fn new() -> Self {
        Self {
            stage: HandshakeStage::AwaitingC0C1,
            strict_version: false,
            client_version: None,
            client_packet: None,
            server_packet: None,
        }
    }

    /// Create a handshake that answers with a predetermined S1
    pub fn with_server_packet(packet: HandshakePacket) -> Self {
        Self {
            server_packet: Some(packet),
            ..Self::new()
        }
    }

    /// Reject C0 versions other than 3 instead of accepting them
    pub fn strict_version(mut self, strict: bool) -> Self {
        self.strict_version = strict;
        self
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        self.stage == HandshakeStage::Established
    }

    pub fn client_version(&self) -> Option<u8> {
        self.client_version
    }

    pub fn client_packet(&self) -> Option<&HandshakePacket> {
        self.client_packet.as_ref()
    }

    pub fn server_packet(&self) -> Option<&HandshakePacket> {
        self.server_packet.as_ref()
    }

    /// Get bytes needed before next state transition
    pub fn bytes_needed(&self) -> usize {
        match self.stage {
            HandshakeStage::AwaitingC0C1 => C0C1_SIZE,
            HandshakeStage::AwaitingC2 => C2_SIZE,
            HandshakeStage::Established | HandshakeStage::Failed => 0,
        }
    }

    /// Process buffered input
    ///
    /// Consumes exactly one frame from the front of `buf` when enough bytes
    /// are buffered and leaves any excess in place.
    ///
    /// - `AwaitingC0C1` with 1537+ bytes: returns S0+S1+S2 (3073 bytes)
    /// - `AwaitingC2` with 1536+ bytes: validates C2, returns `None`
    /// - too few bytes: returns `None` without consuming anything
    pub fn process(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if self.stage.is_terminal() {
            return Err(HandshakeError::InvalidState.into());
        }
        if buf.len() < self.bytes_needed() {
            return Ok(None);
        }

        match self.stage {
            HandshakeStage::AwaitingC0C1 => {
                let c0c1 = buf.split_to(C0C1_SIZE);
                self.process_c0c1(&c0c1).map(Some)
            }
            HandshakeStage::AwaitingC2 => {
                let c2 = buf.split_to(C2_SIZE);
                self.process_c2(&c2)?;
                Ok(None)
            }
            HandshakeStage::Established | HandshakeStage::Failed => {
                Err(HandshakeError::InvalidState.into())
            }
        }
    }

    fn process_c0c1(&mut self, c0c1: &[u8]) -> Result<Bytes> {
        // C0: Version
        let version = c0c1[0];
        self.client_version = Some(version);
        if version != RTMP_VERSION && self.strict_version {
            self.stage = HandshakeStage::Failed;
            return Err(HandshakeError::InvalidVersion(version).into());
        }

        // C1
        let c1 = HandshakePacket::from_slice(&c0c1[VERSION_SIZE..])
            .ok_or(HandshakeError::InvalidState)?;

        let s1 = self
            .server_packet
            .get_or_insert_with(HandshakePacket::generate)
            .clone();

        // S2: Echo C1 stamped with our S1 timestamp
        let s2 = HandshakePacket::echo_of(&c1, s1.timestamp());
        self.client_packet = Some(c1);

        let mut response = BytesMut::with_capacity(S0S1S2_SIZE);
        response.put_u8(RTMP_VERSION);
        response.put_slice(s1.as_bytes());
        response.put_slice(s2.as_bytes());
        debug_assert_eq!(response.len(), S0S1S2_SIZE);

        self.stage = HandshakeStage::AwaitingC2;
        Ok(response.freeze())
    }

    fn process_c2(&mut self, data: &[u8]) -> Result<()> {
        let c2 = HandshakePacket::from_slice(data).ok_or(HandshakeError::InvalidState)?;
        let s1 = self
            .server_packet
            .as_ref()
            .ok_or(HandshakeError::InvalidState)?;

        if let Err(e) = verify_echo(s1, &c2) {
            self.stage = HandshakeStage::Failed;
            return Err(e.into());
        }

        self.stage = HandshakeStage::Established;
        Ok(())
    }
}

/// Milliseconds since the UNIX epoch, truncated to 32 bits
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn fixed_s1() -> HandshakePacket {
        let mut random = [0u8; RANDOM_SIZE];
        for (i, b) in random.iter_mut().enumerate() {
            *b = (i * 7 % 251) as u8;
        }
        HandshakePacket::new(0x0102_0304, 0, &random)
    }

    fn c0c1(version: u8, timestamp: u32) -> BytesMut {
        let mut buf = BytesMut::with_capacity(C0C1_SIZE);
        buf.put_u8(version);
        buf.put_slice(HandshakePacket::new(timestamp, 0, &[0u8; RANDOM_SIZE]).as_bytes());
        buf
    }

    /// Drive a handshake through C0C1 and return the S0S1S2 response
    fn respond(handshake: &mut Handshake) -> Bytes {
        let mut buf = c0c1(RTMP_VERSION, 1000);
        handshake.process(&mut buf).unwrap().expect("S0S1S2")
    }

    #[test]
    fn test_concrete_scenario() {
        let s1 = fixed_s1();
        let mut handshake = Handshake::with_server_packet(s1.clone());

        let response = respond(&mut handshake);
        assert_eq!(response.len(), S0S1S2_SIZE);
        assert_eq!(handshake.stage(), HandshakeStage::AwaitingC2);

        // S0
        assert_eq!(response[0], RTMP_VERSION);

        // S1
        let sent_s1 = HandshakePacket::from_slice(&response[1..1 + HANDSHAKE_SIZE]).unwrap();
        assert_eq!(sent_s1, s1);
        assert_eq!(sent_s1.echo(), 0);

        // S2 replays C1 with our timestamp in bytes 4-7
        let s2 = HandshakePacket::from_slice(&response[1 + HANDSHAKE_SIZE..]).unwrap();
        assert_eq!(s2.timestamp(), 1000);
        assert_eq!(s2.echo(), s1.timestamp());
        assert!(s2.random().iter().all(|&b| b == 0));

        // C2 echoes S1; bytes 4-7 are arbitrary
        let c2 = HandshakePacket::echo_of(&s1, 0xDEAD_BEEF);
        let mut buf = BytesMut::from(&c2.as_bytes()[..]);
        assert!(handshake.process(&mut buf).unwrap().is_none());
        assert!(handshake.is_done());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_generated_s1_accepts_exact_replay() {
        for _ in 0..500 {
            let mut handshake = Handshake::new();
            let response = respond(&mut handshake);

            let s1 = handshake.server_packet().unwrap().clone();
            assert_eq!(&response[1..1 + HANDSHAKE_SIZE], &s1.as_bytes()[..]);

            let mut buf = BytesMut::from(&s1.as_bytes()[..]);
            handshake.process(&mut buf).unwrap();
            assert_eq!(handshake.stage(), HandshakeStage::Established);
        }
    }

    #[test]
    fn test_random_bit_flip_fails() {
        let s1 = fixed_s1();
        let mut handshake = Handshake::with_server_packet(s1.clone());
        respond(&mut handshake);

        let mut c2 = *s1.as_bytes();
        c2[HANDSHAKE_SIZE - 1] ^= 0x01;
        let mut buf = BytesMut::from(&c2[..]);

        let err = handshake.process(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::RandomMismatch { offset }) if offset == RANDOM_SIZE - 1
        ));
        assert_eq!(handshake.stage(), HandshakeStage::Failed);
        assert!(!handshake.is_done());
    }

    #[test]
    fn test_timestamp_mismatch_fails() {
        let s1 = fixed_s1();
        let mut handshake = Handshake::with_server_packet(s1.clone());
        respond(&mut handshake);

        let mut random = [0u8; RANDOM_SIZE];
        random.copy_from_slice(s1.random());
        let c2 = HandshakePacket::new(s1.timestamp().wrapping_add(1), 0, &random);
        let mut buf = BytesMut::from(&c2.as_bytes()[..]);

        let err = handshake.process(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::TimestampMismatch { .. })
        ));
        assert_eq!(handshake.stage(), HandshakeStage::Failed);
    }

    #[test]
    fn test_partial_input_is_not_consumed() {
        let mut handshake = Handshake::new();
        let full = c0c1(RTMP_VERSION, 1);

        let mut buf = BytesMut::from(&full[..C0C1_SIZE - 1]);
        assert!(handshake.process(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), C0C1_SIZE - 1);
        assert_eq!(handshake.stage(), HandshakeStage::AwaitingC0C1);

        buf.put_u8(full[C0C1_SIZE - 1]);
        assert!(handshake.process(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_excess_bytes_left_in_buffer() {
        let s1 = fixed_s1();
        let mut handshake = Handshake::with_server_packet(s1.clone());
        respond(&mut handshake);

        let mut buf = BytesMut::from(&s1.as_bytes()[..]);
        buf.put_slice(b"\x03rest");
        handshake.process(&mut buf).unwrap();
        assert!(handshake.is_done());
        assert_eq!(&buf[..], b"\x03rest");
    }

    #[test]
    fn test_permissive_version() {
        let mut handshake = Handshake::new();
        let mut buf = c0c1(6, 1);
        let response = handshake.process(&mut buf).unwrap().unwrap();

        assert_eq!(handshake.client_version(), Some(6));
        // We always answer with version 3
        assert_eq!(response[0], RTMP_VERSION);
    }

    #[test]
    fn test_strict_version() {
        let mut handshake = Handshake::new().strict_version(true);
        let mut buf = c0c1(6, 1);

        let err = handshake.process(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::InvalidVersion(6))
        ));
        assert_eq!(handshake.stage(), HandshakeStage::Failed);

        let mut handshake = Handshake::new().strict_version(true);
        let mut buf = c0c1(RTMP_VERSION, 1);
        assert!(handshake.process(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_terminal_stage_rejects_input() {
        let s1 = fixed_s1();
        let mut handshake = Handshake::with_server_packet(s1.clone());
        respond(&mut handshake);
        let mut buf = BytesMut::from(&s1.as_bytes()[..]);
        handshake.process(&mut buf).unwrap();

        assert!(handshake.stage().is_terminal());

        // Even an empty buffer is refused once terminal
        let mut buf = BytesMut::new();
        assert!(matches!(
            handshake.process(&mut buf),
            Err(Error::Handshake(HandshakeError::InvalidState))
        ));

        let mut buf = BytesMut::from(&s1.as_bytes()[..]);
        assert!(matches!(
            handshake.process(&mut buf),
            Err(Error::Handshake(HandshakeError::InvalidState))
        ));
        assert_eq!(buf.len(), HANDSHAKE_SIZE);
    }

    #[test]
    fn test_stage_is_terminal() {
        assert!(!HandshakeStage::AwaitingC0C1.is_terminal());
        assert!(!HandshakeStage::AwaitingC2.is_terminal());
        assert!(HandshakeStage::Established.is_terminal());
        assert!(HandshakeStage::Failed.is_terminal());
    }

    #[test]
    fn test_bytes_needed() {
        let mut handshake = Handshake::new();
        assert_eq!(handshake.bytes_needed(), 1537);
        respond(&mut handshake);
        assert_eq!(handshake.bytes_needed(), 1536);
    }

    #[test]
    fn test_sessions_share_no_state() {
        let mut a = Handshake::new();
        let mut b = Handshake::new();
        respond(&mut a);
        respond(&mut b);

        let s1_a = a.server_packet().unwrap().clone();
        let s1_b = b.server_packet().unwrap().clone();
        assert_ne!(s1_a.random(), s1_b.random());

        // Each session only accepts its own S1
        let mut buf = BytesMut::from(&s1_b.as_bytes()[..]);
        assert!(a.process(&mut buf).is_err());
        let mut buf = BytesMut::from(&s1_b.as_bytes()[..]);
        b.process(&mut buf).unwrap();
        assert!(b.is_done());
    }

    #[test]
    fn test_packet_generation() {
        let packet = HandshakePacket::generate();
        assert!(packet.timestamp() > 0);
        assert_eq!(packet.echo(), 0);
        assert_eq!(packet.random().len(), RANDOM_SIZE);
    }

    #[test]
    fn test_echo_of_preserves_peer_bytes() {
        let mut raw = [0xAAu8; HANDSHAKE_SIZE];
        raw[0..4].copy_from_slice(&[1, 2, 3, 4]);
        let peer = HandshakePacket::from_slice(&raw).unwrap();

        let echo = HandshakePacket::echo_of(&peer, 77);
        assert_eq!(&echo.as_bytes()[0..4], &[1, 2, 3, 4]);
        assert_eq!(echo.echo(), 77);
        assert_eq!(echo.random(), peer.random());
    }

    #[test]
    fn test_own_fields_are_big_endian() {
        let packet = HandshakePacket::new(0x0102_0304, 0, &[0u8; RANDOM_SIZE]);
        assert_eq!(&packet.as_bytes()[0..8], &[1, 2, 3, 4, 0, 0, 0, 0]);

        let echo = HandshakePacket::echo_of(&packet, 0x0A0B_0C0D);
        assert_eq!(&echo.as_bytes()[4..8], &[0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(HandshakePacket::from_slice(&[0u8; HANDSHAKE_SIZE - 1]).is_none());
        assert!(HandshakePacket::from_slice(&[0u8; HANDSHAKE_SIZE + 1]).is_none());
    }
}
