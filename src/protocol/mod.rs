//! RTMP wire protocol implementation
//!
//! This module handles the low-level handshake details:
//! - Frame sizes and the protocol version
//! - C1/S1/C2/S2 packet layout
//! - The server handshake state machine

pub mod constants;
pub mod handshake;

pub use handshake::{verify_echo, Handshake, HandshakePacket, HandshakeStage};
