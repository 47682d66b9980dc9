//! RTMP handshake constants
//!
//! Reference: Adobe RTMP Specification (December 2012), section 5.2

/// RTMP version number (always 3 for standard RTMP)
pub const RTMP_VERSION: u8 = 3;

/// Default RTMP port
pub const RTMP_PORT: u16 = 1935;

/// Size of C1/S1/C2/S2
pub const HANDSHAKE_SIZE: usize = 1536;

/// Size of the version byte (C0/S0)
pub const VERSION_SIZE: usize = 1;

/// Offset of the random field inside C1/S1/C2/S2
pub const RANDOM_OFFSET: usize = 8;

/// Length of the random field
pub const RANDOM_SIZE: usize = HANDSHAKE_SIZE - RANDOM_OFFSET; // 1528

/// C0 + C1, read by the server in one stage
pub const C0C1_SIZE: usize = VERSION_SIZE + HANDSHAKE_SIZE; // 1537

/// S0 + S1 + S2, written by the server as one buffer
pub const S0S1S2_SIZE: usize = VERSION_SIZE + HANDSHAKE_SIZE * 2; // 3073

/// C2, the client's echo of S1
pub const C2_SIZE: usize = HANDSHAKE_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(RANDOM_SIZE, 1528);
        assert_eq!(C0C1_SIZE, 1537);
        assert_eq!(S0S1S2_SIZE, 3073);
        assert_eq!(C2_SIZE, 1536);
    }
}
