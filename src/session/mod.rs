//! Handshake session state
//!
//! Context passed to handlers and the value handed off once a
//! handshake reaches `Established`.

pub mod context;
pub mod established;

pub use context::SessionContext;
pub use established::EstablishedConnection;
