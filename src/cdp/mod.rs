//! Chrome DevTools Protocol plumbing
//!
//! A minimal hand-rolled CDP stack:
//! - WebSocket transport with a reader thread (no tungstenite)
//! - Browser connection and per-target page sessions
//! - Hand-written serde types for the commands and events we use

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{CdpSession, Connection};
pub use transport::{find_chrome, launch_chrome, CdpMessage, Transport};
