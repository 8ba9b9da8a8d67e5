//! Core types for canvas-bridge.
//!
//! This crate provides the protocol primitives shared by the bridge and its
//! peers: wire frames, the challenge-response handshake, and catalog
//! snapshots. It performs no I/O.

mod auth;
mod catalog;
mod message;

pub use auth::{AuthError, Nonce, SharedSecret, NONCE_LEN};
pub use catalog::{Catalog, ComponentDescriptor, StyleDescriptor};
pub use message::{BridgeMessage, Command, OutboundFrame, PeerMessage, ProtocolError};

/// How long a fresh connection has to answer the challenge.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Default time a command waits for its reply.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// WebSocket close codes used by the bridge.
pub mod close_code {
    /// A newer connection completed the handshake and took over.
    pub const DISPLACED: u16 = 4000;
    /// The handshake response carried the wrong hash.
    pub const INVALID_HANDSHAKE: u16 = 4001;
    /// No handshake response arrived in time.
    pub const HANDSHAKE_TIMEOUT: u16 = 4002;
}
