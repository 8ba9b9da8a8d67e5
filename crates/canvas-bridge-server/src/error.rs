//! Bridge failure taxonomy.

use std::time::Duration;

/// Everything that can go wrong between a caller and the peer.
///
/// Handshake variants end the offending connection only. Command-level
/// variants are delivered to the one pending request they concern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("peer did not complete the handshake in time")]
    HandshakeTimeout,
    #[error("peer sent an invalid handshake response")]
    HandshakeInvalid,
    #[error("no peer is connected; open the plugin and let it connect first")]
    NotConnected,
    #[error("command {command} timed out after {}ms", timeout.as_millis())]
    RequestTimeout { command: String, timeout: Duration },
    #[error("{0}")]
    RemoteError(String),
    #[error("malformed frame: {0}")]
    ProtocolParse(String),
    #[error("peer disconnected before replying")]
    PeerDisconnected,
}

impl From<canvas_bridge_core::ProtocolError> for BridgeError {
    fn from(err: canvas_bridge_core::ProtocolError) -> Self {
        Self::ProtocolParse(err.to_string())
    }
}
