//! Protocol messages.
//!
//! Control frames are tagged by `type`. Commands and their replies are
//! correlated by `id`; a reply carries `type` only when it reports an error.

use crate::Catalog;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control messages sent from bridge to peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Sent once, right after the socket opens.
    HandshakeChallenge { nonce: String },
    /// The peer's answer was correct; command traffic may begin.
    HandshakeOk,
    /// The peer sent something other than a handshake response too early.
    HandshakeRequired { message: String },
}

/// A command for the peer to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub params: Value,
}

/// Anything the bridge writes to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Control(BridgeMessage),
    Command(Command),
}

impl OutboundFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<BridgeMessage> for OutboundFrame {
    fn from(msg: BridgeMessage) -> Self {
        Self::Control(msg)
    }
}

impl From<Command> for OutboundFrame {
    fn from(cmd: Command) -> Self {
        Self::Command(cmd)
    }
}

/// Messages sent from peer to bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PeerFrame", into = "PeerFrame")]
pub enum PeerMessage {
    HandshakeResponse { hash: String },
    /// Unsolicited snapshot; never correlated.
    CatalogUpdate(Catalog),
    /// Outcome of the command with the same `id`.
    Reply {
        id: String,
        outcome: Result<Value, String>,
    },
}

impl PeerMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self::Reply {
            id: id.into(),
            outcome: Ok(result),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reply {
            id: id.into(),
            outcome: Err(message.into()),
        }
    }
}

/// Wire representation of [`PeerMessage`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PeerFrame {
    Tagged(TaggedPeerFrame),
    Success {
        id: String,
        #[serde(default)]
        result: Value,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedPeerFrame {
    HandshakeResponse {
        hash: String,
    },
    CatalogUpdate {
        catalog: Catalog,
    },
    Error {
        id: String,
        #[serde(default)]
        error: Value,
    },
}

impl From<PeerFrame> for PeerMessage {
    fn from(frame: PeerFrame) -> Self {
        match frame {
            PeerFrame::Tagged(TaggedPeerFrame::HandshakeResponse { hash }) => {
                Self::HandshakeResponse { hash }
            }
            PeerFrame::Tagged(TaggedPeerFrame::CatalogUpdate { catalog }) => {
                Self::CatalogUpdate(catalog)
            }
            PeerFrame::Tagged(TaggedPeerFrame::Error { id, error }) => Self::Reply {
                id,
                outcome: Err(error_text(error)),
            },
            PeerFrame::Success { id, result } => Self::Reply {
                id,
                outcome: Ok(result),
            },
        }
    }
}

impl From<PeerMessage> for PeerFrame {
    fn from(msg: PeerMessage) -> Self {
        match msg {
            PeerMessage::HandshakeResponse { hash } => {
                Self::Tagged(TaggedPeerFrame::HandshakeResponse { hash })
            }
            PeerMessage::CatalogUpdate(catalog) => {
                Self::Tagged(TaggedPeerFrame::CatalogUpdate { catalog })
            }
            PeerMessage::Reply {
                id,
                outcome: Ok(result),
            } => Self::Success { id, result },
            PeerMessage::Reply {
                id,
                outcome: Err(message),
            } => Self::Tagged(TaggedPeerFrame::Error {
                id,
                error: Value::String(message),
            }),
        }
    }
}

/// Peers report errors as plain strings, but some send objects.
fn error_text(error: Value) -> String {
    match error {
        Value::String(s) => s,
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}

/// A frame that could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
