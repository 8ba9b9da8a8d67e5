//! Per-connection handshake state.
//!
//! Decides what each inbound frame means for one connection without doing
//! any I/O. The connection task in `server` carries out the returned action.

use canvas_bridge_core::{
    close_code, AuthError, BridgeMessage, Nonce, PeerMessage, SharedSecret,
};
use serde_json::Value;
use tracing::{debug, error, warn};

/// What the connection task should do with a frame.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Send this to the peer and keep waiting.
    Reply(BridgeMessage),
    /// Handshake succeeded: make this connection the active peer.
    Promote,
    /// Close the connection with the given code.
    Reject { code: u16, reason: &'static str },
    /// Authenticated traffic for the bridge.
    Forward(PeerMessage),
    Ignore,
}

pub struct Session {
    nonce: Nonce,
    secret: SharedSecret,
    authenticated: bool,
}

impl Session {
    /// Start a handshake with a fresh nonce.
    pub fn new(secret: SharedSecret) -> Result<Self, AuthError> {
        Ok(Self::with_nonce(secret, Nonce::generate()?))
    }

    pub fn with_nonce(secret: SharedSecret, nonce: Nonce) -> Self {
        Self {
            nonce,
            secret,
            authenticated: false,
        }
    }

    pub fn challenge(&self) -> BridgeMessage {
        BridgeMessage::HandshakeChallenge {
            nonce: self.nonce.to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn on_text(&mut self, text: &str) -> Action {
        if self.authenticated {
            return self.on_authenticated(text);
        }

        // Only the frame's type matters before authentication.
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed frame");
                return Action::Ignore;
            }
        };

        if frame["type"] != "handshake_response" {
            return Action::Reply(BridgeMessage::HandshakeRequired {
                message: "complete the handshake before sending commands".to_string(),
            });
        }

        let Some(hash) = frame["hash"].as_str() else {
            warn!("Handshake response without a string hash");
            return Self::invalid();
        };
        match self.nonce.verify(&self.secret, hash) {
            Ok(true) => {
                self.authenticated = true;
                Action::Promote
            }
            Ok(false) => Self::invalid(),
            Err(e) => {
                error!(error = %e, "Could not check handshake response");
                Self::invalid()
            }
        }
    }

    fn on_authenticated(&self, text: &str) -> Action {
        match PeerMessage::parse(text) {
            Ok(PeerMessage::HandshakeResponse { .. }) => {
                debug!("Ignoring handshake response on authenticated connection");
                Action::Ignore
            }
            Ok(msg) => Action::Forward(msg),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed frame");
                Action::Ignore
            }
        }
    }

    fn invalid() -> Action {
        Action::Reject {
            code: close_code::INVALID_HANDSHAKE,
            reason: "invalid handshake",
        }
    }
}
