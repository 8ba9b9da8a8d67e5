//! Peer side of the canvas-bridge protocol.
//!
//! Connects to a bridge, answers its challenge, then executes commands
//! through a [`CommandHandler`] and pushes catalogs on demand.

use canvas_bridge_core::{
    AuthError, BridgeMessage, Catalog, Command, OutboundFrame, PeerMessage, ProtocolError,
    SharedSecret,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Executes commands received from the bridge.
pub trait CommandHandler {
    fn handle(&self, command: &str, params: &Value) -> Result<Value, String>;
}

impl<F> CommandHandler for F
where
    F: Fn(&str, &Value) -> Result<Value, String>,
{
    fn handle(&self, command: &str, params: &Value) -> Result<Value, String> {
        self(command, params)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("connection closed by bridge (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },
    #[error("unexpected frame during handshake: {0}")]
    Unexpected(String),
}

/// An authenticated connection to the bridge.
pub struct PeerClient {
    ws: Ws,
}

impl PeerClient {
    /// Connect and complete the handshake.
    pub async fn connect(url: &str, secret: &SharedSecret) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let mut client = Self { ws };

        let nonce = match client.next_control().await? {
            BridgeMessage::HandshakeChallenge { nonce } => nonce,
            other => return Err(ClientError::Unexpected(format!("{other:?}"))),
        };
        client
            .send(PeerMessage::HandshakeResponse {
                hash: secret.sign(&nonce)?,
            })
            .await?;

        match client.next_control().await? {
            BridgeMessage::HandshakeOk => {
                tracing::debug!("Handshake complete");
                Ok(client)
            }
            other => Err(ClientError::Unexpected(format!("{other:?}"))),
        }
    }

    /// Wait for the next command. Fails with [`ClientError::Closed`] once
    /// the bridge goes away.
    pub async fn next_command(&mut self) -> Result<Command, ClientError> {
        loop {
            match self.next_frame().await? {
                OutboundFrame::Command(cmd) => return Ok(cmd),
                OutboundFrame::Control(msg) => {
                    tracing::debug!(?msg, "Ignoring control message");
                }
            }
        }
    }

    pub async fn reply(&mut self, id: &str, outcome: Result<Value, String>) -> Result<(), ClientError> {
        self.send(PeerMessage::Reply {
            id: id.to_string(),
            outcome,
        })
        .await
    }

    pub async fn push_catalog(&mut self, catalog: Catalog) -> Result<(), ClientError> {
        self.send(PeerMessage::CatalogUpdate(catalog)).await
    }

    /// Answer commands until the bridge closes the connection.
    pub async fn serve<H: CommandHandler>(&mut self, handler: &H) -> Result<(), ClientError> {
        loop {
            let cmd = match self.next_command().await {
                Ok(cmd) => cmd,
                Err(ClientError::Closed { .. }) => return Ok(()),
                Err(e) => return Err(e),
            };
            let outcome = handler.handle(&cmd.command, &cmd.params);
            self.reply(&cmd.id, outcome).await?;
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, msg: PeerMessage) -> Result<(), ClientError> {
        self.ws.send(Message::Text(msg.encode()?.into())).await?;
        Ok(())
    }

    async fn next_control(&mut self) -> Result<BridgeMessage, ClientError> {
        match self.next_frame().await? {
            OutboundFrame::Control(msg) => Ok(msg),
            OutboundFrame::Command(cmd) => Err(ClientError::Unexpected(cmd.command)),
        }
    }

    async fn next_frame(&mut self) -> Result<OutboundFrame, ClientError> {
        while let Some(msg) = self.ws.next().await {
            match msg? {
                Message::Text(text) => return Ok(OutboundFrame::parse(&text)?),
                Message::Close(frame) => {
                    return Err(match frame {
                        Some(frame) => ClientError::Closed {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.as_str().to_string(),
                        },
                        None => ClientError::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    });
                }
                _ => continue,
            }
        }
        Err(ClientError::Closed {
            code: None,
            reason: "stream ended".to_string(),
        })
    }
}

impl ClientError {
    /// Close code the bridge sent, if the connection ended with one.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Closed { code, .. } => *code,
            _ => None,
        }
    }
}
