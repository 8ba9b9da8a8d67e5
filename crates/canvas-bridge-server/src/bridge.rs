//! The command bridge.
//!
//! Owns the single active-peer slot and the table of commands awaiting a
//! reply. Both live behind one mutex; connection tasks and callers reach them
//! only through the methods below.

use crate::error::BridgeError;
use crate::store::SharedCatalogs;
use canvas_bridge_core::{close_code, Command, OutboundFrame, PeerMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Process-unique connection number, assigned at accept time.
pub type ConnectionId = u64;

/// Instructions for a connection task's writer half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Close { code: u16, reason: &'static str },
}

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;

type Outcome = Result<Value, BridgeError>;

struct ActivePeer {
    conn: ConnectionId,
    tx: OutboundTx,
}

struct PendingRequest {
    command: String,
    responder: oneshot::Sender<Outcome>,
    timer: JoinHandle<()>,
}

impl PendingRequest {
    fn resolve(self, outcome: Outcome) {
        self.timer.abort();
        // The caller may have stopped waiting.
        let _ = self.responder.send(outcome);
    }
}

#[derive(Default)]
struct BridgeState {
    active: Option<ActivePeer>,
    pending: HashMap<String, PendingRequest>,
}

struct Inner {
    state: Mutex<BridgeState>,
    catalogs: SharedCatalogs,
    command_timeout: Duration,
}

/// Handle to the bridge. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new(command_timeout: Duration, catalogs: SharedCatalogs) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BridgeState::default()),
                catalogs,
                command_timeout,
            }),
        }
    }

    pub fn catalogs(&self) -> &SharedCatalogs {
        &self.inner.catalogs
    }

    pub fn command_timeout(&self) -> Duration {
        self.inner.command_timeout
    }

    /// Whether an authenticated peer is currently active.
    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.active.is_some()
    }

    /// Number of commands still waiting for an outcome.
    pub async fn pending_count(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Install a freshly authenticated connection as the active peer,
    /// closing whichever connection held the slot before.
    pub async fn activate(&self, conn: ConnectionId, tx: OutboundTx) {
        let mut state = self.inner.state.lock().await;
        let previous = state.active.replace(ActivePeer { conn, tx });
        if let Some(previous) = previous
            && previous.conn != conn
        {
            let closed = previous
                .tx
                .send(Outbound::Close {
                    code: close_code::DISPLACED,
                    reason: "replaced by a newer connection",
                })
                .is_ok();
            info!(conn, displaced = previous.conn, closed, "Peer displaced");
        } else {
            info!(conn, "Peer active");
        }
    }

    /// Send a command and wait for its outcome.
    pub async fn send_command(&self, name: &str, params: Value) -> Outcome {
        self.issue(name, params).await?.outcome().await
    }

    /// Register and send a command, returning a handle to its outcome.
    ///
    /// Fails with [`BridgeError::NotConnected`] without registering anything
    /// when no peer is active.
    pub async fn issue(&self, name: &str, params: Value) -> Result<PendingReply, BridgeError> {
        let mut state = self.inner.state.lock().await;
        let Some(active) = state.active.as_ref() else {
            return Err(BridgeError::NotConnected);
        };
        let tx = active.tx.clone();
        let conn = active.conn;

        let mut id = Uuid::new_v4().to_string();
        while state.pending.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let frame = OutboundFrame::from(Command {
            id: id.clone(),
            command: name.to_string(),
            params,
        })
        .encode()?;

        let (responder, rx) = oneshot::channel();
        let timer = {
            let bridge = self.clone();
            let id = id.clone();
            let timeout = self.inner.command_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                bridge.expire(&id).await;
            })
        };
        state.pending.insert(
            id.clone(),
            PendingRequest {
                command: name.to_string(),
                responder,
                timer,
            },
        );

        if tx.send(Outbound::Frame(frame)).is_err() {
            if let Some(entry) = state.pending.remove(&id) {
                entry.timer.abort();
            }
            warn!(conn, command = name, "Active peer's writer is gone");
            return Err(BridgeError::PeerDisconnected);
        }

        debug!(conn, %id, command = name, "Command sent");
        Ok(PendingReply { id, rx })
    }

    async fn expire(&self, id: &str) {
        let entry = self.inner.state.lock().await.pending.remove(id);
        if let Some(entry) = entry {
            warn!(%id, command = %entry.command, "Command timed out");
            let outcome = Err(BridgeError::RequestTimeout {
                command: entry.command.clone(),
                timeout: self.inner.command_timeout,
            });
            // Running inside the timer task; nothing to abort.
            let _ = entry.responder.send(outcome);
        }
    }

    /// Handle a message from an authenticated connection.
    pub async fn handle_message(&self, conn: ConnectionId, msg: PeerMessage) {
        let mut state = self.inner.state.lock().await;
        if state.active.as_ref().map(|a| a.conn) != Some(conn) {
            debug!(conn, "Dropping frame from inactive connection");
            return;
        }

        match msg {
            PeerMessage::CatalogUpdate(catalog) => {
                drop(state);
                info!(
                    conn,
                    source = %catalog.source_id,
                    components = catalog.components.len(),
                    styles = catalog.styles.len(),
                    "Catalog updated"
                );
                self.inner.catalogs.write().await.put(catalog);
            }
            PeerMessage::Reply { id, outcome } => match state.pending.remove(&id) {
                Some(entry) => {
                    debug!(conn, %id, command = %entry.command, ok = outcome.is_ok(), "Reply received");
                    entry.resolve(outcome.map_err(BridgeError::RemoteError));
                }
                None => debug!(conn, %id, "Dropping reply for unknown request"),
            },
            PeerMessage::HandshakeResponse { .. } => {
                debug!(conn, "Ignoring repeated handshake response");
            }
        }
    }

    /// Forget a closed connection. If it was the active peer, every pending
    /// command fails with [`BridgeError::PeerDisconnected`].
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut state = self.inner.state.lock().await;
        if state.active.as_ref().map(|a| a.conn) != Some(conn) {
            return;
        }
        state.active = None;
        let failed = state.pending.len();
        for (_, entry) in state.pending.drain() {
            entry.resolve(Err(BridgeError::PeerDisconnected));
        }
        info!(conn, failed, "Active peer disconnected");
    }
}

/// The caller's side of an issued command.
pub struct PendingReply {
    id: String,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingReply {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the reply, timeout, or disconnect, whichever comes first.
    pub async fn outcome(self) -> Outcome {
        self.rx.await.unwrap_or(Err(BridgeError::PeerDisconnected))
    }
}
