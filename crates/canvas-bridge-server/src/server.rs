//! WebSocket listener for peer connections.

use crate::bridge::{Bridge, ConnectionId, Outbound};
use crate::config::Config;
use crate::session::{Action, Session};
use canvas_bridge_core::{close_code, BridgeMessage, OutboundFrame, SharedSecret};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// How long to wait for the peer to acknowledge a close we initiated.
const CLOSE_LINGER: Duration = Duration::from_secs(1);

/// Settings every connection task needs.
struct ConnectionContext {
    bridge: Bridge,
    secret: SharedSecret,
    handshake_timeout: Duration,
}

pub async fn run(listener: TcpListener, bridge: Bridge, config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(ConnectionContext {
        bridge,
        secret: config.secret.clone(),
        handshake_timeout: config.handshake_timeout,
    });
    let mut next_conn: ConnectionId = 1;

    tracing::info!("Listening on ws://{}", listener.local_addr()?);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let conn = next_conn;
        next_conn += 1;
        let ctx = ctx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, conn, &ctx).await {
                tracing::warn!(conn, "Connection error from {}: {}", peer_addr, e);
            }
            // No-op unless this connection was the active peer.
            ctx.bridge.disconnect(conn).await;
            tracing::debug!(conn, "Connection closed: {}", peer_addr);
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn: ConnectionId,
    ctx: &ConnectionContext,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    tracing::debug!(conn, "New connection from {}", addr);

    let mut session = Session::new(ctx.secret.clone())?;
    send(&mut sink, session.challenge()).await?;

    let deadline = tokio::time::sleep(ctx.handshake_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(conn, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                match session.on_text(&text) {
                    Action::Reply(reply) => send(&mut sink, reply).await?,
                    Action::Promote => {
                        ctx.bridge.activate(conn, tx.clone()).await;
                        send(&mut sink, BridgeMessage::HandshakeOk).await?;
                        tracing::info!(conn, "Peer authenticated from {}", addr);
                    }
                    Action::Reject { code, reason } => {
                        tracing::warn!(conn, "Rejecting {}: {}", addr, reason);
                        close(&mut sink, stream, code, reason).await?;
                        return Ok(());
                    }
                    Action::Forward(msg) => ctx.bridge.handle_message(conn, msg).await,
                    Action::Ignore => {}
                }
            }

            Some(out) = rx.recv() => match out {
                Outbound::Frame(text) => sink.send(Message::Text(text.into())).await?,
                Outbound::Close { code, reason } => {
                    close(&mut sink, stream, code, reason).await?;
                    return Ok(());
                }
            },

            () = &mut deadline, if !session.is_authenticated() => {
                tracing::warn!(conn, "Handshake timed out for {}", addr);
                close(&mut sink, stream, close_code::HANDSHAKE_TIMEOUT, "handshake timeout").await?;
                return Ok(());
            }
        }
    }

    Ok(())
}

async fn send(sink: &mut WsSink, msg: BridgeMessage) -> anyhow::Result<()> {
    let text = OutboundFrame::from(msg).encode()?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Send a close frame, then drain until the peer answers or the linger
/// period runs out, so the frame is not lost to a reset.
async fn close(
    sink: &mut WsSink,
    mut stream: WsStream,
    code: u16,
    reason: &'static str,
) -> anyhow::Result<()> {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    };
    sink.send(Message::Close(Some(frame))).await?;
    let _ = tokio::time::timeout(CLOSE_LINGER, async {
        while let Some(Ok(_)) = stream.next().await {}
    })
    .await;
    Ok(())
}
