//! Full-duplex text transport consumed by a session.
//!
//! [`WsTransport`] adapts an axum `WebSocket`; [`ChannelTransport`] is an
//! in-memory pair for embedding the relay without a socket (and for tests).

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::debug;

/// A bidirectional stream of discrete text frames.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound text frame, or `None` once the peer has gone away.
    ///
    /// Must be cancel-safe: the session polls it inside `select!`.
    async fn recv(&mut self) -> Option<String>;

    /// Send one frame. Returns `false` if the peer can no longer be reached.
    async fn send(&mut self, text: String) -> bool;

    /// Close the outbound side.
    async fn close(&mut self);
}

/// [`Transport`] over an upgraded axum `WebSocket`.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Option<String> {
        while let Some(Ok(msg)) = self.socket.recv().await {
            match msg {
                Message::Text(text) => return Some(text.to_string()),
                // Some clients send commands as binary frames
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => return Some(text.to_owned()),
                    Err(_) => debug!(len = data.len(), "dropping non-UTF8 binary frame"),
                },
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        None
    }

    async fn send(&mut self, text: String) -> bool {
        self.socket.send(Message::Text(text.into())).await.is_ok()
    }

    async fn close(&mut self) {
        let _ = self.socket.send(Message::Close(None)).await;
    }
}

/// In-memory [`Transport`]; the other end is a [`ChannelPeer`].
pub struct ChannelTransport {
    inbound: mpsc::Receiver<String>,
    outbound: Option<mpsc::Sender<String>>,
}

/// Client side of a [`ChannelTransport`].
pub struct ChannelPeer {
    /// Frames to the session.
    pub tx: mpsc::Sender<String>,
    /// Frames from the session; yields `None` after the session closes.
    pub rx: mpsc::Receiver<String>,
}

/// Create a connected in-memory transport pair.
pub fn channel_transport(capacity: usize) -> (ChannelTransport, ChannelPeer) {
    let (client_tx, inbound) = mpsc::channel(capacity);
    let (outbound, client_rx) = mpsc::channel(capacity);
    (
        ChannelTransport {
            inbound,
            outbound: Some(outbound),
        },
        ChannelPeer {
            tx: client_tx,
            rx: client_rx,
        },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    async fn send(&mut self, text: String) -> bool {
        match &self.outbound {
            Some(tx) => tx.send(text).await.is_ok(),
            None => false,
        }
    }

    async fn close(&mut self) {
        self.outbound = None;
    }
}
