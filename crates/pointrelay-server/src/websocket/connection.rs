//! Live connection directory.
//!
//! Every session registers a signal channel here so other sessions can reach
//! it (the owner-gone eviction is the only cross-connection message).

use dashmap::DashMap;
use pointrelay_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::debug;

/// Buffered signals per connection. Each connection receives at most one
/// eviction, so this only needs headroom for races.
const SIGNAL_BUFFER: usize = 4;

/// Message delivered to a session from outside its own socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerSignal {
    /// Send `notice` to the client and end the session.
    Evict {
        /// Final frame for the client.
        notice: String,
    },
}

/// Concurrent map of live connections to their signal channels.
#[derive(Default)]
pub struct ConnectionDirectory {
    peers: DashMap<ConnectionId, mpsc::Sender<PeerSignal>>,
}

impl ConnectionDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its signal channel.
    pub fn register(&self, id: ConnectionId) -> mpsc::Receiver<PeerSignal> {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        debug!(connection_id = %id, "connection registered");
        let _ = self.peers.insert(id, tx);
        rx
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn unregister(&self, id: &ConnectionId) {
        if self.peers.remove(id).is_some() {
            debug!(connection_id = %id, "connection unregistered");
        }
    }

    /// Deliver a signal. Returns `false` if the connection is gone or its
    /// buffer is full.
    pub fn signal(&self, id: &ConnectionId, signal: PeerSignal) -> bool {
        self.peers
            .get(id)
            .is_some_and(|tx| tx.try_send(signal).is_ok())
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.peers.contains_key(id)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let dir = ConnectionDirectory::new();
        let id = ConnectionId::from("c1");
        let _rx = dir.register(id.clone());
        assert_eq!(dir.count(), 1);
        assert!(dir.contains(&id));
        dir.unregister(&id);
        assert_eq!(dir.count(), 0);
        assert!(!dir.contains(&id));
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let dir = ConnectionDirectory::new();
        dir.unregister(&ConnectionId::from("ghost"));
        assert_eq!(dir.count(), 0);
    }

    #[tokio::test]
    async fn signal_reaches_registered_connection() {
        let dir = ConnectionDirectory::new();
        let id = ConnectionId::from("c1");
        let mut rx = dir.register(id.clone());
        let sent = dir.signal(
            &id,
            PeerSignal::Evict {
                notice: "bye".into(),
            },
        );
        assert!(sent);
        assert_eq!(
            rx.recv().await,
            Some(PeerSignal::Evict {
                notice: "bye".into()
            })
        );
    }

    #[test]
    fn signal_unknown_connection_fails() {
        let dir = ConnectionDirectory::new();
        let sent = dir.signal(
            &ConnectionId::from("ghost"),
            PeerSignal::Evict {
                notice: "bye".into(),
            },
        );
        assert!(!sent);
    }

    #[test]
    fn signal_after_receiver_dropped_fails() {
        let dir = ConnectionDirectory::new();
        let id = ConnectionId::from("c1");
        drop(dir.register(id.clone()));
        assert!(!dir.signal(
            &id,
            PeerSignal::Evict {
                notice: "bye".into()
            }
        ));
    }
}
