//! Channel abstraction for the session protocol.
//!
//! The channel moves opaque byte payloads between two endpoints and reports
//! when a peer goes away. Implementations may use WebSockets, an XMPP
//! session, or anything else that delivers in order.
//!
//! # Contract
//!
//! Payloads between a given pair of peers are delivered at most once and in
//! send order. The transformation strategy relies on this; a channel that
//! reorders or duplicates will corrupt convergence.

use async_trait::async_trait;
use bytes::Bytes;

use docshare_core::PeerId;

use crate::error::Result;

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A payload from a peer.
    Message { from: PeerId, payload: Bytes },
    /// A peer is no longer reachable.
    Disconnected(PeerId),
}

/// Channel trait for moving session messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Queue a payload for `peer`. Never waits for delivery.
    fn send(&self, peer: &PeerId, payload: Bytes) -> Result<()>;

    /// Receive the next event.
    ///
    /// Blocks until an event is available or the channel closes.
    async fn recv(&self) -> Result<ChannelEvent>;

    /// Receive the next event if one is already queued.
    fn try_recv(&self) -> Result<Option<ChannelEvent>>;

    /// Get the local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// Check if a specific peer is reachable.
    fn is_connected(&self, peer: &PeerId) -> bool;
}

/// A simple in-memory channel for testing.
///
/// Uses unbounded queues to simulate an ordered, lossless network.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, PoisonError, RwLock};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::{mpsc, Mutex};

    use crate::error::SyncError;

    /// Shared state for the memory network.
    pub struct MemoryNetwork {
        /// Inbound queue of each connected peer.
        senders: RwLock<HashMap<PeerId, mpsc::UnboundedSender<ChannelEvent>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a channel endpoint for `peer_id` on this network.
        ///
        /// Re-creating an endpoint for a known peer replaces the old one.
        pub fn create_channel(self: &Arc<Self>, peer_id: PeerId) -> MemoryChannel {
            let (tx, rx) = mpsc::unbounded_channel();

            self.senders
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(peer_id, tx);

            MemoryChannel {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Drop `peer_id` from the network and tell every other peer.
        ///
        /// The disconnected endpoint's `recv` reports the channel closed once
        /// its queue drains.
        pub fn disconnect(&self, peer_id: &PeerId) {
            let mut senders = self.senders.write().unwrap_or_else(PoisonError::into_inner);
            if senders.remove(peer_id).is_none() {
                return;
            }
            tracing::debug!(peer = %peer_id, "memory network: peer disconnected");
            for sender in senders.values() {
                // Receivers that are gone have nothing left to notify.
                let _ = sender.send(ChannelEvent::Disconnected(*peer_id));
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                senders: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory channel endpoint.
    pub struct MemoryChannel {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::UnboundedReceiver<ChannelEvent>>,
    }

    #[async_trait]
    impl Channel for MemoryChannel {
        fn send(&self, peer: &PeerId, payload: Bytes) -> Result<()> {
            let senders = self
                .network
                .senders
                .read()
                .unwrap_or_else(PoisonError::into_inner);

            if !senders.contains_key(&self.peer_id) {
                return Err(SyncError::TransportError(
                    "local endpoint disconnected".into(),
                ));
            }

            let sender = senders
                .get(peer)
                .ok_or(SyncError::PeerNotConnected(*peer))?;
            sender
                .send(ChannelEvent::Message {
                    from: self.peer_id,
                    payload,
                })
                .map_err(|_| SyncError::PeerNotConnected(*peer))
        }

        async fn recv(&self) -> Result<ChannelEvent> {
            let mut rx = self.receiver.lock().await;
            rx.recv().await.ok_or(SyncError::ChannelClosed)
        }

        fn try_recv(&self) -> Result<Option<ChannelEvent>> {
            // Someone else is blocked in `recv`; nothing for us.
            let Ok(mut rx) = self.receiver.try_lock() else {
                return Ok(None);
            };
            match rx.try_recv() {
                Ok(event) => Ok(Some(event)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(SyncError::ChannelClosed),
            }
        }

        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        fn is_connected(&self, peer: &PeerId) -> bool {
            self.network
                .senders
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(peer)
        }
    }
}
