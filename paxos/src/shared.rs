//! # Summary
//!
//! This module implements a central hub for outbound message forwarding.
//! We wrap the registry of per-peer channels with `Arc<RwLock<T>>` to share
//! the connections between concurrently running tasks.
//!
//! The hub also defines the `Transport` seam the role state machines send
//! through, so the protocol core can be driven by an in-memory transport
//! under test.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use log::debug;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::message::Message;

/// Best-effort, fire-and-forget delivery to another member. A failed send
/// is reported by the implementation but never surfaces to the caller;
/// the majority-based protocol tolerates lost messages.
pub trait Transport: Clone + Send + Sync + 'static {
    fn send(&self, target: usize, message: Message);
}

/// Thread-safe handle to the peer-channel registry.
pub struct Shared(Arc<RwLock<Registry>>);

struct Registry {
    id: usize,
    peers: Map<usize, mpsc::UnboundedSender<Message>>,
    local: mpsc::UnboundedSender<(usize, Message)>,
}

impl Shared {
    /// Creates the hub for member `id`, returning the receiving end of the
    /// loopback channel carrying self-addressed `(sender, message)` pairs.
    pub fn new(id: usize) -> (Self, mpsc::UnboundedReceiver<(usize, Message)>) {
        let (local, local_rx) = mpsc::unbounded_channel();
        let registry = Registry {
            id,
            peers: Map::default(),
            local,
        };
        (Shared(Arc::new(RwLock::new(registry))), local_rx)
    }

    /// Registers the outbound channel for a connected peer. A reconnecting
    /// peer replaces its previous channel.
    pub fn connect_peer(&self, id: usize, tx: mpsc::UnboundedSender<Message>) {
        self.0.write().peers.insert(id, tx);
    }

    /// Drops the outbound channel for a disconnected peer.
    pub fn disconnect_peer(&self, id: usize) {
        self.0.write().peers.remove(&id);
    }
}

impl Clone for Shared {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl Transport for Shared {
    fn send(&self, target: usize, message: Message) {
        let registry = self.0.read();
        if target == registry.id {
            // Loopback: deliver through the local dispatch task rather than
            // re-entering a role handler under the sender's lock.
            let _ = registry.local.send((message.sender(), message));
        } else if let Some(tx) = registry.peers.get(&target) {
            if tx.send(message).is_err() {
                debug!("peer {} hung up, dropping message", target);
            }
        } else {
            debug!("no connection to {}, dropping message", target);
        }
    }
}
