//! # Summary
//!
//! This module runs the networked side of one member: a listener accepting
//! inbound peer connections, outbound connections to every configured peer,
//! and one forwarding task per live connection. Every inbound protocol
//! frame is dispatched on its own task, so no delivery-order guarantee
//! holds across senders and no handler can stall the connection.
//!
//! Failing to bind the listener is the only fatal startup error. Everything
//! after that is best-effort: an unreachable peer or a lost frame leaves a
//! round incomplete until an external retry, never inconsistent.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::Error;
use crate::message::Message;
use crate::node::Node;
use crate::shared::Shared;
use crate::socket;

/// Wire frame between peers. The first frame on every connection is a
/// `Hello` identifying the dialing member.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
enum Frame {
    Hello(usize),
    Protocol(Message),
}

/// Handle to a running member. Dropping the handle does not stop the
/// member; call `shutdown` to stop listening and release connections.
pub struct Server {
    node: Arc<Node<Shared>>,
    shutdown: watch::Sender<bool>,
}

impl Server {
    /// Binds this member's listener, connects to every peer, and starts
    /// serving. Returns an error only if the listener cannot be bound.
    pub async fn start(config: Config) -> Result<Self, Error> {
        let (shared, mut local_rx) = Shared::new(config.id());
        let node = Arc::new(Node::new(&config, shared.clone()));
        let addr = config.addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!("[{}] listening on {}", config.id(), addr);

        let (shutdown, shutdown_rx) = watch::channel(false);

        // Loopback deliveries from this member's own roles
        let local_node = Arc::clone(&node);
        tokio::spawn(async move {
            while let Some((sender, message)) = local_rx.recv().await {
                let node = Arc::clone(&local_node);
                tokio::spawn(async move { node.dispatch(sender, message) });
            }
        });

        // Inbound connections
        let accept_node = Arc::clone(&node);
        let accept_shared = shared.clone();
        let mut accept_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            tokio::spawn(inbound(
                                stream,
                                accept_shared.clone(),
                                Arc::clone(&accept_node),
                                accept_shutdown.clone(),
                            ));
                        }
                        Err(error) => warn!("failed to accept connection: {}", error),
                    },
                }
            }
        });

        // Outbound connections to every configured peer
        for (peer_id, addr) in config.peers() {
            tokio::spawn(outbound(
                config.id(),
                peer_id,
                addr,
                shared.clone(),
                Arc::clone(&node),
                shutdown_rx.clone(),
            ));
        }

        Ok(Server { node, shutdown })
    }

    pub fn node(&self) -> &Node<Shared> {
        &self.node
    }

    /// Starts a round proposing `value`.
    pub fn propose(&self, value: &str) {
        self.node.propose(value);
    }

    /// Stops accepting connections and winds down peer tasks.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Inbound connection: waits for the peer's `Hello`, then forwards frames.
async fn inbound(
    stream: TcpStream,
    shared: Shared,
    node: Arc<Node<Shared>>,
    shutdown: watch::Receiver<bool>,
) {
    let (mut rx, tx) = socket::split::<Frame, Frame>(stream);
    let peer_id = loop {
        match rx.recv().await {
        | None => return,
        | Some(Ok(Frame::Hello(id))) => break id,
        | Some(Ok(_)) => (),
        | Some(Err(error)) => warn!("dropping frame from unidentified peer: {}", error),
        }
    };
    info!("connected to {}", peer_id);
    serve_peer(peer_id, rx, tx, shared, node, shutdown).await;
}

/// Outbound connection: dials the peer and identifies this member first.
async fn outbound(
    self_id: usize,
    peer_id: usize,
    addr: SocketAddr,
    shared: Shared,
    node: Arc<Node<Shared>>,
    shutdown: watch::Receiver<bool>,
) {
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(error) => {
            // The peer may not be up yet; its own dial to us will register
            // the connection once it starts.
            warn!("failed to connect to {}: {}", peer_id, error);
            return;
        }
    };
    let (rx, mut tx) = socket::split::<Frame, Frame>(stream);
    if let Err(error) = tx.send(&Frame::Hello(self_id)).await {
        warn!("failed to greet {}: {}", peer_id, error);
        return;
    }
    info!("connected to {}", peer_id);
    serve_peer(peer_id, rx, tx, shared, node, shutdown).await;
}

/// Forwards frames both ways until the connection closes or shutdown is
/// signalled. Each inbound protocol message is dispatched on its own task.
async fn serve_peer(
    peer_id: usize,
    mut rx: socket::Rx<Frame>,
    mut tx: socket::Tx<Frame>,
    shared: Shared,
    node: Arc<Node<Shared>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
    shared.connect_peer(peer_id, peer_tx);
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                None => break,
                Some(Ok(Frame::Protocol(message))) => {
                    let node = Arc::clone(&node);
                    tokio::spawn(async move { node.dispatch(peer_id, message) });
                }
                Some(Ok(Frame::Hello(_))) => (),
                Some(Err(error)) => warn!("dropping malformed frame from {}: {}", peer_id, error),
            },
            message = peer_rx.recv() => match message {
                None => break,
                Some(message) => {
                    trace!("sending {:?} to {}", message, peer_id);
                    if let Err(error) = tx.send(&Frame::Protocol(message)).await {
                        warn!("send to {} failed: {}", peer_id, error);
                    }
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    info!("disconnected from {}", peer_id);
    shared.disconnect_peer(peer_id);
}
