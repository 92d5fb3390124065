//! End-to-end scenarios over an in-process cluster. Messages travel
//! through a single FIFO queue drained outside of any role lock, so every
//! scenario is deterministic, and losing or duplicating deliveries is a
//! matter of editing the queue.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use hashbrown::HashMap as Map;
use parking_lot::Mutex;

use paxos::{Config, Message, Node, Transport};

/// Queue-backed transport shared by every node in the cluster.
#[derive(Clone, Default)]
struct Network(Arc<Mutex<VecDeque<(usize, Message)>>>);

impl Transport for Network {
    fn send(&self, target: usize, message: Message) {
        self.0.lock().push_back((target, message));
    }
}

struct Cluster {
    nodes: Vec<Arc<Node<Network>>>,
    network: Network,
}

impl Cluster {
    /// Builds members with IDs `1..=count`.
    fn new(count: usize) -> Self {
        let network = Network::default();
        let members = (1..=count)
            .map(|id| {
                let addr = format!("127.0.0.1:{}", 9000 + id).parse::<SocketAddr>().unwrap();
                (id, addr)
            })
            .collect::<Map<usize, SocketAddr>>();
        let nodes = (1..=count)
            .map(|id| Arc::new(Node::new(&Config::new(id, members.clone()), network.clone())))
            .collect();
        Cluster { nodes, network }
    }

    fn node(&self, id: usize) -> &Node<Network> {
        &self.nodes[id - 1]
    }

    /// Next queued delivery. The network lock is released before dispatch,
    /// which re-acquires it to enqueue replies.
    fn pop(&self) -> Option<(usize, Message)> {
        self.network.0.lock().pop_front()
    }

    /// Delivers queued messages in FIFO order until the network is idle.
    fn settle(&self) {
        while let Some((target, message)) = self.pop() {
            self.node(target).dispatch(message.sender(), message);
        }
    }

    /// Like `settle`, but every message is delivered twice.
    fn settle_with_duplicates(&self) {
        while let Some((target, message)) = self.pop() {
            self.node(target).dispatch(message.sender(), message.clone());
            self.node(target).dispatch(message.sender(), message);
        }
    }

    /// Drops every queued message, simulating total loss.
    fn drop_all_in_flight(&self) {
        self.network.0.lock().clear();
    }
}

#[test]
fn five_member_council_learns_proposed_value() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");
    cluster.settle();
    for id in 1..=5 {
        assert_eq!(
            Some("X".to_owned()),
            cluster.node(id).learner().last_learned(),
            "learner {} disagrees",
            id,
        );
    }
}

#[test]
fn later_round_adopts_previously_accepted_value() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");
    cluster.settle();

    // A second proposer pushing "Y" must rediscover and re-propose "X"
    cluster.node(2).propose("Y");
    cluster.settle();

    assert_eq!(Some("X".to_owned()), cluster.node(2).proposer().candidate());
    for id in 1..=5 {
        assert_eq!(Some("X".to_owned()), cluster.node(id).learner().last_learned());
    }
}

#[test]
fn competing_proposers_agree_on_a_single_value() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");
    cluster.node(2).propose("Y");
    cluster.settle();

    // Proposer 2's number (P2:1) outranks proposer 1's (P1:1), so every
    // acceptor re-promises and proposer 1's accept requests are refused.
    let learned = cluster.node(1).learner().last_learned();
    assert_eq!(Some("Y".to_owned()), learned);
    for id in 2..=5 {
        assert_eq!(learned, cluster.node(id).learner().last_learned());
    }
}

#[test]
fn total_loss_stalls_round_until_external_retry() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");
    cluster.drop_all_in_flight();
    cluster.settle();
    for id in 1..=5 {
        assert_eq!(None, cluster.node(id).learner().last_learned());
    }

    // External retry reruns the round under a strictly higher number
    cluster.node(1).propose("X");
    cluster.settle();
    for id in 1..=5 {
        assert_eq!(Some("X".to_owned()), cluster.node(id).learner().last_learned());
    }
}

#[test]
fn duplicated_deliveries_change_nothing() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");
    cluster.settle_with_duplicates();
    for id in 1..=5 {
        assert_eq!(Some("X".to_owned()), cluster.node(id).learner().last_learned());
    }
}

#[test]
fn minority_of_acceptors_cannot_choose() {
    let cluster = Cluster::new(5);
    cluster.node(1).propose("X");

    // Deliver the prepares to only two acceptors, then drop the rest.
    for _ in 0..2 {
        if let Some((target, message)) = cluster.pop() {
            cluster.node(target).dispatch(message.sender(), message);
        }
    }
    cluster.drop_all_in_flight();
    cluster.settle();

    for id in 1..=5 {
        assert_eq!(None, cluster.node(id).learner().last_learned());
    }
}
