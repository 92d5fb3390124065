//! # Summary
//!
//! This module ties one `Proposer`, one `Acceptor`, and one `Learner`
//! together under a single member identity and routes inbound messages to
//! the role that handles their type. A bad frame is logged and dropped;
//! the dispatcher never crashes or stalls on one.

use hashbrown::HashSet as Set;
use log::{trace, warn};

use crate::config::Config;
use crate::message::Message;
use crate::role::{Acceptor, Learner, Proposer};
use crate::shared::Transport;

pub struct Node<T> {
    id: usize,
    proposer: Proposer<T>,
    acceptor: Acceptor<T>,
    learner: Learner,
}

impl<T: Transport> Node<T> {
    /// Builds the three roles for this member. Every member in the
    /// membership acts as acceptor and learner.
    pub fn new(config: &Config, transport: T) -> Self {
        let members = config.members().collect::<Set<usize>>();
        Node {
            id: config.id(),
            proposer: Proposer::new(
                config.id(),
                members.clone(),
                members.clone(),
                config.majority(),
                transport.clone(),
            ),
            acceptor: Acceptor::new(config.id(), members, transport),
            learner: Learner::new(config.id(), config.majority()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Starts a round proposing `value`.
    pub fn propose(&self, value: &str) {
        self.proposer.propose(value);
    }

    /// Routes an inbound message by its type tag. `Accepted` feeds both the
    /// learner (majority detection) and the proposer (chosen detection);
    /// each counts distinct acceptor IDs on its own, so the double routing
    /// cannot double-count.
    pub fn dispatch(&self, sender: usize, message: Message) {
        trace!("[node {}] received {:?} from {}", self.id, message, sender);
        match message {
        | Message::Prepare(prepare) => self.acceptor.handle_prepare(prepare, sender),
        | Message::Promise(promise) => self.proposer.handle_promise(promise),
        | Message::AcceptRequest(request) => self.acceptor.handle_accept_request(request, sender),
        | Message::Accepted(accepted) => {
            self.proposer.handle_accepted(accepted.clone());
            self.learner.handle_accepted(accepted);
        }
        }
    }

    /// Decodes a raw frame and dispatches it. A frame that fails to decode
    /// (including one with an unknown type tag) is logged and dropped.
    pub fn dispatch_raw(&self, sender: usize, bytes: &[u8]) {
        match Message::decode(bytes) {
        | Ok(message) => self.dispatch(sender, message),
        | Err(error) => warn!("[node {}] dropping frame from {}: {}", self.id, sender, error),
        }
    }

    pub fn proposer(&self) -> &Proposer<T> {
        &self.proposer
    }

    pub fn acceptor(&self) -> &Acceptor<T> {
        &self.acceptor
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use hashbrown::HashMap as Map;

    use crate::message::{Accepted, Prepare, Promise, ProposalNumber};
    use crate::role::testing::Mailbox;

    use super::*;

    fn node(id: usize, count: usize) -> (Node<Mailbox>, Mailbox) {
        let members = (1..=count)
            .map(|member| {
                let addr = format!("127.0.0.1:{}", 9000 + member).parse::<SocketAddr>().unwrap();
                (member, addr)
            })
            .collect::<Map<usize, SocketAddr>>();
        let mailbox = Mailbox::default();
        (Node::new(&Config::new(id, members), mailbox.clone()), mailbox)
    }

    fn number(sequence: u64, proposer: usize) -> ProposalNumber {
        ProposalNumber { sequence, proposer }
    }

    #[test]
    fn routes_prepare_to_acceptor() {
        let (node, mailbox) = node(1, 3);
        let prepare = Message::Prepare(Prepare { from: 2, number: number(1, 2) });
        node.dispatch(2, prepare);
        assert_eq!(Some(number(1, 2)), node.acceptor().promised());
        let sent = mailbox.take();
        assert!(matches!(sent[0], (2, Message::Promise(_))));
    }

    #[test]
    fn routes_promise_to_proposer() {
        let (node, mailbox) = node(1, 3);
        node.propose("X");
        mailbox.take();
        node.dispatch(2, Message::Promise(Promise {
            from: 2,
            number: number(1, 1),
            accepted: None,
        }));
        node.dispatch(3, Message::Promise(Promise {
            from: 3,
            number: number(1, 1),
            accepted: None,
        }));
        let sent = mailbox.take();
        assert!(sent.iter().any(|(_, message)| matches!(message, Message::AcceptRequest(_))));
    }

    #[test]
    fn routes_accepted_to_learner() {
        let (node, _mailbox) = node(1, 3);
        for from in [2, 3] {
            node.dispatch(from, Message::Accepted(Accepted {
                from,
                number: number(1, 2),
                value: "X".to_owned(),
            }));
        }
        assert_eq!(Some("X".to_owned()), node.learner().last_learned());
    }

    #[test]
    fn malformed_frame_is_dropped_without_panic() {
        let (node, mailbox) = node(1, 3);
        node.dispatch_raw(2, &[0xde, 0xad, 0xbe, 0xef]);
        node.dispatch_raw(2, &[]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn valid_frame_is_decoded_and_dispatched() {
        let (node, _mailbox) = node(1, 3);
        let prepare = Message::Prepare(Prepare { from: 2, number: number(4, 2) });
        node.dispatch_raw(2, &prepare.encode().unwrap());
        assert_eq!(Some(number(4, 2)), node.acceptor().promised());
    }
}
