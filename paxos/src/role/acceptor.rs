//! # Summary
//!
//! This module defines the `Acceptor` role, which acts as the protocol's
//! distributed memory. An acceptor promises never to honor a proposal
//! below its promised number, and reports what it has already accepted so
//! proposers can preserve earlier decisions.

use hashbrown::HashSet as Set;
use log::{debug, info};
use parking_lot::Mutex;

use crate::message::{AcceptRequest, Accepted, Message, Prepare, Promise, ProposalNumber};
use crate::shared::Transport;

pub struct Acceptor<T> {
    /// Unique ID of this member
    id: usize,

    /// IDs of all learners to notify on acceptance
    learners: Set<usize>,

    transport: T,

    state: Mutex<State>,
}

/// Both fields move only forward: `promised` is monotonically
/// non-decreasing, and `accepted` only ever advances to a pair whose
/// number is at least `promised`.
#[derive(Default)]
struct State {
    promised: Option<ProposalNumber>,
    accepted: Option<(ProposalNumber, String)>,
}

impl<T: Transport> Acceptor<T> {
    pub fn new(id: usize, learners: Set<usize>, transport: T) -> Self {
        Acceptor {
            id,
            learners,
            transport,
            state: Mutex::new(State::default()),
        }
    }

    /// Replies with a promise iff nothing above `prepare.number` has been
    /// promised yet. Re-preparing the same number is honored again, so a
    /// duplicated `Prepare` is idempotent.
    pub fn handle_prepare(&self, prepare: Prepare, from: usize) {
        let mut state = self.state.lock();
        if let Some(promised) = state.promised {
            if prepare.number < promised {
                debug!(
                    "[acceptor {}] ignoring prepare {}, promised {}",
                    self.id, prepare.number, promised,
                );
                return;
            }
        }
        state.promised = Some(prepare.number);
        let promise = Message::Promise(Promise {
            from: self.id,
            number: prepare.number,
            accepted: state.accepted.clone(),
        });
        debug!("[acceptor {}] promised {} to {}", self.id, prepare.number, from);
        self.transport.send(from, promise);
    }

    /// Accepts iff nothing above `request.number` has been promised.
    /// On acceptance, replies to the requester and notifies every learner.
    pub fn handle_accept_request(&self, request: AcceptRequest, from: usize) {
        let mut state = self.state.lock();
        if let Some(promised) = state.promised {
            if request.number < promised {
                debug!(
                    "[acceptor {}] ignoring accept request {}, promised {}",
                    self.id, request.number, promised,
                );
                return;
            }
        }
        state.promised = Some(request.number);
        state.accepted = Some((request.number, request.value.clone()));
        info!(
            "[acceptor {}] accepted {} with value {:?}",
            self.id, request.number, request.value,
        );
        let accepted = Message::Accepted(Accepted {
            from: self.id,
            number: request.number,
            value: request.value,
        });
        self.transport.send(from, accepted.clone());
        for learner in &self.learners {
            self.transport.send(*learner, accepted.clone());
        }
    }

    /// Highest number promised so far, if any.
    pub fn promised(&self) -> Option<ProposalNumber> {
        self.state.lock().promised
    }

    /// Most recently accepted (number, value) pair, if any.
    pub fn accepted(&self) -> Option<(ProposalNumber, String)> {
        self.state.lock().accepted.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::role::testing::Mailbox;

    use super::*;

    fn acceptor(learners: &[usize]) -> (Acceptor<Mailbox>, Mailbox) {
        let mailbox = Mailbox::default();
        let learners = learners.iter().copied().collect();
        (Acceptor::new(1, learners, mailbox.clone()), mailbox)
    }

    fn number(sequence: u64, proposer: usize) -> ProposalNumber {
        ProposalNumber { sequence, proposer }
    }

    #[test]
    fn promises_fresh_prepare() {
        let (acceptor, mailbox) = acceptor(&[]);
        acceptor.handle_prepare(Prepare { from: 2, number: number(1, 2) }, 2);
        let sent = mailbox.take();
        assert_eq!(1, sent.len());
        assert_eq!(
            (2, Message::Promise(Promise { from: 1, number: number(1, 2), accepted: None })),
            sent[0],
        );
        assert_eq!(Some(number(1, 2)), acceptor.promised());
    }

    #[test]
    fn ignores_prepare_below_promised() {
        let (acceptor, mailbox) = acceptor(&[]);
        acceptor.handle_prepare(Prepare { from: 2, number: number(5, 2) }, 2);
        mailbox.take();
        acceptor.handle_prepare(Prepare { from: 3, number: number(4, 3) }, 3);
        assert!(mailbox.is_empty());
        assert_eq!(Some(number(5, 2)), acceptor.promised());
    }

    #[test]
    fn repromises_equal_number() {
        let (acceptor, mailbox) = acceptor(&[]);
        let prepare = Prepare { from: 2, number: number(3, 2) };
        acceptor.handle_prepare(prepare.clone(), 2);
        acceptor.handle_prepare(prepare, 2);
        assert_eq!(2, mailbox.take().len());
        assert_eq!(Some(number(3, 2)), acceptor.promised());
    }

    #[test]
    fn accept_notifies_requester_and_learners() {
        let (acceptor, mailbox) = acceptor(&[4, 5]);
        let request = AcceptRequest { from: 2, number: number(1, 2), value: "X".to_owned() };
        acceptor.handle_accept_request(request, 2);
        let sent = mailbox.take();
        let expected = Message::Accepted(Accepted {
            from: 1,
            number: number(1, 2),
            value: "X".to_owned(),
        });
        assert_eq!(3, sent.len());
        assert_eq!((2, expected.clone()), sent[0]);
        let mut learners = sent[1..].iter().map(|(id, _)| *id).collect::<Vec<_>>();
        learners.sort();
        assert_eq!(vec![4, 5], learners);
        assert!(sent[1..].iter().all(|(_, message)| *message == expected));
        assert_eq!(Some((number(1, 2), "X".to_owned())), acceptor.accepted());
    }

    #[test]
    fn ignores_accept_request_below_promised() {
        let (acceptor, mailbox) = acceptor(&[]);
        acceptor.handle_prepare(Prepare { from: 2, number: number(5, 2) }, 2);
        mailbox.take();
        let request = AcceptRequest { from: 3, number: number(4, 3), value: "Y".to_owned() };
        acceptor.handle_accept_request(request, 3);
        assert!(mailbox.is_empty());
        assert_eq!(None, acceptor.accepted());
    }

    #[test]
    fn promise_reports_prior_accept() {
        let (acceptor, mailbox) = acceptor(&[]);
        let request = AcceptRequest { from: 2, number: number(1, 2), value: "X".to_owned() };
        acceptor.handle_accept_request(request, 2);
        mailbox.take();
        acceptor.handle_prepare(Prepare { from: 3, number: number(2, 3) }, 3);
        let sent = mailbox.take();
        assert_eq!(
            (3, Message::Promise(Promise {
                from: 1,
                number: number(2, 3),
                accepted: Some((number(1, 2), "X".to_owned())),
            })),
            sent[0],
        );
    }

    #[test]
    fn promised_is_monotonic_non_decreasing() {
        let (acceptor, _mailbox) = acceptor(&[]);
        let mut highest = None;
        for sequence in [1, 3, 2, 5, 4, 5, 7] {
            acceptor.handle_prepare(Prepare { from: 2, number: number(sequence, 2) }, 2);
            let promised = acceptor.promised();
            assert!(promised >= highest);
            highest = promised;
        }
        assert_eq!(Some(number(7, 2)), highest);
    }
}
