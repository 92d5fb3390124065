//! # Summary
//!
//! This module defines the `Proposer` role, which drives a consensus round
//! through two phases: prepare/promise, then accept-request/accepted.
//!
//! Round bookkeeping is reset completely on every `propose` call, and a
//! reply only counts if it carries the current round's exact number. The
//! stale-round guard is what keeps an old round's replies from corrupting
//! a newer round's state.

use hashbrown::{HashMap as Map, HashSet as Set};
use log::{debug, info, trace};
use parking_lot::Mutex;

use crate::message::{AcceptRequest, Accepted, Message, Prepare, Promise, ProposalNumber};
use crate::shared::Transport;

pub struct Proposer<T> {
    /// Unique ID of this member
    id: usize,

    /// IDs of all acceptors in the membership
    acceptors: Set<usize>,

    /// IDs of all learners to notify once a value is chosen
    learners: Set<usize>,

    /// Quorum size: ⌊N/2⌋ + 1
    majority: usize,

    transport: T,

    round: Mutex<Round>,
}

/// Per-round state, discarded and rebuilt by each `propose` call.
#[derive(Default)]
struct Round {
    /// Strictly increasing across every round this proposer starts
    sequence: u64,

    /// Number of the in-flight round
    number: ProposalNumber,

    /// Candidate value; may be overridden by a reported prior acceptance
    value: Option<String>,

    /// Promises received this round, keyed by acceptor
    promises: Map<usize, Promise>,

    /// Acceptors that reported acceptance this round
    accepted: Set<usize>,

    /// Latch: the accept request is broadcast exactly once per round
    requested: bool,

    /// Latch: learners are notified of the chosen value exactly once
    chosen: bool,
}

impl<T: Transport> Proposer<T> {
    pub fn new(
        id: usize,
        acceptors: Set<usize>,
        learners: Set<usize>,
        majority: usize,
        transport: T,
    ) -> Self {
        Proposer {
            id,
            acceptors,
            learners,
            majority,
            transport,
            round: Mutex::new(Round::default()),
        }
    }

    /// Opens a new round for `value`: mints a fresh proposal number above
    /// every number this proposer has used before, discards all bookkeeping
    /// from prior rounds, and broadcasts a prepare to every acceptor.
    pub fn propose(&self, value: &str) {
        let mut round = self.round.lock();
        round.sequence += 1;
        round.number = ProposalNumber::new(round.sequence, self.id);
        round.value = Some(value.to_owned());
        round.promises.clear();
        round.accepted.clear();
        round.requested = false;
        round.chosen = false;
        info!(
            "[proposer {}] starting round {} with candidate {:?}",
            self.id, round.number, value,
        );
        let prepare = Message::Prepare(Prepare { from: self.id, number: round.number });
        for acceptor in &self.acceptors {
            self.transport.send(*acceptor, prepare.clone());
        }
    }

    /// Records a promise for the current round. The first time distinct
    /// promisers reach a majority, broadcasts the accept request, carrying
    /// the value accepted at the highest number any acceptor reported, or
    /// our own candidate if none did.
    pub fn handle_promise(&self, promise: Promise) {
        let mut round = self.round.lock();
        if promise.number != round.number {
            trace!(
                "[proposer {}] ignoring promise for {}, current round is {}",
                self.id, promise.number, round.number,
            );
            return;
        }

        round.promises.insert(promise.from, promise);

        // Once the accept request is on the wire the round's value is
        // fixed; a late promise must not rewrite what acceptors are
        // already voting on.
        if round.requested {
            return;
        }

        // Safety rule: must propose the value already accepted at the
        // highest number any acceptor reports this round.
        let adopted = round
            .promises
            .values()
            .filter_map(|promise| promise.accepted.as_ref())
            .max_by_key(|pair| pair.0)
            .map(|pair| pair.1.clone());
        if let Some(value) = adopted {
            if round.value.as_deref() != Some(&value) {
                debug!(
                    "[proposer {}] adopting previously accepted value {:?}",
                    self.id, value,
                );
            }
            round.value = Some(value);
        }

        if round.promises.len() < self.majority {
            return;
        }
        let Some(value) = round.value.clone() else {
            return;
        };
        round.requested = true;
        info!(
            "[proposer {}] round {} promised by majority, requesting acceptance of {:?}",
            self.id, round.number, value,
        );
        let request = Message::AcceptRequest(AcceptRequest {
            from: self.id,
            number: round.number,
            value,
        });
        for acceptor in &self.acceptors {
            self.transport.send(*acceptor, request.clone());
        }
    }

    /// Records an acceptance for the current round. The first time distinct
    /// acceptors reach a majority, the value is chosen and every learner is
    /// notified with an `Accepted` broadcast.
    pub fn handle_accepted(&self, accepted: Accepted) {
        let mut round = self.round.lock();
        if accepted.number != round.number {
            trace!(
                "[proposer {}] ignoring accepted for {}, current round is {}",
                self.id, accepted.number, round.number,
            );
            return;
        }

        round.accepted.insert(accepted.from);
        if round.chosen || round.accepted.len() < self.majority {
            return;
        }
        round.chosen = true;
        let value = round.value.clone().unwrap_or(accepted.value);
        info!(
            "[proposer {}] round {} chose value {:?}",
            self.id, round.number, value,
        );
        let notify = Message::Accepted(Accepted {
            from: self.id,
            number: round.number,
            value,
        });
        for learner in &self.learners {
            self.transport.send(*learner, notify.clone());
        }
    }

    /// Number of the in-flight round.
    pub fn current_round(&self) -> ProposalNumber {
        self.round.lock().number
    }

    /// Candidate value of the in-flight round.
    pub fn candidate(&self) -> Option<String> {
        self.round.lock().value.clone()
    }
}
