//! # Summary
//!
//! This module defines the `Learner` role, which watches `Accepted`
//! reports and declares a value learned once a majority of distinct
//! acceptors agree on the same (number, value) pair. A learned fact is
//! immutable: the mapping for a proposal number is written at most once
//! and never overwritten.

use hashbrown::{HashMap as Map, HashSet as Set};
use log::{info, trace};
use parking_lot::Mutex;

use crate::message::{Accepted, ProposalNumber};

pub struct Learner {
    /// Unique ID of this member
    id: usize,

    /// Quorum size: ⌊N/2⌋ + 1 out of all acceptors
    majority: usize,

    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Acceptors that reported each not-yet-learned (number, value) pair.
    /// Set semantics: a duplicated report counts once.
    votes: Map<(ProposalNumber, String), Set<usize>>,

    /// Learned values, keyed by proposal number
    learned: Map<ProposalNumber, String>,

    /// Most recently learned number
    last: Option<ProposalNumber>,
}

impl Learner {
    pub fn new(id: usize, majority: usize) -> Self {
        Learner {
            id,
            majority,
            state: Mutex::new(State::default()),
        }
    }

    /// Adds the sender to the tracking set for the report's (number, value)
    /// key. The first time the set reaches a majority, records the value as
    /// learned and discards every tracking set for that number.
    pub fn handle_accepted(&self, accepted: Accepted) {
        let mut state = self.state.lock();
        if state.learned.contains_key(&accepted.number) {
            trace!(
                "[learner {}] ignoring accepted for already learned {}",
                self.id, accepted.number,
            );
            return;
        }

        let key = (accepted.number, accepted.value);
        let reached = {
            let votes = state.votes.entry(key.clone()).or_default();
            votes.insert(accepted.from);
            votes.len() >= self.majority
        };
        if !reached {
            return;
        }

        let (number, value) = key;
        state.votes.retain(|(tracked, _), _| *tracked != number);
        info!("[learner {}] learned value {:?} for {}", self.id, value, number);
        state.learned.insert(number, value);
        state.last = Some(number);
    }

    /// Value of the most recently learned number, if any.
    pub fn last_learned(&self) -> Option<String> {
        let state = self.state.lock();
        state.last.and_then(|number| state.learned.get(&number).cloned())
    }

    /// Learned value for a specific proposal number, if any.
    pub fn learned(&self, number: ProposalNumber) -> Option<String> {
        self.state.lock().learned.get(&number).cloned()
    }
}
