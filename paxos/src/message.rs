//! # Summary
//!
//! This module defines the proposal-number ordering scheme and the four
//! protocol messages exchanged between members. Proposal numbers order by
//! sequence first and proposer ID second, so two proposers can never mint
//! an equal number as long as each keeps its own sequence strictly
//! increasing. All protocol safety reduces to comparisons on this type.

use std::fmt;
use std::str;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Totally-ordered round identifier. Canonical text form is
/// `P<proposer>:<sequence>`, e.g. `P1:5` for proposer 1, sequence 5.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber {
    /// Per-proposer sequence counter. Compared first.
    pub sequence: u64,

    /// Unique ID of the minting proposer. Tie-break.
    pub proposer: usize,
}

impl ProposalNumber {
    pub fn new(sequence: u64, proposer: usize) -> Self {
        ProposalNumber { sequence, proposer }
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "P{}:{}", self.proposer, self.sequence)
    }
}

impl str::FromStr for ProposalNumber {
    type Err = Error;
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::Format(raw.to_owned());
        let (proposer, sequence) = raw
            .strip_prefix('P')
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(malformed)?;
        let proposer = proposer.parse::<usize>().map_err(|_| malformed())?;
        let sequence = sequence.parse::<u64>().map_err(|_| malformed())?;
        Ok(ProposalNumber { sequence, proposer })
    }
}

/// Sent by proposers to all acceptors to open a round.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prepare {
    pub from: usize,
    pub number: ProposalNumber,
}

/// Sent by acceptors in response to a `Prepare` they can honor. Reports
/// the most recently accepted (number, value) pair, if any.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promise {
    pub from: usize,
    pub number: ProposalNumber,
    pub accepted: Option<(ProposalNumber, String)>,
}

/// Sent by proposers to all acceptors once a majority has promised.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptRequest {
    pub from: usize,
    pub number: ProposalNumber,
    pub value: String,
}

/// Sent by acceptors to the requesting proposer and to all learners.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub from: usize,
    pub number: ProposalNumber,
    pub value: String,
}

/// Type-tagged protocol message. The tag drives dispatch; an unrecognized
/// tag fails to decode and the frame is dropped.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Prepare(Prepare),
    Promise(Promise),
    AcceptRequest(AcceptRequest),
    Accepted(Accepted),
}

impl Message {
    /// ID of the member that produced this message.
    pub fn sender(&self) -> usize {
        match self {
        | Message::Prepare(prepare) => prepare.from,
        | Message::Promise(promise) => promise.from,
        | Message::AcceptRequest(request) => request.from,
        | Message::Accepted(accepted) => accepted.from,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        bincode::deserialize(bytes).map_err(Error::from)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        bincode::serialize(self).map_err(Error::from)
    }
}
