//! # Summary
//!
//! This module contains the three role state machines of single-decree
//! Paxos. Every member plays all three roles at once.
//!
//! Each role guards its mutable state with its own lock, and no handler
//! ever takes another role's lock, so roles cannot deadlock against each
//! other. Handlers are short critical sections that never block waiting
//! for a reply; correctness depends only on proposal-number comparisons,
//! never on message arrival order.

/// Votes on proposals; the source of safety.
pub(crate) mod acceptor;

/// Detects majority agreement and exposes the learned value.
pub(crate) mod learner;

/// Drives a round through the prepare and accept phases.
pub(crate) mod proposer;

pub use acceptor::Acceptor;
pub use learner::Learner;
pub use proposer::Proposer;
