//! Single-decree Paxos among a fixed council of members, each playing
//! proposer, acceptor, and learner at once.

mod config;
mod error;
mod message;
mod node;
mod role;
mod server;
mod shared;
mod socket;

pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::message::{AcceptRequest, Accepted, Message, Prepare, Promise, ProposalNumber};
pub use crate::node::Node;
pub use crate::role::{Acceptor, Learner, Proposer};
pub use crate::server::Server;
pub use crate::shared::{Shared, Transport};
