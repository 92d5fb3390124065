//! # Summary
//!
//! Error taxonomy for the protocol core. Note that stale-round replies are
//! *not* represented here: a promise or acceptance for a round other than
//! the current one is ignored by design, and handlers treat it as a silent
//! no-op rather than an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A proposal number string that does not match `P<proposer>:<sequence>`.
    #[error("malformed proposal number: {0:?}")]
    Format(String),

    /// A membership file entry that does not match `<id>,<host>,<port>`.
    #[error("malformed membership entry: {0:?}")]
    Config(String),

    /// A frame that could not be decoded into a protocol message.
    #[error("malformed message: {0}")]
    Decode(#[from] bincode::Error),

    /// A transport-level failure. Never corrupts role state; the
    /// majority-based protocol already tolerates lost messages.
    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),
}
