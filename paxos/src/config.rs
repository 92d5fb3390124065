//! # Summary
//!
//! Membership configuration for a single node. Rather than a shared global
//! registry, every node receives an explicit membership table mapping member
//! IDs to socket addresses, loaded from a file with one `id,host,port` line
//! per member.

use std::net::SocketAddr;
use std::path::Path;

use hashbrown::HashMap as Map;

use crate::error::Error;

#[derive(Clone, Debug)]
pub struct Config {
    /// Unique member ID
    id: usize,

    /// Socket address of every member, including this one
    members: Map<usize, SocketAddr>,
}

impl Config {
    pub fn new(id: usize, members: Map<usize, SocketAddr>) -> Self {
        Config { id, members }
    }

    /// Reads a membership file for the given member. Lines are
    /// `id,host,port`; empty lines and lines starting with `#` are skipped.
    pub fn load<P: AsRef<Path>>(id: usize, path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(id, &text)
    }

    pub fn parse(id: usize, text: &str) -> Result<Self, Error> {
        let mut members = Map::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || Error::Config(line.to_owned());
            let mut fields = line.split(',');
            let member = fields
                .next()
                .and_then(|field| field.trim().parse::<usize>().ok())
                .ok_or_else(malformed)?;
            let host = fields.next().map(str::trim).ok_or_else(malformed)?;
            let port = fields
                .next()
                .and_then(|field| field.trim().parse::<u16>().ok())
                .ok_or_else(malformed)?;
            let addr = format!("{}:{}", host, port)
                .parse::<SocketAddr>()
                .map_err(|_| malformed())?;
            members.insert(member, addr);
        }
        if !members.contains_key(&id) {
            return Err(Error::Config(format!("no entry for member {}", id)));
        }
        Ok(Config { id, members })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Socket address of this member. Fails if the membership table has no
    /// entry for this member's own ID.
    pub fn addr(&self) -> Result<SocketAddr, Error> {
        self.members
            .get(&self.id)
            .copied()
            .ok_or_else(|| Error::Config(format!("no entry for member {}", self.id)))
    }

    /// IDs of all members, including this one.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.keys().copied()
    }

    /// IDs and addresses of all members except this one.
    pub fn peers(&self) -> impl Iterator<Item = (usize, SocketAddr)> + '_ {
        self.members
            .iter()
            .filter(move |(id, _)| **id != self.id)
            .map(|(id, addr)| (*id, *addr))
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Quorum size: ⌊N/2⌋ + 1 out of N acceptors.
    pub fn majority(&self) -> usize {
        self.members.len() / 2 + 1
    }
}
