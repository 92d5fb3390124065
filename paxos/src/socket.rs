//! # Summary
//!
//! This module abstracts over external connections to peer members.
//!
//! Peers exchange length-delimited frames over TCP, each carrying a
//! bincode-encoded value. Decoding yields an explicit `Result` so the
//! connection task can log and drop a malformed frame instead of dying.

use std::marker::PhantomData;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::Error;

/// Receiving half. Expects length-delimited, bincode-encoded data of type `R`.
pub struct Rx<R> {
    inner: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    _marker: PhantomData<R>,
}

/// Transmitting half. Sends length-delimited, bincode-encoded data of type `T`.
pub struct Tx<T> {
    inner: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    _marker: PhantomData<T>,
}

/// Splits a TCP stream into typed receiving and transmitting halves.
pub fn split<R, T>(stream: TcpStream) -> (Rx<R>, Tx<T>) {
    let (read, write) = stream.into_split();
    let rx = Rx {
        inner: FramedRead::new(read, LengthDelimitedCodec::new()),
        _marker: PhantomData,
    };
    let tx = Tx {
        inner: FramedWrite::new(write, LengthDelimitedCodec::new()),
        _marker: PhantomData,
    };
    (rx, tx)
}

impl<R: serde::de::DeserializeOwned> Rx<R> {
    /// Next frame, decoded. Returns `None` once the peer hangs up; a
    /// malformed frame yields `Some(Err(_))` without closing the stream.
    pub async fn recv(&mut self) -> Option<Result<R, Error>> {
        match self.inner.next().await? {
        | Ok(bytes) => Some(bincode::deserialize(&bytes).map_err(Error::from)),
        | Err(error) => Some(Err(Error::from(error))),
        }
    }
}

impl<T: serde::Serialize> Tx<T> {
    pub async fn send(&mut self, item: &T) -> Result<(), Error> {
        let bytes = bincode::serialize(item)?;
        self.inner.send(Bytes::from(bytes)).await.map_err(Error::from)
    }
}
