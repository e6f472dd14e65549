//! Protocol-level error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Outbound request failed: connect, timeout, or a bad status line.
    /// Always recoverable; maintenance cycles log it and move on.
    #[error("transport: {0}")]
    Transport(String),

    /// The queried peer has no predecessor yet. Not a ring-level fault.
    #[error("no predecessor")]
    NoPredecessor,

    /// The successor reference was observed unset before a stabilize cycle.
    #[error("no successor")]
    NoSuccessor,

    /// A mutating request was submitted after stop, or the event queue is full.
    #[error("server stopped")]
    ServerStopped,

    #[error("server already running")]
    AlreadyRunning,

    #[error("server already stopped")]
    AlreadyStopped,

    #[error("decode: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("encode: {0}")]
    Encode(#[from] prost::EncodeError),
}
