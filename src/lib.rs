//! A Chord distributed-hash-table overlay node.
//!
//! Peers arrange themselves on a virtual identifier ring and answer "which
//! peer is responsible for key K?" in O(log N) hops. Every node runs the
//! same engine: ring arithmetic, a successor/predecessor pair with a finger
//! table, four wire operations, and two periodic maintenance routines that
//! keep the ring healed as peers come and go.

pub mod config;
pub mod error;
pub mod id;
pub mod message;
pub mod node;
pub mod server;
pub mod transport;

pub use config::{Config, ConfigError, HashKind};
pub use error::{Error, Result};
pub use id::Id;
pub use message::{
    FindSuccessorRequest, FindSuccessorResponse, GetPredecessorResponse, NotifyRequest,
    NotifyResponse,
};
pub use node::{FingerEntry, FingerInfo, Node, RemoteRef};
pub use server::{Command, EVENT_QUEUE_CAPACITY, Server, State};
pub use transport::{HttpTransport, Transport, router};
