//! Wire messages for the four protocol operations.
//!
//! The messages travel as a tagged binary schema compatible with protocol
//! buffers; the field numbers are part of the wire contract and never move
//! (`id` = 1, `host` = 2, `target_host` = 3). `get_predecessor` and
//! `get_successor` requests carry no body, so only their responses appear
//! here. Decoding an encoded message reproduces it field for field.

use crate::id::Id;
use crate::node::RemoteRef;

/// Ask the receiver for the successor of `id`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindSuccessorRequest {
    /// Target identifier, big-endian ring bytes.
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    /// Host of the requester.
    #[prost(string, tag = "2")]
    pub host: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindSuccessorResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(string, tag = "2")]
    pub host: String,
}

/// "I may be your predecessor", sent to the successor during stabilization.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyRequest {
    /// Identifier of the sender.
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    /// Host of the sender.
    #[prost(string, tag = "2")]
    pub host: String,
    /// Host of the receiver; a routing hint for the transport, not part of
    /// the semantic payload.
    #[prost(string, tag = "3")]
    pub target_host: String,
}

/// Empty when the receiver kept its current predecessor.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(string, tag = "2")]
    pub host: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPredecessorResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(string, tag = "2")]
    pub host: String,
}

impl FindSuccessorRequest {
    pub fn new(id: &Id, host: impl Into<String>) -> Self {
        FindSuccessorRequest {
            id: id.to_vec(),
            host: host.into(),
        }
    }
}

impl NotifyRequest {
    pub fn new(id: &Id, host: impl Into<String>, target_host: impl Into<String>) -> Self {
        NotifyRequest {
            id: id.to_vec(),
            host: host.into(),
            target_host: target_host.into(),
        }
    }
}

impl NotifyResponse {
    /// The "no change" reply.
    pub fn empty() -> Self {
        NotifyResponse::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.host.is_empty()
    }
}

impl From<&RemoteRef> for FindSuccessorResponse {
    fn from(remote: &RemoteRef) -> Self {
        FindSuccessorResponse {
            id: remote.id.to_vec(),
            host: remote.host.clone(),
        }
    }
}

impl From<&RemoteRef> for NotifyResponse {
    fn from(remote: &RemoteRef) -> Self {
        NotifyResponse {
            id: remote.id.to_vec(),
            host: remote.host.clone(),
        }
    }
}

impl From<&RemoteRef> for GetPredecessorResponse {
    fn from(remote: &RemoteRef) -> Self {
        GetPredecessorResponse {
            id: remote.id.to_vec(),
            host: remote.host.clone(),
        }
    }
}
