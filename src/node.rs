//! Per-node ring state: successor, predecessor, and the finger table.
//!
//! The node owns one lock over all routing state; getters take read access
//! and setters write access, and no guard is ever held across transport I/O.
//! Peers are referenced by value (`RemoteRef` snapshots); the overlay graph
//! is cyclic, so nothing here owns another node.

use crate::config::Config;
use crate::id::{self, Id};
use serde::Serialize;
use tokio::sync::RwLock;

/// A `(id, host)` snapshot naming a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub id: Id,
    pub host: String,
}

impl RemoteRef {
    pub fn new(id: Id, host: impl Into<String>) -> RemoteRef {
        RemoteRef {
            id,
            host: host.into(),
        }
    }

    /// Rebuild a reference from wire bytes, normalizing the identifier to
    /// the local ring width.
    pub fn from_wire(id: &[u8], host: &str, bits: usize) -> RemoteRef {
        RemoteRef::new(Id::from_be_bytes(id, bits), host)
    }
}

/// One finger-table slot: the peer believed to own `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerEntry {
    /// `power_offset(self.id, i, M)` for this slot's index `i`.
    pub start: Id,
    pub node: RemoteRef,
}

/// Serializable view of one finger slot, for the diagnostic dump.
#[derive(Debug, Clone, Serialize)]
pub struct FingerInfo {
    pub index: usize,
    pub start: String,
    pub id: Option<String>,
    pub host: Option<String>,
}

struct RingState {
    successor: RemoteRef,
    predecessor: Option<RemoteRef>,
    finger: Vec<Option<FingerEntry>>,
    finger_cursor: usize,
}

pub struct Node {
    id: Id,
    host: String,
    hash_bits: usize,
    state: RwLock<RingState>,
}

impl Node {
    /// A fresh node is a one-element ring: its successor is itself and its
    /// predecessor is unset until a notify is accepted or a join completes.
    pub fn new(config: &Config) -> Node {
        let id = config.id();
        let successor = RemoteRef::new(id.clone(), &config.host);
        Node {
            id,
            host: config.host.clone(),
            hash_bits: config.hash_bits,
            state: RwLock::new(RingState {
                successor,
                predecessor: None,
                finger: vec![None; config.hash_bits],
                // One step before slot zero, so the first refresh lands there.
                finger_cursor: config.hash_bits - 1,
            }),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn hash_bits(&self) -> usize {
        self.hash_bits
    }

    pub fn self_ref(&self) -> RemoteRef {
        RemoteRef::new(self.id.clone(), &self.host)
    }

    pub async fn successor(&self) -> RemoteRef {
        self.state.read().await.successor.clone()
    }

    pub async fn set_successor(&self, successor: RemoteRef) {
        self.state.write().await.successor = successor;
    }

    pub async fn predecessor(&self) -> Option<RemoteRef> {
        self.state.read().await.predecessor.clone()
    }

    pub async fn set_predecessor(&self, predecessor: RemoteRef) {
        self.state.write().await.predecessor = Some(predecessor);
    }

    /// Advance the round-robin cursor and return the slot to refresh next.
    pub async fn advance_finger_cursor(&self) -> usize {
        let mut state = self.state.write().await;
        state.finger_cursor = (state.finger_cursor + 1) % self.hash_bits;
        state.finger_cursor
    }

    /// The start identifier of slot `i`, whether or not the slot is filled.
    pub async fn finger_start(&self, i: usize) -> Id {
        match &self.state.read().await.finger[i] {
            Some(entry) => entry.start.clone(),
            None => id::power_offset(&self.id, i, self.hash_bits),
        }
    }

    pub async fn finger(&self, i: usize) -> Option<FingerEntry> {
        self.state.read().await.finger[i].clone()
    }

    pub async fn set_finger(&self, i: usize, node: RemoteRef) {
        let start = id::power_offset(&self.id, i, self.hash_bits);
        self.state.write().await.finger[i] = Some(FingerEntry { start, node });
    }

    /// The filled finger closest before `key`: scanning from the widest slot
    /// down, the first entry whose node lies strictly between this node and
    /// `key`. Entries pointing at this node itself never qualify, so a
    /// lookup cannot forward to itself.
    pub async fn closest_preceding_node(&self, key: &Id) -> Option<RemoteRef> {
        let state = self.state.read().await;
        for slot in state.finger.iter().rev() {
            if let Some(entry) = slot
                && id::between(&self.id, key, &entry.node.id)
            {
                return Some(entry.node.clone());
            }
        }
        None
    }

    /// Snapshot of the finger table for the diagnostic endpoint.
    pub async fn finger_table(&self) -> Vec<FingerInfo> {
        let state = self.state.read().await;
        state
            .finger
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(entry) => FingerInfo {
                    index,
                    start: entry.start.to_string(),
                    id: Some(entry.node.id.to_string()),
                    host: Some(entry.node.host.clone()),
                },
                None => FingerInfo {
                    index,
                    start: id::power_offset(&self.id, index, self.hash_bits).to_string(),
                    id: None,
                    host: None,
                },
            })
            .collect()
    }
}
