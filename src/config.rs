//! Node configuration.
//!
//! A node is configured with its public host string, the hash function that
//! places hosts on the ring, and the ring bit-width M. The reference setup is
//! SHA-1 with M = 160; a narrow test ring (M = 3) is supported for exercising
//! wrap-around arithmetic by hand.

use crate::id::Id;
use digest::Digest;
use serde::Deserialize;
use sha1::Sha1;
use sha2::Sha256;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Ring bit-width M for the reference SHA-1 setup: the full digest width,
/// so host identifiers are the digest itself.
pub const DEFAULT_HASH_BITS: usize = 160;

/// Capacity hint handed to collaborators; the engine itself never reads it.
pub const DEFAULT_NUM_NODES: usize = 8;

/// How often a node verifies its successor and announces itself to it.
/// Ring repair after a membership change takes a few of these periods.
pub const DEFAULT_STABILIZE_INTERVAL: Duration = Duration::from_millis(50);

/// How often one finger-table slot is refreshed. A full table pass takes
/// M periods, so lookup routing converges slower than the successor ring.
pub const DEFAULT_FIX_FINGER_INTERVAL: Duration = Duration::from_millis(50);

/// The configured hash function placing hosts on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HashKind {
    #[serde(rename = "sha1")]
    Sha1,
    #[serde(rename = "sha256")]
    Sha256,
}

impl HashKind {
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashKind::Sha1 => Sha1::digest(data).to_vec(),
            HashKind::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    /// Digest width in bits; an upper bound for the ring bit-width.
    pub fn output_bits(&self) -> usize {
        match self {
            HashKind::Sha1 => 160,
            HashKind::Sha256 => 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Public address string other peers use to reach this node.
    pub host: String,
    pub hash: HashKind,
    /// Ring bit-width M.
    pub hash_bits: usize,
    /// Capacity hint, not used by the protocol itself.
    pub num_nodes: usize,
    pub stabilize_interval: Duration,
    pub fix_finger_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("ring width {bits} exceeds the {max} bits the hash produces")]
    BitsTooWide { bits: usize, max: usize },

    #[error("ring width must be at least one bit")]
    BitsZero,
}

/// On-disk shape; every field except the host falls back to a default.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Host")]
    host: String,
    #[serde(rename = "Hash")]
    hash: Option<HashKind>,
    #[serde(rename = "NumBits")]
    num_bits: Option<usize>,
    #[serde(rename = "NumNodes")]
    num_nodes: Option<usize>,
    #[serde(rename = "StabilizeIntervalMs")]
    stabilize_interval_ms: Option<u64>,
    #[serde(rename = "FixFingerIntervalMs")]
    fix_finger_interval_ms: Option<u64>,
}

impl Config {
    /// Reference configuration: SHA-1, a 160-bit ring, 50 ms maintenance.
    pub fn new(host: impl Into<String>) -> Config {
        Config {
            host: host.into(),
            hash: HashKind::Sha1,
            hash_bits: DEFAULT_HASH_BITS,
            num_nodes: DEFAULT_NUM_NODES,
            stabilize_interval: DEFAULT_STABILIZE_INTERVAL,
            fix_finger_interval: DEFAULT_FIX_FINGER_INTERVAL,
        }
    }

    /// A 3-bit ring; eight slots make arc placement easy to reason about.
    pub fn for_testing(host: impl Into<String>) -> Config {
        Config {
            hash_bits: 3,
            ..Config::new(host)
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_slice(&bytes)?;

        let mut config = Config::new(file.host);
        if let Some(hash) = file.hash {
            config.hash = hash;
        }
        if let Some(bits) = file.num_bits {
            config.hash_bits = bits;
        }
        if let Some(n) = file.num_nodes {
            config.num_nodes = n;
        }
        if let Some(ms) = file.stabilize_interval_ms {
            config.stabilize_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.fix_finger_interval_ms {
            config.fix_finger_interval = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_bits == 0 {
            return Err(ConfigError::BitsZero);
        }
        if self.hash_bits > self.hash.output_bits() {
            return Err(ConfigError::BitsTooWide {
                bits: self.hash_bits,
                max: self.hash.output_bits(),
            });
        }
        Ok(())
    }

    /// This node's own ring identifier.
    pub fn id(&self) -> Id {
        self.id_of(&self.host)
    }

    /// Place an arbitrary host string on the ring.
    pub fn id_of(&self, host: &str) -> Id {
        Id::from_be_bytes(&self.hash.digest(host.as_bytes()), self.hash_bits)
    }
}
