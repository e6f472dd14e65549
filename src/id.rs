//! Identifier-space arithmetic for the Chord ring.
//!
//! Identifiers are unsigned integers modulo 2^M, carried as fixed-width
//! big-endian byte strings so that byte order equals numeric order. All arc
//! predicates answer "is `key` on the clockwise arc from `a` to `b`",
//! differing only in endpoint inclusivity.

use num_bigint::BigUint;
use num_traits::One;
use std::cmp::Ordering;
use std::fmt;

/// Bytes needed to carry an M-bit identifier.
pub fn id_width(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// A ring identifier: an unsigned integer modulo 2^M in big-endian bytes.
///
/// All identifiers on one ring share the same width, so the derived
/// lexicographic ordering is the unsigned numeric ordering.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Vec<u8>);

impl Id {
    /// Interpret an arbitrary big-endian byte string (a raw digest, or bytes
    /// off the wire) as a value modulo 2^bits, normalized to the ring width.
    pub fn from_be_bytes(bytes: &[u8], bits: usize) -> Id {
        let value = BigUint::from_bytes_be(bytes) % modulus(bits);
        Id::from_biguint(&value, bits)
    }

    /// Build an identifier from an already-reduced value.
    pub fn from_biguint(value: &BigUint, bits: usize) -> Id {
        let width = id_width(bits);
        let raw = value.to_bytes_be();
        debug_assert!(raw.len() <= width, "value wider than the ring");
        let mut bytes = vec![0u8; width - raw.len().min(width)];
        bytes.extend_from_slice(&raw);
        Id(bytes)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(&self.0))
    }
}

fn modulus(bits: usize) -> BigUint {
    BigUint::one() << bits
}

/// `(id + 2^i) mod 2^bits`: the start of finger slot `i`.
pub fn power_offset(id: &Id, i: usize, bits: usize) -> Id {
    let sum = id.to_biguint() + (BigUint::one() << i);
    Id::from_biguint(&(sum % modulus(bits)), bits)
}

/// Strict arc membership: `key` lies strictly between `a` and `b` clockwise.
///
/// The degenerate arc `a == b` spans the whole ring minus the endpoint.
pub fn between(a: &Id, b: &Id, key: &Id) -> bool {
    match a.cmp(b) {
        Ordering::Less => a < key && key < b,
        Ordering::Greater => key > a || key < b,
        Ordering::Equal => key != a,
    }
}

/// Arc membership with `a` included and `b` excluded.
pub fn between_left_incl(a: &Id, b: &Id, key: &Id) -> bool {
    match a.cmp(b) {
        Ordering::Less => a <= key && key < b,
        Ordering::Greater => key >= a || key < b,
        Ordering::Equal => true,
    }
}

/// Arc membership with `a` excluded and `b` included. This is the ownership
/// test: `key` in `(self, successor]` belongs to the successor.
pub fn between_right_incl(a: &Id, b: &Id, key: &Id) -> bool {
    match a.cmp(b) {
        Ordering::Less => a < key && key <= b,
        Ordering::Greater => key > a || key <= b,
        Ordering::Equal => true,
    }
}
