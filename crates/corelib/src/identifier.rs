//! Ring identifier algebra (C1).
//!
//! Identifiers are fixed-width, big-endian byte strings modulo `2^M`
//! (`M = 160` with the canonical SHA-1 digest). Every comparison and
//! arithmetic operation here treats an `Identifier` as an unsigned integer,
//! never trimming leading zero bytes, so that lexical (derived `Ord`)
//! comparison of the fixed-size array always agrees with integer order.

use std::fmt;

/// Bit width of the ring namespace.
pub const M_BITS: usize = 160;
/// Byte width of an [`Identifier`].
pub const ID_BYTES: usize = M_BITS / 8;

/// A position on the ring: an unsigned big-endian integer modulo `2^160`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identifier(pub [u8; ID_BYTES]);

impl Identifier {
    pub const ZERO: Identifier = Identifier([0u8; ID_BYTES]);

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; ID_BYTES];
        let len = bytes.len().min(ID_BYTES);
        // Right-align: a shorter input is treated as having leading zero bytes.
        buf[ID_BYTES - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        Identifier(buf)
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", hex(&self.0))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Pluggable digest producing an `M`-bit [`Identifier`].
///
/// The spec names SHA-1 as the canonical choice but explicitly allows
/// implementers to parametrize; [`Sha1Hasher`] is the default used by
/// [`hash`], [`Blake3Hasher`] is a drop-in alternate.
pub trait IdentifierHasher {
    fn hash(bytes: &[u8]) -> Identifier;
}

pub struct Sha1Hasher;

impl IdentifierHasher for Sha1Hasher {
    fn hash(bytes: &[u8]) -> Identifier {
        use sha1::{Digest, Sha1};
        let digest = Sha1::digest(bytes);
        Identifier::from_bytes(&digest)
    }
}

/// Alternate hasher: BLAKE3's 32-byte output truncated to the ring's 20 bytes.
pub struct Blake3Hasher;

impl IdentifierHasher for Blake3Hasher {
    fn hash(bytes: &[u8]) -> Identifier {
        let digest = blake3::hash(bytes);
        Identifier::from_bytes(&digest.as_bytes()[..ID_BYTES])
    }
}

/// Hash `bytes` into an [`Identifier`] using the canonical SHA-1 digest.
pub fn hash(bytes: &[u8]) -> Identifier {
    Sha1Hasher::hash(bytes)
}

/// Clockwise distance from `a` to `b` on the ring, as an unsigned magnitude
/// one byte wider than [`Identifier`] (headroom for the carry during the
/// wrap-around subtraction; the result itself always fits in `2^160 - 1`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Distance(pub [u8; ID_BYTES + 1]);

impl Distance {
    pub const ZERO: Distance = Distance([0u8; ID_BYTES + 1]);
}

/// `|ring| = 2^160`, as a 21-byte big-endian magnitude.
fn ring_size() -> [u8; ID_BYTES + 1] {
    let mut buf = [0u8; ID_BYTES + 1];
    buf[0] = 1;
    buf
}

fn widen(id: &Identifier) -> [u8; ID_BYTES + 1] {
    let mut buf = [0u8; ID_BYTES + 1];
    buf[1..].copy_from_slice(&id.0);
    buf
}

/// Subtract `b` from `a` (both 21-byte magnitudes), assuming `a >= b`.
fn sub(a: &[u8; ID_BYTES + 1], b: &[u8; ID_BYTES + 1]) -> [u8; ID_BYTES + 1] {
    let mut out = [0u8; ID_BYTES + 1];
    let mut borrow = 0i16;
    for i in (0..ID_BYTES + 1).rev() {
        let mut diff = a[i] as i16 - b[i] as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = diff as u8;
    }
    out
}

fn add(a: &[u8; ID_BYTES + 1], b: &[u8; ID_BYTES + 1]) -> [u8; ID_BYTES + 1] {
    let mut out = [0u8; ID_BYTES + 1];
    let mut carry = 0u16;
    for i in (0..ID_BYTES + 1).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry;
        out[i] = (sum & 0xFF) as u8;
        carry = sum >> 8;
    }
    out
}

/// Clockwise distance from `a` to `b`: zero iff equal, `2^160 - a + b` when `a > b`.
pub fn distance(a: &Identifier, b: &Identifier) -> Distance {
    if a == b {
        return Distance::ZERO;
    }
    let (wa, wb) = (widen(a), widen(b));
    if a < b {
        Distance(sub(&wb, &wa))
    } else {
        let ring = ring_size();
        Distance(add(&sub(&ring, &wa), &wb))
    }
}

/// TRUE iff `k` lies strictly after `a` and strictly before `b` in ring
/// order (or `k == b` when `right_inclusive`). Handles the wrap case
/// `a > b` by treating the interval as `(a, MAX] ∪ [0, b]`. `a == b` is
/// the empty interval.
pub fn between(a: &Identifier, b: &Identifier, k: &Identifier, right_inclusive: bool) -> bool {
    if a == b {
        return false;
    }
    if a < b {
        if right_inclusive {
            a < k && k <= b
        } else {
            a < k && k < b
        }
    } else {
        // Wrapped interval: (a, MAX] union [0, b].
        if right_inclusive {
            k > a || k <= b
        } else {
            k > a || k < b
        }
    }
}

/// `(id + 2^exp) mod 2^mod_bits`, preserving the byte width of `id`.
pub fn power_offset(id: &Identifier, exp: u32, mod_bits: u32) -> Identifier {
    debug_assert!(mod_bits as usize == M_BITS);
    let mut offset = [0u8; ID_BYTES];
    if (exp as usize) < M_BITS {
        let byte_from_msb_end = ID_BYTES - 1 - (exp as usize / 8);
        offset[byte_from_msb_end] = 1 << (exp % 8);
    }
    // Plain mod-2^160 addition: since both operands are already < 2^160,
    // addition with byte-array carry propagation and truncation of any
    // carry out of the top byte is exactly addition mod 2^160.
    let mut out = [0u8; ID_BYTES];
    let mut carry = 0u16;
    for i in (0..ID_BYTES).rev() {
        let sum = id.0[i] as u16 + offset[i] as u16 + carry;
        out[i] = (sum & 0xFF) as u8;
        carry = sum >> 8;
    }
    Identifier(out)
}

/// From a list of local vnode identifiers sorted ascending, return the
/// greatest one strictly less than `key`, falling back to the last
/// (greatest) vnode if none qualifies — this is what makes lookups correct
/// across the wrap point.
pub fn nearest<'a, T>(sorted_by_id: &'a [T], key: &Identifier, id_of: impl Fn(&T) -> Identifier) -> &'a T {
    assert!(!sorted_by_id.is_empty(), "nearest() requires at least one vnode");
    for item in sorted_by_id.iter().rev() {
        if id_of(item) < *key {
            return item;
        }
    }
    &sorted_by_id[sorted_by_id.len() - 1]
}
