//! Vnode abstractions (C2).
//!
//! `Vnode` is the immutable remote handle exchanged on the wire (id + host).
//! `LocalVnode` is the mutable state machine owned by exactly one [`crate::ring::Ring`]
//! on one host: predecessor, successor list, finger table, and the stabilization
//! bookkeeping (`stabilized` counter, `last_stabilized` instant, per-vnode RNG).
//!
//! All interior mutability is behind a single lock per vnode — never a
//! ring-wide one — so stabilization, notify handlers, and lookup reads never
//! contend across vnodes.

use std::fmt;
use std::time::Instant;

use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::identifier::{hash, Identifier, M_BITS};

/// A remote handle to a vnode: identifier plus the host it lives on.
/// Equality is by `id`; immutable once observed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vnode {
    pub id: Identifier,
    pub host: String,
}

impl Vnode {
    pub fn new(id: Identifier, host: impl Into<String>) -> Self {
        Self { id, host: host.into() }
    }

    /// Derive a vnode's id deterministically from `(host, index)`.
    pub fn derive_id(host: &str, index: usize) -> Identifier {
        hash(format!("{host}:{index}").as_bytes())
    }
}

impl PartialEq for Vnode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Vnode {}

impl PartialOrd for Vnode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Vnode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Vnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vnode({}@{})", self.id, self.host)
    }
}

/// Mutable state guarded by a vnode's single lock.
#[derive(Default)]
pub struct VnodeState {
    pub predecessor: Option<Vnode>,
    /// Slot 0 is the immediate successor. May contain fewer than
    /// `num_successors` entries during bootstrap or isolation.
    pub successors: Vec<Vnode>,
    /// `finger[i]`, if present, is the known successor of `(id + 2^i) mod 2^M`.
    pub finger: Vec<Option<Vnode>>,
    pub stabilized: u64,
    pub last_stabilized: Option<Instant>,
    /// Round-robin cursor into `finger` advanced by `fix_fingers`.
    pub fix_finger_cursor: usize,
}

/// A vnode owned by this process. `self_handle` is the immutable `Vnode`
/// identity; `state` is the mutable predecessor/successors/finger triple,
/// all behind one lock so a stabilization round and a concurrent `notify`
/// handler never observe a torn update.
pub struct LocalVnode {
    pub self_handle: Vnode,
    pub state: RwLock<VnodeState>,
    /// Independent per-vnode RNG for stabilization jitter, seeded once.
    pub rng: parking_lot::Mutex<SmallRng>,
}

impl LocalVnode {
    pub fn new(host: &str, index: usize) -> Self {
        let id = Vnode::derive_id(host, index);
        Self {
            self_handle: Vnode::new(id, host.to_string()),
            state: RwLock::new(VnodeState {
                finger: vec![None; M_BITS],
                ..Default::default()
            }),
            rng: parking_lot::Mutex::new(SmallRng::from_rng(rand::thread_rng()).expect("seed rng")),
        }
    }

    pub fn id(&self) -> Identifier {
        self.self_handle.id
    }

    /// Snapshot of the handle for use as a map key / comparison without
    /// holding the state lock.
    pub fn handle(&self) -> Vnode {
        self.self_handle.clone()
    }
}

impl fmt::Debug for LocalVnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalVnode").field("self_handle", &self.self_handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_id_is_deterministic() {
        let a = Vnode::derive_id("host-a", 0);
        let b = Vnode::derive_id("host-a", 0);
        let c = Vnode::derive_id("host-a", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn vnode_equality_ignores_host() {
        let id = Vnode::derive_id("h", 0);
        let a = Vnode::new(id, "host-a");
        let b = Vnode::new(id, "host-b");
        assert_eq!(a, b);
    }

    #[test]
    fn local_vnode_starts_with_empty_state() {
        let vn = LocalVnode::new("host-a", 0);
        let state = vn.state.read();
        assert!(state.predecessor.is_none());
        assert!(state.successors.is_empty());
        assert_eq!(state.finger.len(), M_BITS);
        assert_eq!(state.stabilized, 0);
    }
}
