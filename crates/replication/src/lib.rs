//! Replication hook consumer (A7, ambient).
//!
//! This crate is a demonstrator of the delegate hook contract (§4.6), not a
//! replication feature: it owns no data storage, performs no reads or
//! writes, and offers no consistency levels or quorum logic (all explicitly
//! out of scope). It subscribes to a [`chord_core::Ring`]'s hook bus and,
//! on `PredecessorJoined`/`PredecessorLeft`, recomputes which vnodes would
//! hold replicas for the affected vnode by walking its successor list, then
//! emits `ReplicasChanged` back onto the same bus for a real storage layer
//! to act on.

mod tracker;

pub use tracker::ReplicaTracker;
