//! Ring topology diagnostics (ambient).
//!
//! Unlike a centrally-administered ring, a Chord node has no global
//! membership list: it only ever knows its own vnodes' predecessor,
//! successors, and finger table. `Topology` is a read-only view over one
//! [`Ring`]'s local state, useful for `chord topology` (the CLI) and for
//! logging/metrics exporters. Ownership percentages are therefore always an
//! estimate derived from what this host's vnodes currently believe about
//! their predecessors, not an authoritative cluster-wide computation.

use std::sync::Arc;

use crate::identifier::{distance, Distance, ID_BYTES, M_BITS};
use crate::ring::{Ring, VnodeDetail};

/// Read-only diagnostic wrapper around a [`Ring`].
#[derive(Clone)]
pub struct Topology {
    ring: Arc<Ring>,
}

impl Topology {
    pub fn new(ring: Arc<Ring>) -> Self {
        Self { ring }
    }

    /// This host's vnodes and what each currently knows.
    pub fn local_vnodes(&self) -> Vec<VnodeDetail> {
        self.ring.vnode_details()
    }

    /// Estimated fraction of the keyspace each local vnode owns, computed
    /// as `distance(predecessor, self) / 2^160`. A vnode with no known
    /// predecessor yet (still bootstrapping) is omitted rather than
    /// reported as owning the whole ring.
    pub fn ownership_percentages(&self) -> Vec<(String, f64)> {
        let ring_size = 2f64.powi(M_BITS as i32);
        self.local_vnodes()
            .into_iter()
            .filter_map(|detail| {
                let pred = detail.predecessor.as_ref()?;
                let span = distance(&pred.id, &detail.vnode.id);
                let pct = (distance_as_f64(&span) / ring_size) * 100.0;
                Some((detail.vnode.id.to_string(), pct))
            })
            .collect()
    }

    /// Human-readable dump, in the spirit of a `nodetool ring`-style report
    /// but scoped to this process's vnodes.
    pub fn describe(&self) -> String {
        let details = self.local_vnodes();
        let mut out = String::new();
        out.push_str("Ring Topology (local view):\n");
        out.push_str(&format!("  Host: {}\n", self.ring.config().hostname));
        out.push_str(&format!("  Local vnodes: {}\n", details.len()));
        out.push_str(&format!("  Stabilization rounds (any vnode): {}\n", self.ring.stabilizations()));

        let percentages: std::collections::HashMap<String, f64> =
            self.ownership_percentages().into_iter().collect();

        out.push_str("\nVnodes:\n");
        for detail in &details {
            let id_str = detail.vnode.id.to_string();
            let pct = percentages.get(&id_str).copied();
            let pred = detail
                .predecessor
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "none".to_string());
            let succ = detail
                .successors
                .first()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string());
            out.push_str(&format!(
                "  {} @ {}: predecessor={} successor={} fingers={}/{M_BITS} rounds={}{}\n",
                id_str,
                detail.vnode.host,
                pred,
                succ,
                detail.fingers_populated,
                detail.stabilized_rounds,
                pct.map(|p| format!(" est_ownership={:.2}%", p)).unwrap_or_default(),
            ));
        }

        out
    }

    pub fn ring(&self) -> &Arc<Ring> {
        &self.ring
    }
}

impl From<Arc<Ring>> for Topology {
    fn from(ring: Arc<Ring>) -> Self {
        Self::new(ring)
    }
}

/// Widen a [`Distance`] (a `ID_BYTES + 1`-byte big-endian magnitude) to an
/// approximate `f64`. Loses precision past 53 significant bits, which is
/// acceptable for a descriptive percentage.
fn distance_as_f64(d: &Distance) -> f64 {
    debug_assert_eq!(d.0.len(), ID_BYTES + 1);
    d.0.iter().fold(0.0f64, |acc, &byte| acc * 256.0 + byte as f64)
}
