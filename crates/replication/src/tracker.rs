//! Advisory replica-set tracking (§4.7).

use std::collections::HashMap;

use parking_lot::RwLock;

use chord_core::hooks::{DelegateHook, EventCtx, HookBus, RingEventType};
use chord_core::identifier::Identifier;
use chord_core::vnode::Vnode;

/// Tracks, per local vnode id, the advisory set of vnodes that would hold
/// its replicas: itself plus up to `replicas` of its successors. Recomputed
/// whenever that vnode's predecessor changes, since a predecessor change is
/// the only local signal this core gives that the ring's membership near
/// this vnode shifted.
pub struct ReplicaTracker {
    replicas: usize,
    hooks: HookBus,
    sets: RwLock<HashMap<Identifier, Vec<Vnode>>>,
}

impl ReplicaTracker {
    /// `hooks` should be the same bus this tracker is about to be
    /// registered on ([`chord_core::Ring::hook_bus`]), so the
    /// `ReplicasChanged` events it emits reach every other listener too.
    pub fn new(replicas: usize, hooks: HookBus) -> Self {
        Self { replicas, hooks, sets: RwLock::new(HashMap::new()) }
    }

    /// Current advisory replica set for `vnode_id`, if one has been
    /// computed yet.
    pub fn replica_set(&self, vnode_id: &Identifier) -> Option<Vec<Vnode>> {
        self.sets.read().get(vnode_id).cloned()
    }

    fn recompute(&self, target: &Vnode, successors: &[Vnode]) -> Vec<Vnode> {
        let mut set = Vec::with_capacity(self.replicas + 1);
        set.push(target.clone());
        for s in successors.iter().take(self.replicas) {
            if s.id == target.id {
                continue;
            }
            set.push(s.clone());
        }
        set
    }
}

impl DelegateHook for ReplicaTracker {
    fn emit_event(&self, ctx: EventCtx) {
        match ctx.event_type {
            RingEventType::PredecessorJoined | RingEventType::PredecessorLeft => {
                let new_set = self.recompute(&ctx.target, &ctx.item_list);
                self.sets.write().insert(ctx.target.id, new_set.clone());
                tracing::debug!(
                    vnode = %ctx.target.id,
                    replicas = new_set.len(),
                    "recomputed replica set"
                );
                metrics::counter!("chord_replica_set_recomputed_total").increment(1);
                self.hooks
                    .emit(EventCtx::replicas_changed(ctx.target, new_set));
            }
            RingEventType::ReplicasChanged => {
                // Our own echo, or another tracker's; nothing further to do.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_core::identifier::ID_BYTES;

    fn vn(byte: u8, host: &str) -> Vnode {
        let mut buf = [0u8; ID_BYTES];
        buf[ID_BYTES - 1] = byte;
        Vnode::new(Identifier(buf), host)
    }

    #[test]
    fn recomputes_self_plus_successors_up_to_replica_count() {
        let tracker = ReplicaTracker::new(2, HookBus::new());
        let target = vn(0x10, "a");
        let successors = vec![vn(0x20, "b"), vn(0x30, "c"), vn(0x40, "d")];

        let set = tracker.recompute(&target, &successors);
        assert_eq!(set.len(), 3); // target + 2 replicas
        assert_eq!(set[0].id, target.id);
        assert_eq!(set[1].id, successors[0].id);
        assert_eq!(set[2].id, successors[1].id);
    }

    #[test]
    fn excludes_target_if_it_appears_in_its_own_successor_list() {
        // Can happen transiently in a small ring where a vnode is its own
        // successor during bootstrap.
        let tracker = ReplicaTracker::new(3, HookBus::new());
        let target = vn(0x10, "a");
        let successors = vec![target.clone(), vn(0x20, "b")];

        let set = tracker.recompute(&target, &successors);
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].id, successors[1].id);
    }

    #[tokio::test]
    async fn predecessor_joined_updates_tracked_set_and_reemits() {
        let hooks = HookBus::new();
        let tracker = std::sync::Arc::new(ReplicaTracker::new(1, hooks.clone()));
        hooks.register(tracker.clone());

        let target = vn(0x50, "a");
        let successor = vn(0x60, "b");
        hooks.emit(EventCtx::predecessor_joined(
            target.clone(),
            vn(0x01, "z"),
            None,
            vec![successor.clone()],
        ));

        // emit() dispatches on a spawned task; give it a turn to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let set = tracker.replica_set(&target.id).expect("replica set computed");
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].id, successor.id);
    }
}
