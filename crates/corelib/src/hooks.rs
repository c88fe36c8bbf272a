//! Delegate hook bus (C7).
//!
//! Higher layers (replication, caches, anything that cares when its share of
//! the ring shifts) register a [`DelegateHook`] with the [`crate::ring::Ring`].
//! `emit` dispatches each hook on its own detached task so a slow or
//! misbehaving hook can never stall stabilization.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::vnode::Vnode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingEventType {
    PredecessorJoined,
    PredecessorLeft,
    ReplicasChanged,
}

/// Event payload dispatched to hooks. `response_ch` is an optional
/// back-channel for hooks that need to acknowledge before the emitter
/// proceeds; the ring never waits on it by default.
pub struct EventCtx {
    pub event_type: RingEventType,
    pub target: Vnode,
    pub primary: Option<Vnode>,
    pub secondary: Option<Vnode>,
    pub item_list: Vec<Vnode>,
    pub response_ch: Option<oneshot::Sender<()>>,
}

impl EventCtx {
    /// `successors` is the target vnode's successor list *at the moment of
    /// the change*, carried in `item_list` so a consumer that wants to
    /// recompute a replica set (§4.7) doesn't need to call back into the
    /// ring to ask for it.
    pub fn predecessor_joined(
        target: Vnode,
        new_pred: Vnode,
        old_pred: Option<Vnode>,
        successors: Vec<Vnode>,
    ) -> Self {
        Self {
            event_type: RingEventType::PredecessorJoined,
            target,
            primary: Some(new_pred),
            secondary: old_pred,
            item_list: successors,
            response_ch: None,
        }
    }

    pub fn predecessor_left(target: Vnode, departed: Vnode, successors: Vec<Vnode>) -> Self {
        Self {
            event_type: RingEventType::PredecessorLeft,
            target,
            primary: Some(departed),
            secondary: None,
            item_list: successors,
            response_ch: None,
        }
    }

    pub fn replicas_changed(target: Vnode, new_replicas: Vec<Vnode>) -> Self {
        Self {
            event_type: RingEventType::ReplicasChanged,
            target,
            primary: None,
            secondary: None,
            item_list: new_replicas,
            response_ch: None,
        }
    }
}

/// A listener for ring-structure changes. Implementations must be cheap to
/// invoke repeatedly and must not panic; `emit_event` runs on a detached
/// task so a panic there is isolated from the stabilizer, but the event is
/// simply lost.
pub trait DelegateHook: Send + Sync {
    fn emit_event(&self, ctx: EventCtx);
}

/// Ordered collection of hooks a ring dispatches events to.
#[derive(Default, Clone)]
pub struct HookBus {
    hooks: Arc<parking_lot::RwLock<Vec<Arc<dyn DelegateHook>>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hook: Arc<dyn DelegateHook>) {
        self.hooks.write().push(hook);
    }

    /// Dispatch `ctx` to every registered hook on its own task. `EventCtx`
    /// carries at most one `response_ch`, so only the first hook receives
    /// it; the rest get an otherwise identical context with `response_ch:
    /// None`. A ring only ever emits one hook expecting acknowledgement at
    /// a time in practice.
    pub fn emit(&self, mut ctx: EventCtx) {
        let hooks = self.hooks.read().clone();
        let Some((first, rest)) = hooks.split_first() else {
            return;
        };
        for hook in rest {
            let hook = hook.clone();
            let owned = EventCtx {
                event_type: ctx.event_type,
                target: ctx.target.clone(),
                primary: ctx.primary.clone(),
                secondary: ctx.secondary.clone(),
                item_list: ctx.item_list.clone(),
                response_ch: None,
            };
            tokio::spawn(async move {
                hook.emit_event(owned);
            });
        }
        let first = first.clone();
        let response_ch = ctx.response_ch.take();
        let owned = EventCtx {
            event_type: ctx.event_type,
            target: ctx.target,
            primary: ctx.primary,
            secondary: ctx.secondary,
            item_list: ctx.item_list,
            response_ch,
        };
        tokio::spawn(async move {
            first.emit_event(owned);
        });
    }
}
