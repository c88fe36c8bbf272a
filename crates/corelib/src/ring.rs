//! Ring lifecycle (C3).
//!
//! A [`Ring`] owns a host's local vnodes, the transport they share, and one
//! stabilization task per vnode. `create_ring` starts a fresh singleton ring;
//! `join_ring` bootstraps against an existing host by asking it, per local
//! vnode, to resolve that vnode's position directly (mirroring dendrite's
//! `JoinRing`, which tries each of the bootstrap host's vnodes in turn rather
//! than a single fixed entry point — see `SPEC_FULL.md` §10).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hooks::{DelegateHook, EventCtx, HookBus};
use crate::identifier::{between, nearest, Identifier};
use crate::lookup;
use crate::stabilize;
use crate::transport::{FindSuccessorsReply, LocalTransport, Transport, VnodeHandler};
use crate::vnode::{LocalVnode, Vnode};

/// Adapts a [`LocalVnode`] to the wire-facing [`VnodeHandler`] contract,
/// firing predecessor-change hooks on `notify` (§4.3).
struct LocalVnodeHandler {
    local: Arc<LocalVnode>,
    hooks: HookBus,
}

#[async_trait]
impl VnodeHandler for LocalVnodeHandler {
    async fn ping(&self) -> Result<bool> {
        Ok(true)
    }

    async fn get_predecessor(&self) -> Result<Option<Vnode>> {
        Ok(self.local.state.read().predecessor.clone())
    }

    async fn notify(&self, from: Vnode) -> Result<Vec<Vnode>> {
        let mut adopted: Option<(Vnode, Option<Vnode>)> = None;
        {
            let mut state = self.local.state.write();
            let should_adopt = match &state.predecessor {
                None => true,
                Some(pred) => between(&pred.id, &self.local.id(), &from.id, false),
            };
            if should_adopt {
                let old = state.predecessor.replace(from.clone());
                adopted = Some((from, old));
            }
        }
        if let Some((new_pred, old_pred)) = adopted {
            let successors = self.local.state.read().successors.clone();
            self.hooks.emit(EventCtx::predecessor_joined(
                self.local.handle(),
                new_pred,
                old_pred.clone(),
                successors.clone(),
            ));
            if let Some(old) = old_pred {
                self.hooks
                    .emit(EventCtx::predecessor_left(self.local.handle(), old, successors));
            }
        }
        Ok(self.local.state.read().successors.clone())
    }

    async fn find_successors(&self, n: usize, key: Identifier) -> Result<FindSuccessorsReply> {
        let state = self.local.state.read();
        Ok(lookup::find_successors_locally(
            &self.local.self_handle,
            &state,
            n,
            key,
        ))
    }
}

/// A running Chord node: one or more local vnodes sharing a transport and a
/// stabilization schedule.
pub struct Ring {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    vnodes: Vec<Arc<LocalVnode>>,
    hooks: HookBus,
    stabilizations: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Ring {
    /// Build local vnodes and register their handlers with `transport`
    /// (wrapped in a [`LocalTransport`] so same-host calls never hit the
    /// wire). Vnodes have no successors or predecessor yet; callers
    /// continue with [`Ring::create_ring`] or [`Ring::join_ring`], which
    /// both start the stabilization tasks once initial state is set.
    fn init<T: Transport + 'static>(config: Config, inner: Arc<T>) -> Arc<Self> {
        let config = Arc::new(config);
        let local_transport = LocalTransport::new(inner, config.hostname.clone());
        let hooks = HookBus::new();

        let mut vnodes = Vec::with_capacity(config.num_vnodes);
        for i in 0..config.num_vnodes {
            let vn = Arc::new(LocalVnode::new(&config.hostname, i));
            let handler = Arc::new(LocalVnodeHandler {
                local: vn.clone(),
                hooks: hooks.clone(),
            });
            local_transport.register(vn.handle(), handler);
            vnodes.push(vn);
        }
        vnodes.sort_by_key(|v| v.id());

        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            config,
            transport: local_transport,
            vnodes,
            hooks,
            stabilizations: Arc::new(AtomicU64::new(0)),
            shutdown_tx,
            tasks: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Start a brand-new ring: wire the colocated local vnodes into their
    /// own cyclic successor-list assignment (§4.2's `set_local_successors`)
    /// so a multi-vnode host is internally consistent before any peer ever
    /// joins. A singleton host is simply its own one-vnode cycle.
    pub fn create_ring<T: Transport + 'static>(config: Config, inner: Arc<T>) -> Arc<Self> {
        let ring = Self::init(config, inner);
        ring.set_local_cyclic_successors();
        ring.schedule();
        ring
    }

    /// For each of the `n` colocated local vnodes (already sorted by id),
    /// `successors[j] = sorted[(i+j+1) mod n]` for `j` in
    /// `[0, min(num_successors, n-1))`. With `n == 1` the lone vnode is its
    /// own sole successor.
    fn set_local_cyclic_successors(&self) {
        let n = self.vnodes.len();
        let depth = self.config.num_successors.min(n.saturating_sub(1)).max(1);
        for (i, vn) in self.vnodes.iter().enumerate() {
            let successors = (0..depth)
                .map(|j| self.vnodes[(i + j + 1) % n].handle())
                .collect();
            vn.state.write().successors = successors;
        }
    }

    /// Join an existing ring by asking `bootstrap_host` to resolve each
    /// local vnode's successors directly — tries each of its vnodes in
    /// turn until one answers, rather than requiring a single fixed entry
    /// point to be reachable.
    pub async fn join_ring<T: Transport + 'static>(
        config: Config,
        inner: Arc<T>,
        bootstrap_host: &str,
    ) -> Result<Arc<Self>> {
        let ring = Self::init(config, inner);

        let candidates = ring
            .transport
            .list_vnodes(bootstrap_host)
            .await
            .map_err(|e| Error::BootstrapFailure { source: Box::new(e) })?;
        if candidates.is_empty() {
            return Err(Error::BootstrapFailure {
                source: Box::new(Error::NetworkUnreachable(bootstrap_host.to_string())),
            });
        }

        for vn in &ring.vnodes {
            let mut last_err = None;
            let mut resolved = false;
            for candidate in &candidates {
                match ring
                    .transport
                    .find_successors(candidate, ring.config.num_successors, vn.id(), ring.config.hop_limit)
                    .await
                {
                    Ok(succs) if !succs.is_empty() => {
                        let succs: Vec<Vnode> = succs.into_iter().filter(|s| s.id != vn.id()).collect();
                        if succs.is_empty() {
                            continue;
                        }
                        vn.state.write().successors = succs;
                        resolved = true;
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => last_err = Some(e),
                }
            }
            if !resolved {
                return Err(Error::BootstrapFailure {
                    source: Box::new(
                        last_err.unwrap_or_else(|| Error::NetworkUnreachable(bootstrap_host.to_string())),
                    ),
                });
            }
        }

        ring.schedule();
        Ok(ring)
    }

    fn schedule(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        for vn in &self.vnodes {
            let handle = tokio::spawn(stabilize::run(
                vn.clone(),
                self.transport.clone(),
                self.config.clone(),
                self.stabilizations.clone(),
                self.shutdown_tx.subscribe(),
            ));
            tasks.push(handle);
        }
    }

    /// Directly overwrite one local vnode's successor list. Exposed for
    /// tests and for callers that bootstrap state outside `join_ring`.
    pub fn set_local_successors(&self, vnode_id: Identifier, successors: Vec<Vnode>) {
        if let Some(vn) = self.vnodes.iter().find(|v| v.id() == vnode_id) {
            vn.state.write().successors = successors;
        }
    }

    /// Resolve `key` to its owning vnode (and up to `num_successors - 1`
    /// replicas), starting from whichever local vnode precedes it.
    pub async fn lookup(&self, key: Identifier) -> Result<Vec<Vnode>> {
        let start = nearest(&self.vnodes, &key, |v| v.id()).handle();
        self.transport
            .find_successors(&start, self.config.num_successors, key, self.config.hop_limit)
            .await
    }

    pub fn register_hook(&self, hook: Arc<dyn DelegateHook>) {
        self.hooks.register(hook);
    }

    /// Clone of the hook bus this ring dispatches ring-structure events on.
    /// Useful for a consumer (e.g. `chord-replication`) that wants to both
    /// register a hook and later emit its own derived events onto the same
    /// bus (§4.7).
    pub fn hook_bus(&self) -> HookBus {
        self.hooks.clone()
    }

    pub fn local_vnodes(&self) -> Vec<Vnode> {
        self.vnodes.iter().map(|v| v.handle()).collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stabilizations(&self) -> u64 {
        self.stabilizations.load(Ordering::Relaxed)
    }

    /// Signal every stabilization task to stop after its current sleep.
    /// Does not wait for them to finish; drop the `Arc<Ring>` to release
    /// everything once they have.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Point-in-time view of each local vnode's state, for diagnostics
    /// ([`crate::topology::Topology`]). A single host only ever sees its
    /// own vnodes directly; anything ring-wide is an estimate.
    pub fn vnode_details(&self) -> Vec<VnodeDetail> {
        self.vnodes
            .iter()
            .map(|vn| {
                let state = vn.state.read();
                VnodeDetail {
                    vnode: vn.handle(),
                    predecessor: state.predecessor.clone(),
                    successors: state.successors.clone(),
                    fingers_populated: state.finger.iter().filter(|f| f.is_some()).count(),
                    stabilized_rounds: state.stabilized,
                }
            })
            .collect()
    }
}

/// Snapshot of one local vnode's state at the moment it was read.
pub struct VnodeDetail {
    pub vnode: Vnode,
    pub predecessor: Option<Vnode>,
    pub successors: Vec<Vnode>,
    pub fingers_populated: usize,
    pub stabilized_rounds: u64,
}
