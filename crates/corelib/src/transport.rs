//! Transport contract (C4).
//!
//! The wire serialization format and socket mechanics are external
//! collaborators (§1); this module only fixes the *interface* the core
//! depends on, plus the one piece of transport-adjacent logic that belongs
//! here because it needs access to the local vnode registry: short-circuiting
//! calls to colocated vnodes so they never touch a socket.
//!
//! Concrete implementations (TCP wire transport, in-process test transport)
//! live in the `chord-transport` crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::vnode::Vnode;

/// Result of a `find_successors` call against one vnode: either it was
/// responsible (or knows enough to answer directly), or it names a closer
/// vnode to retry against.
#[derive(Debug, Clone)]
pub enum FindSuccessorsReply {
    Successors(Vec<Vnode>),
    Forward(Vnode),
}

/// Server-side handler for RPCs directed at one specific local vnode.
/// Implemented by `LocalVnode` (via the ring) and invoked either directly,
/// by [`LocalTransport`], or after wire decoding by a remote transport.
#[async_trait]
pub trait VnodeHandler: Send + Sync {
    async fn ping(&self) -> Result<bool>;
    async fn get_predecessor(&self) -> Result<Option<Vnode>>;
    /// Handle an incoming `Notify(from)`; returns this vnode's successor list.
    async fn notify(&self, from: Vnode) -> Result<Vec<Vnode>>;
    async fn find_successors(&self, n: usize, key: Identifier) -> Result<FindSuccessorsReply>;
}

/// Client-side contract the ring and stabilizer depend on (§4.5).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>>;
    async fn ping(&self, vnode: &Vnode) -> Result<bool>;
    async fn get_predecessor(&self, vnode: &Vnode) -> Result<Option<Vnode>>;
    async fn notify(&self, dest: &Vnode, myself: &Vnode) -> Result<Vec<Vnode>>;

    /// A single hop: returns up to `n` successors, or a `Forward` hint.
    /// Callers that need the full tail-iterative behavior should use
    /// [`Transport::find_successors`] instead of calling this directly.
    async fn find_successors_once(
        &self,
        vnode: &Vnode,
        n: usize,
        key: Identifier,
    ) -> Result<FindSuccessorsReply>;

    /// Register a local vnode's handler so calls destined for it can be
    /// short-circuited without touching the network.
    fn register(&self, vnode: Vnode, handler: Arc<dyn VnodeHandler>);

    /// Look up a locally registered handler, if any.
    fn get_vnode_handler(&self, id: &Identifier) -> Option<Arc<dyn VnodeHandler>>;

    /// Tail-iterative `find_successors`, following `Forward` replies up to
    /// `hop_limit` hops (§4.4). Provided so every `Transport` impl gets
    /// identical forwarding semantics; impls only need `find_successors_once`.
    async fn find_successors(
        &self,
        start: &Vnode,
        n: usize,
        key: Identifier,
        hop_limit: usize,
    ) -> Result<Vec<Vnode>> {
        let mut current = start.clone();
        for _ in 0..hop_limit {
            match self.find_successors_once(&current, n, key).await? {
                FindSuccessorsReply::Successors(mut succs) => {
                    succs.truncate(n);
                    return Ok(succs);
                }
                FindSuccessorsReply::Forward(next) => {
                    current = next;
                }
            }
        }
        Err(Error::LookupExhausted(hop_limit))
    }
}

/// Decorates an inner [`Transport`] so that any call whose destination
/// resolves to a vnode registered on this host answers locally, never
/// hitting the wire (§4.2 step 1).
pub struct LocalTransport<T: Transport> {
    inner: Arc<T>,
    hostname: String,
    handlers: DashMap<Identifier, Arc<dyn VnodeHandler>>,
    /// host -> vnodes registered locally, for `list_vnodes(self.hostname)`.
    local_vnodes: parking_lot::RwLock<HashMap<Identifier, Vnode>>,
}

impl<T: Transport> LocalTransport<T> {
    pub fn new(inner: Arc<T>, hostname: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hostname: hostname.into(),
            handlers: DashMap::new(),
            local_vnodes: parking_lot::RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl<T: Transport> Transport for LocalTransport<T> {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        if host == self.hostname {
            return Ok(self.local_vnodes.read().values().cloned().collect());
        }
        self.inner.list_vnodes(host).await
    }

    async fn ping(&self, vnode: &Vnode) -> Result<bool> {
        if let Some(handler) = self.get_vnode_handler(&vnode.id) {
            return handler.ping().await;
        }
        self.inner.ping(vnode).await
    }

    async fn get_predecessor(&self, vnode: &Vnode) -> Result<Option<Vnode>> {
        if let Some(handler) = self.get_vnode_handler(&vnode.id) {
            return handler.get_predecessor().await;
        }
        self.inner.get_predecessor(vnode).await
    }

    async fn notify(&self, dest: &Vnode, myself: &Vnode) -> Result<Vec<Vnode>> {
        if let Some(handler) = self.get_vnode_handler(&dest.id) {
            return handler.notify(myself.clone()).await;
        }
        self.inner.notify(dest, myself).await
    }

    async fn find_successors_once(
        &self,
        vnode: &Vnode,
        n: usize,
        key: Identifier,
    ) -> Result<FindSuccessorsReply> {
        if let Some(handler) = self.get_vnode_handler(&vnode.id) {
            return handler.find_successors(n, key).await;
        }
        self.inner.find_successors_once(vnode, n, key).await
    }

    fn register(&self, vnode: Vnode, handler: Arc<dyn VnodeHandler>) {
        self.local_vnodes.write().insert(vnode.id, vnode.clone());
        self.handlers.insert(vnode.id, handler.clone());
        // Keep the inner transport's own registry in sync too: for a real
        // network transport, that's what answers inbound wire requests from
        // other hosts, which never pass through this short-circuit layer.
        self.inner.register(vnode, handler);
    }

    fn get_vnode_handler(&self, id: &Identifier) -> Option<Arc<dyn VnodeHandler>> {
        self.handlers.get(id).map(|e| e.value().clone())
    }
}
