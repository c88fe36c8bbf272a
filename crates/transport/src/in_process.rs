//! In-process transport for multi-host tests without sockets.
//!
//! An [`InProcessNetwork`] is a shared registry; [`InProcessNetwork::transport_for`]
//! hands out one [`InProcessTransport`] per simulated host, all backed by
//! the same maps, so a scenario test can spin up several `Ring`s in one
//! process and have them actually talk to each other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use chord_core::error::{Error, Result};
use chord_core::identifier::Identifier;
use chord_core::transport::{FindSuccessorsReply, Transport, VnodeHandler};
use chord_core::vnode::Vnode;

#[derive(Clone, Default)]
pub struct InProcessNetwork {
    handlers: Arc<DashMap<Identifier, Arc<dyn VnodeHandler>>>,
    host_vnodes: Arc<RwLock<HashMap<String, Vec<Vnode>>>>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport_for(&self, host: impl Into<String>) -> Arc<InProcessTransport> {
        Arc::new(InProcessTransport { host: host.into(), network: self.clone() })
    }
}

pub struct InProcessTransport {
    host: String,
    network: InProcessNetwork,
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        Ok(self.network.host_vnodes.read().get(host).cloned().unwrap_or_default())
    }

    async fn ping(&self, vnode: &Vnode) -> Result<bool> {
        self.handler_for(vnode)?.ping().await
    }

    async fn get_predecessor(&self, vnode: &Vnode) -> Result<Option<Vnode>> {
        self.handler_for(vnode)?.get_predecessor().await
    }

    async fn notify(&self, dest: &Vnode, myself: &Vnode) -> Result<Vec<Vnode>> {
        self.handler_for(dest)?.notify(myself.clone()).await
    }

    async fn find_successors_once(
        &self,
        vnode: &Vnode,
        n: usize,
        key: Identifier,
    ) -> Result<FindSuccessorsReply> {
        self.handler_for(vnode)?.find_successors(n, key).await
    }

    fn register(&self, vnode: Vnode, handler: Arc<dyn VnodeHandler>) {
        self.network
            .host_vnodes
            .write()
            .entry(self.host.clone())
            .or_default()
            .push(vnode.clone());
        self.network.handlers.insert(vnode.id, handler);
    }

    fn get_vnode_handler(&self, id: &Identifier) -> Option<Arc<dyn VnodeHandler>> {
        self.network.handlers.get(id).map(|e| e.value().clone())
    }
}

impl InProcessTransport {
    fn handler_for(&self, vnode: &Vnode) -> Result<Arc<dyn VnodeHandler>> {
        self.network
            .handlers
            .get(&vnode.id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::NetworkUnreachable(format!("no such vnode {}", vnode.id)))
    }
}
