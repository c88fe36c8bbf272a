//! TCP reference transport (A5).
//!
//! One connection per RPC: dial, write a frame, read the reply frame,
//! close. Simple and correct; a pooling/multiplexing transport is a
//! straightforward drop-in replacement behind the same [`Transport`] trait
//! if connection-setup overhead ever matters more than simplicity does here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use chord_core::error::{Error, Result};
use chord_core::identifier::Identifier;
use chord_core::transport::{FindSuccessorsReply, Transport, VnodeHandler};
use chord_core::vnode::Vnode;

use crate::framing::{read_frame, read_message, write_frame, write_message};
use crate::hook::TransportHook;
use crate::protocol::{AckBody, FindSuccessorsBody, JoinBody, ListVnodesBody, Message, MessageTag, PingBody};

pub struct TcpTransport {
    listen_addr: String,
    handlers: DashMap<Identifier, Arc<dyn VnodeHandler>>,
    local_vnodes: parking_lot::RwLock<HashMap<Identifier, Vnode>>,
    timeout: Duration,
    extension_hooks: DashMap<u8, Arc<dyn TransportHook>>,
}

impl TcpTransport {
    /// `listen_addr` doubles as this host's identity: other hosts dial it
    /// using the same string they see in a `Vnode::host` field, so it must
    /// be reachable from peers, not just a bind address like `0.0.0.0:0`.
    pub fn new(listen_addr: impl Into<String>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            listen_addr: listen_addr.into(),
            handlers: DashMap::new(),
            local_vnodes: parking_lot::RwLock::new(HashMap::new()),
            timeout,
            extension_hooks: DashMap::new(),
        })
    }

    /// Claim a tag byte for third-party request handling (§4.5). Panics if
    /// `hook.tag()` collides with a reserved `MessageTag` discriminant.
    pub fn register_hook(&self, hook: Arc<dyn TransportHook>) {
        assert!(
            MessageTag::from_byte(hook.tag()).is_none(),
            "tag {} is reserved by MessageTag",
            hook.tag()
        );
        self.extension_hooks.insert(hook.tag(), hook);
    }

    /// Bind and accept connections until the process exits; each connection
    /// serves exactly one request/reply pair. Returns immediately; the
    /// accept loop runs on its own task.
    pub async fn spawn_listener(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let this = this.clone();
                        tokio::spawn(async move {
                            if let Err(e) = this.serve_connection(stream).await {
                                tracing::debug!(%peer, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }
        }))
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> Result<()> {
        let (tag, payload) = read_frame(&mut stream).await?;
        if MessageTag::from_byte(tag).is_some() {
            let mut framed = Vec::with_capacity(1 + payload.len());
            framed.push(tag);
            framed.extend(payload);
            let request = Message::decode(&framed)?;
            let reply = self.dispatch(request).await;
            return write_message(&mut stream, &reply).await;
        }
        let Some(hook) = self.extension_hooks.get(&tag) else {
            return write_message(&mut stream, &Message::Err(format!("unknown tag {tag}"))).await;
        };
        match hook.handle(&payload).await {
            Ok(reply_payload) => write_frame(&mut stream, tag, &reply_payload).await,
            Err(e) => write_message(&mut stream, &Message::Err(e.to_string())).await,
        }
    }

    async fn dispatch(&self, msg: Message) -> Message {
        match msg {
            Message::Ping(PingBody { target }) => match self.handlers.get(&target) {
                Some(h) => {
                    let alive = h.ping().await.unwrap_or(false);
                    let predecessor = h.get_predecessor().await.unwrap_or(None);
                    Message::Ack(AckBody { alive, predecessor })
                }
                None => Message::Err(format!("unknown vnode {target}")),
            },
            Message::Join(JoinBody { target, from }) => match self.handlers.get(&target) {
                Some(h) => match h.notify(from).await {
                    Ok(successors) => Message::ListVnodesResp(successors),
                    Err(e) => Message::Err(e.to_string()),
                },
                None => Message::Err(format!("unknown vnode {target}")),
            },
            Message::ListVnodes(ListVnodesBody { host }) => {
                let vnodes: Vec<Vnode> = self
                    .local_vnodes
                    .read()
                    .values()
                    .filter(|v| v.host == host)
                    .cloned()
                    .collect();
                Message::ListVnodesResp(vnodes)
            }
            Message::FindSuccessors(FindSuccessorsBody { target, n, key }) => {
                match self.handlers.get(&target) {
                    Some(h) => match h.find_successors(n, key).await {
                        Ok(FindSuccessorsReply::Successors(v)) => Message::ListVnodesResp(v),
                        Ok(FindSuccessorsReply::Forward(v)) => Message::Forward(v),
                        Err(e) => Message::Err(e.to_string()),
                    },
                    None => Message::Err(format!("unknown vnode {target}")),
                }
            }
            Message::Leave(_) => Message::Err("leave is not supported".into()),
            other => Message::Err(format!("unexpected request tag {:?}", other.tag())),
        }
    }

    async fn call(&self, addr: &str, request: Message) -> Result<Message> {
        let attempt = async {
            let mut stream = TcpStream::connect(addr)
                .await
                .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
            write_message(&mut stream, &request).await?;
            read_message(&mut stream).await
        };
        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        match self
            .call(host, Message::ListVnodes(ListVnodesBody { host: host.to_string() }))
            .await?
        {
            Message::ListVnodesResp(v) => Ok(v),
            Message::Err(e) => Err(Error::ProtocolViolation(e)),
            other => Err(Error::ProtocolViolation(format!("unexpected reply tag {:?}", other.tag()))),
        }
    }

    async fn ping(&self, vnode: &Vnode) -> Result<bool> {
        match self
            .call(&vnode.host, Message::Ping(PingBody { target: vnode.id }))
            .await?
        {
            Message::Ack(AckBody { alive, .. }) => Ok(alive),
            Message::Err(e) => Err(Error::ProtocolViolation(e)),
            other => Err(Error::ProtocolViolation(format!("unexpected reply tag {:?}", other.tag()))),
        }
    }

    async fn get_predecessor(&self, vnode: &Vnode) -> Result<Option<Vnode>> {
        match self
            .call(&vnode.host, Message::Ping(PingBody { target: vnode.id }))
            .await?
        {
            Message::Ack(AckBody { predecessor, .. }) => Ok(predecessor),
            Message::Err(e) => Err(Error::ProtocolViolation(e)),
            other => Err(Error::ProtocolViolation(format!("unexpected reply tag {:?}", other.tag()))),
        }
    }

    async fn notify(&self, dest: &Vnode, myself: &Vnode) -> Result<Vec<Vnode>> {
        match self
            .call(
                &dest.host,
                Message::Join(JoinBody { target: dest.id, from: myself.clone() }),
            )
            .await?
        {
            Message::ListVnodesResp(v) => Ok(v),
            Message::Err(e) => Err(Error::ProtocolViolation(e)),
            other => Err(Error::ProtocolViolation(format!("unexpected reply tag {:?}", other.tag()))),
        }
    }

    async fn find_successors_once(
        &self,
        vnode: &Vnode,
        n: usize,
        key: Identifier,
    ) -> Result<FindSuccessorsReply> {
        match self
            .call(
                &vnode.host,
                Message::FindSuccessors(FindSuccessorsBody { target: vnode.id, n, key }),
            )
            .await?
        {
            Message::ListVnodesResp(v) => Ok(FindSuccessorsReply::Successors(v)),
            Message::Forward(v) => Ok(FindSuccessorsReply::Forward(v)),
            Message::Err(e) => Err(Error::ProtocolViolation(e)),
            other => Err(Error::ProtocolViolation(format!("unexpected reply tag {:?}", other.tag()))),
        }
    }

    fn register(&self, vnode: Vnode, handler: Arc<dyn VnodeHandler>) {
        self.local_vnodes.write().insert(vnode.id, vnode.clone());
        self.handlers.insert(vnode.id, handler);
    }

    fn get_vnode_handler(&self, id: &Identifier) -> Option<Arc<dyn VnodeHandler>> {
        self.handlers.get(id).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_core::Result as CoreResult;

    struct StubHandler;

    #[async_trait]
    impl VnodeHandler for StubHandler {
        async fn ping(&self) -> CoreResult<bool> {
            Ok(true)
        }
        async fn get_predecessor(&self) -> CoreResult<Option<Vnode>> {
            Ok(None)
        }
        async fn notify(&self, _from: Vnode) -> CoreResult<Vec<Vnode>> {
            Ok(Vec::new())
        }
        async fn find_successors(&self, _n: usize, _key: Identifier) -> CoreResult<FindSuccessorsReply> {
            Ok(FindSuccessorsReply::Successors(Vec::new()))
        }
    }

    #[tokio::test]
    async fn ping_round_trips_over_a_real_socket() {
        // Port 0 would pick an ephemeral port we can't predict for the
        // client side, so bind explicitly to a fixed local port instead.
        let addr = "127.0.0.1:28733";
        let server = TcpTransport::new(addr, Duration::from_secs(1));
        let vnode = Vnode::new(Identifier::from_bytes(&[42]), addr);
        server.register(vnode.clone(), Arc::new(StubHandler));
        let _listener = server.spawn_listener().await.unwrap();

        let client = TcpTransport::new("127.0.0.1:0", Duration::from_secs(1));
        let alive = client.ping(&vnode).await.unwrap();
        assert!(alive);
    }

    struct UppercaseHook;

    #[async_trait]
    impl TransportHook for UppercaseHook {
        fn tag(&self) -> u8 {
            200
        }
        async fn handle(&self, payload: &[u8]) -> CoreResult<Vec<u8>> {
            Ok(payload.to_ascii_uppercase())
        }
    }

    #[tokio::test]
    async fn extension_tag_is_dispatched_to_a_registered_hook() {
        let addr = "127.0.0.1:28734";
        let server = TcpTransport::new(addr, Duration::from_secs(1));
        server.register_hook(Arc::new(UppercaseHook));
        let _listener = server.spawn_listener().await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, 200, b"hello").await.unwrap();
        let (tag, payload) = read_frame(&mut stream).await.unwrap();
        assert_eq!(tag, 200);
        assert_eq!(payload, b"HELLO");
    }

    #[tokio::test]
    async fn unclaimed_extension_tag_gets_an_err_reply() {
        let addr = "127.0.0.1:28735";
        let server = TcpTransport::new(addr, Duration::from_secs(1));
        let _listener = server.spawn_listener().await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, 201, b"hello").await.unwrap();
        let reply = read_message(&mut stream).await.unwrap();
        assert!(matches!(reply, Message::Err(_)));
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn registering_on_a_reserved_tag_panics() {
        struct BadHook;
        #[async_trait]
        impl TransportHook for BadHook {
            fn tag(&self) -> u8 {
                MessageTag::Ping as u8
            }
            async fn handle(&self, _payload: &[u8]) -> CoreResult<Vec<u8>> {
                Ok(Vec::new())
            }
        }
        let server = TcpTransport::new("127.0.0.1:0", Duration::from_secs(1));
        server.register_hook(Arc::new(BadHook));
    }
}
