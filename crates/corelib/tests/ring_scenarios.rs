//! Multi-host scenario tests (S1, S2, S4-S6) and ring-level properties
//! (P1, P6, P7), driven over `InProcessTransport` so no sockets are opened.
//!
//! Vnode ids are derived from `hash("{host}:{index}")`, so (unlike the
//! spec's illustrative fixed-byte examples) this file can't pin exact id
//! values up front; it asserts on relationships between the ids that are
//! actually produced instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chord_core::error::{Error, Result};
use chord_core::identifier::Identifier;
use chord_core::transport::{FindSuccessorsReply, Transport, VnodeHandler};
use chord_core::vnode::Vnode;
use chord_core::{Config, Ring};
use chord_transport::InProcessNetwork;

fn fast_config(hostname: &str) -> Config {
    Config::builder(hostname)
        .num_vnodes(1)
        .stabilize_interval(Duration::from_millis(5), Duration::from_millis(15))
        .build()
        .unwrap()
}

/// S1: a brand-new singleton ring is its own sole successor with no
/// predecessor, and resolves every key to itself.
#[tokio::test]
async fn s1_singleton_bootstrap_resolves_to_itself() {
    let network = InProcessNetwork::new();
    let transport = network.transport_for("host-a");
    let ring = Ring::create_ring(fast_config("host-a"), transport);

    let vnodes = ring.local_vnodes();
    assert_eq!(vnodes.len(), 1);

    let detail = &ring.vnode_details()[0];
    assert!(detail.predecessor.is_none());
    assert_eq!(detail.successors, vec![vnodes[0].clone()]);

    let result = ring.lookup(Identifier::from_bytes(&[0x77])).await.unwrap();
    assert_eq!(result, vec![vnodes[0].clone()]);

    ring.shutdown();
}

/// C3: a single host with several colocated vnodes wires them into the
/// documented local cycle (`successors[j] = sorted[(i+j+1) mod n]`) right
/// from `create_ring`, before any peer ever joins -- no vnode should ever
/// see its own id in its own successor list.
#[tokio::test]
async fn c3_multi_vnode_host_gets_cyclic_local_successors() {
    let network = InProcessNetwork::new();
    let config = Config::builder("host-multi")
        .num_vnodes(3)
        .stabilize_interval(Duration::from_millis(5), Duration::from_millis(15))
        .build()
        .unwrap();
    let ring = Ring::create_ring(config, network.transport_for("host-multi"));

    let vnodes = ring.local_vnodes();
    assert_eq!(vnodes.len(), 3);

    let details = ring.vnode_details();
    let n = vnodes.len();
    for (i, detail) in details.iter().enumerate() {
        let expected: Vec<Identifier> = (0..n - 1).map(|j| vnodes[(i + j + 1) % n].id).collect();
        let got: Vec<Identifier> = detail.successors.iter().map(|s| s.id).collect();
        assert_eq!(got, expected, "vnode {i} successors should be the other two, in cyclic order");
        assert!(
            !got.contains(&detail.vnode.id),
            "vnode {i}'s own id must never appear in its own successor list"
        );
    }

    ring.shutdown();
}

/// S2: two single-vnode rings joined through each other converge, after a
/// few stabilization rounds, to being mutual predecessor/successor.
#[tokio::test]
async fn s2_two_host_join_converges_to_mutual_successor() {
    let network = InProcessNetwork::new();

    let ring_a = Ring::create_ring(fast_config("host-a"), network.transport_for("host-a"));
    let ring_b = Ring::join_ring(fast_config("host-b"), network.transport_for("host-b"), "host-a")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let a_vnode = ring_a.local_vnodes()[0].clone();
    let b_vnode = ring_b.local_vnodes()[0].clone();

    let a_detail = &ring_a.vnode_details()[0];
    let b_detail = &ring_b.vnode_details()[0];

    assert_eq!(a_detail.predecessor.as_ref().map(|v| &v.id), Some(&b_vnode.id));
    assert_eq!(a_detail.successors.first().map(|v| &v.id), Some(&b_vnode.id));
    assert_eq!(b_detail.predecessor.as_ref().map(|v| &v.id), Some(&a_vnode.id));
    assert_eq!(b_detail.successors.first().map(|v| &v.id), Some(&a_vnode.id));

    ring_a.shutdown();
    ring_b.shutdown();
}

/// S4 / P1: in a quiescent three-host ring, every lookup's first result
/// satisfies `key ∈ (result.predecessor, result.id]`, checked by relating
/// the lookup's answer back to the responsible vnode's own stabilized
/// predecessor.
#[tokio::test]
async fn s4_three_host_lookup_is_responsible_for_returned_range() {
    let network = InProcessNetwork::new();

    let ring_a = Ring::create_ring(fast_config("host-a"), network.transport_for("host-a"));
    let ring_b = Ring::join_ring(fast_config("host-b"), network.transport_for("host-b"), "host-a")
        .await
        .unwrap();
    let ring_c = Ring::join_ring(fast_config("host-c"), network.transport_for("host-c"), "host-a")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    for key_byte in [0x11u8, 0x55, 0x99, 0xEE] {
        let key = Identifier::from_bytes(&[key_byte]);
        let result = ring_a.lookup(key).await.unwrap();
        let responsible = result.first().expect("lookup returns at least one vnode");

        // Find which ring owns the responsible vnode and confirm its own
        // stabilized state agrees that it is responsible for `key`.
        let owner_detail = [ring_a.vnode_details(), ring_b.vnode_details(), ring_c.vnode_details()]
            .into_iter()
            .flatten()
            .find(|d| d.vnode.id == responsible.id)
            .expect("responsible vnode belongs to one of the three rings");

        if let Some(pred) = &owner_detail.predecessor {
            assert!(
                chord_core::identifier::between(&pred.id, &responsible.id, &key, true),
                "key {key_byte:#x} not in responsible vnode's claimed range"
            );
        }
    }

    ring_a.shutdown();
    ring_b.shutdown();
    ring_c.shutdown();
}

/// S5: a single hop to a non-responsible vnode yields a `Forward`, and
/// following it resolves the key, exercising the transport's tail-iterative
/// forwarding on top of a single `find_successors_once` call.
#[tokio::test]
async fn s5_forwarding_resolves_after_one_hop() {
    let network = InProcessNetwork::new();

    let ring_a = Ring::create_ring(fast_config("host-a"), network.transport_for("host-a"));
    let ring_b = Ring::join_ring(fast_config("host-b"), network.transport_for("host-b"), "host-a")
        .await
        .unwrap();
    let ring_c = Ring::join_ring(fast_config("host-c"), network.transport_for("host-c"), "host-a")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let transport = network.transport_for("test-client");
    let a_vnode = ring_a.local_vnodes()[0].clone();

    // A single hop against host-a's vnode may answer directly or forward;
    // either way, following the tail-iterative Transport::find_successors
    // to completion must resolve every key to a live vnode.
    for key_byte in [0x01u8, 0x80, 0xFF] {
        let key = Identifier::from_bytes(&[key_byte]);
        let resolved = transport
            .find_successors(&a_vnode, 1, key, 3 * chord_core::identifier::M_BITS)
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    ring_a.shutdown();
    ring_b.shutdown();
    ring_c.shutdown();
}

/// Delegates everything to an inner `Transport` except pings directed at one
/// specific vnode id, which always fail — simulates a predecessor that has
/// stopped responding without needing real sockets to sever.
struct FlakyTransport<T: Transport> {
    inner: Arc<T>,
    unreachable: Identifier,
}

#[async_trait]
impl<T: Transport> Transport for FlakyTransport<T> {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        self.inner.list_vnodes(host).await
    }
    async fn ping(&self, vnode: &Vnode) -> Result<bool> {
        if vnode.id == self.unreachable {
            return Err(Error::NetworkUnreachable("simulated failure".into()));
        }
        self.inner.ping(vnode).await
    }
    async fn get_predecessor(&self, vnode: &Vnode) -> Result<Option<Vnode>> {
        self.inner.get_predecessor(vnode).await
    }
    async fn notify(&self, dest: &Vnode, myself: &Vnode) -> Result<Vec<Vnode>> {
        self.inner.notify(dest, myself).await
    }
    async fn find_successors_once(&self, vnode: &Vnode, n: usize, key: Identifier) -> Result<FindSuccessorsReply> {
        self.inner.find_successors_once(vnode, n, key).await
    }
    fn register(&self, vnode: Vnode, handler: Arc<dyn VnodeHandler>) {
        self.inner.register(vnode, handler)
    }
    fn get_vnode_handler(&self, id: &Identifier) -> Option<Arc<dyn VnodeHandler>> {
        self.inner.get_vnode_handler(id)
    }
}

/// S6: when a predecessor stops responding to pings, the next stabilization
/// round clears it, and a later notify from a different vnode is adopted.
#[tokio::test]
async fn s6_dead_predecessor_is_cleared_then_replaced() {
    let network = InProcessNetwork::new();

    let ring_a_inner = network.transport_for("host-a");
    let ring_b = Ring::create_ring(fast_config("host-b"), network.transport_for("host-b"));
    let b_vnode = ring_b.local_vnodes()[0].clone();

    let flaky = Arc::new(FlakyTransport { inner: ring_a_inner, unreachable: b_vnode.id });
    let ring_a = Ring::join_ring(fast_config("host-a"), flaky, "host-b").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        ring_a.vnode_details()[0].predecessor.as_ref().map(|v| v.id),
        Some(b_vnode.id),
        "host-a should have adopted host-b as predecessor before the simulated failure"
    );

    // host-b's pings now always fail (via FlakyTransport); the next
    // check_predecessor round on host-a must clear it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        ring_a.vnode_details()[0].predecessor.is_none(),
        "predecessor should be cleared once it stops responding to pings"
    );

    // A later notify from a third vnode is then adopted, since there is no
    // predecessor left to compare against.
    let ring_c = Ring::create_ring(fast_config("host-c"), network.transport_for("host-c"));
    let c_vnode = ring_c.local_vnodes()[0].clone();
    let a_vnode = ring_a.local_vnodes()[0].clone();

    let test_transport = network.transport_for("test-client");
    test_transport.notify(&a_vnode, &c_vnode).await.unwrap();

    let a_detail = &ring_a.vnode_details()[0];
    assert_eq!(a_detail.predecessor.as_ref().map(|v| v.id), Some(c_vnode.id));

    ring_a.shutdown();
    ring_b.shutdown();
    ring_c.shutdown();
}

/// P6: notifying a vnode with successively closer candidates only ever
/// shrinks `(predecessor, self)`, never grows it back out after a closer
/// predecessor has been adopted.
#[tokio::test]
async fn p6_notification_is_monotone_in_ring_order() {
    let network = InProcessNetwork::new();
    let ring = Ring::create_ring(fast_config("host-a"), network.transport_for("host-a"));
    let a_vnode = ring.local_vnodes()[0].clone();
    let client = network.transport_for("test-client");

    // Two independent singleton vnodes to offer as candidates, in arbitrary
    // order -- notify() must still only keep the closer one.
    let ring_x = Ring::create_ring(fast_config("host-x"), network.transport_for("host-x"));
    let ring_y = Ring::create_ring(fast_config("host-y"), network.transport_for("host-y"));
    let x_vnode = ring_x.local_vnodes()[0].clone();
    let y_vnode = ring_y.local_vnodes()[0].clone();

    client.notify(&a_vnode, &x_vnode).await.unwrap();
    let after_x = ring.vnode_details()[0].predecessor.clone().unwrap();
    assert_eq!(after_x.id, x_vnode.id);

    client.notify(&a_vnode, &y_vnode).await.unwrap();
    let after_y = ring.vnode_details()[0].predecessor.clone().unwrap();

    // Whichever of x/y is actually closer to `a` in ring order must be the
    // final predecessor; the farther one must never displace a closer one
    // already adopted.
    let closer = if chord_core::identifier::between(&x_vnode.id, &a_vnode.id, &y_vnode.id, false) {
        y_vnode.id
    } else {
        x_vnode.id
    };
    assert_eq!(after_y.id, closer);

    ring.shutdown();
    ring_x.shutdown();
    ring_y.shutdown();
}

/// P7: two identical `notify` calls leave the same final state as one.
#[tokio::test]
async fn p7_notify_is_idempotent() {
    let network = InProcessNetwork::new();
    let ring = Ring::create_ring(fast_config("host-a"), network.transport_for("host-a"));
    let a_vnode = ring.local_vnodes()[0].clone();

    let ring_b = Ring::create_ring(fast_config("host-b"), network.transport_for("host-b"));
    let b_vnode = ring_b.local_vnodes()[0].clone();

    let client = network.transport_for("test-client");
    client.notify(&a_vnode, &b_vnode).await.unwrap();
    let once = ring.vnode_details()[0].predecessor.clone();

    client.notify(&a_vnode, &b_vnode).await.unwrap();
    let twice = ring.vnode_details()[0].predecessor.clone();

    assert_eq!(once.map(|v| v.id), twice.map(|v| v.id));

    ring.shutdown();
    ring_b.shutdown();
}
