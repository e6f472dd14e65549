//! Protocol semantics exercised over an in-memory transport: lookup arcs,
//! notify adoption, ring formation, maintenance failure tolerance, and the
//! server lifecycle. Maintenance cycles are driven by hand so every test is
//! deterministic; the periodic tickers are parked on an hour-long interval.

use async_trait::async_trait;
use chord::{
    Command, Config, Error, FindSuccessorRequest, FindSuccessorResponse, GetPredecessorResponse,
    Id, NotifyRequest, NotifyResponse, RemoteRef, Result, Server, Transport,
};
use num_bigint::BigUint;
use num_traits::One;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// In-memory wire: requests dispatch straight onto the target server.
#[derive(Default)]
struct LocalNet {
    servers: RwLock<HashMap<String, Arc<Server>>>,
}

impl LocalNet {
    fn lookup(&self, host: &str) -> Result<Arc<Server>> {
        self.servers
            .read()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown host {host}")))
    }

    fn register(&self, server: &Arc<Server>) {
        self.servers
            .write()
            .unwrap()
            .insert(server.node().host().to_string(), server.clone());
    }
}

struct LocalTransport(Arc<LocalNet>);

#[async_trait]
impl Transport for LocalTransport {
    async fn send_find_successor(
        &self,
        host: &str,
        req: FindSuccessorRequest,
    ) -> Result<FindSuccessorResponse> {
        self.0.lookup(host)?.find_successor(&req).await
    }

    async fn send_notify(&self, req: NotifyRequest) -> Result<NotifyResponse> {
        self.0.lookup(&req.target_host)?.notify(req).await
    }

    async fn send_get_predecessor(&self, host: &str) -> Result<GetPredecessorResponse> {
        self.0.lookup(host)?.get_predecessor().await
    }

    async fn send_get_successor(&self, host: &str) -> Result<FindSuccessorResponse> {
        Ok(self.0.lookup(host)?.get_successor().await)
    }
}

async fn spawn(net: &Arc<LocalNet>, name: &str, host: &str, bits: usize) -> Arc<Server> {
    let mut config = match bits {
        3 => Config::for_testing(host),
        _ => Config::new(host),
    };
    // Tests drive stabilize/fix_finger by hand.
    config.stabilize_interval = Duration::from_secs(3600);
    config.fix_finger_interval = Duration::from_secs(3600);

    let server = Arc::new(Server::new(
        name,
        config,
        Arc::new(LocalTransport(net.clone())),
    ));
    net.register(&server);
    server.clone().start().await.unwrap();
    server
}

fn offset(base: &Id, by: u64, bits: usize) -> Id {
    let modulus = BigUint::one() << bits;
    Id::from_biguint(&((base.to_biguint() + by) % modulus), bits)
}

#[tokio::test]
async fn single_node_answers_every_lookup_with_itself() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;

    for probe in ["k1", "some key", ""] {
        let target = a.config().id_of(probe);
        let req = FindSuccessorRequest::new(&target, a.node().host());
        let resp = a.find_successor(&req).await.unwrap();
        assert_eq!(resp.host, "http://a");
        assert_eq!(resp.id, a.node().id().to_vec());
    }

    assert_eq!(a.get_successor().await.host, "http://a");
    assert!(matches!(a.get_predecessor().await, Err(Error::NoPredecessor)));
}

#[tokio::test]
async fn notify_adopts_only_closer_senders() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "ring-a", 3).await;
    let own = a.node().id().clone();

    // First hint is adopted unconditionally and answered with self.
    let first = offset(&own, 5, 3);
    let resp = a
        .notify(NotifyRequest::new(&first, "peer-5", "ring-a"))
        .await
        .unwrap();
    assert_eq!(resp.host, "ring-a");
    assert_eq!(a.get_predecessor().await.unwrap().host, "peer-5");

    // A sender behind the current predecessor changes nothing.
    let behind = offset(&own, 3, 3);
    let resp = a
        .notify(NotifyRequest::new(&behind, "peer-3", "ring-a"))
        .await
        .unwrap();
    assert!(resp.is_empty());
    assert_eq!(a.get_predecessor().await.unwrap().host, "peer-5");

    // A strictly closer sender replaces it.
    let closer = offset(&own, 6, 3);
    let resp = a
        .notify(NotifyRequest::new(&closer, "peer-6", "ring-a"))
        .await
        .unwrap();
    assert_eq!(resp.host, "ring-a");
    assert_eq!(a.get_predecessor().await.unwrap().host, "peer-6");

    // The current predecessor re-notifying is not "strictly closer".
    let resp = a
        .notify(NotifyRequest::new(&closer, "peer-6", "ring-a"))
        .await
        .unwrap();
    assert!(resp.is_empty());
    assert_eq!(a.get_predecessor().await.unwrap().host, "peer-6");
}

#[tokio::test]
async fn two_nodes_form_a_mutual_ring() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;
    let b = spawn(&net, "b", "http://b", 160).await;

    // Joining resolves the successor over the pre-existing ring {a}.
    b.join("http://a").await.unwrap();
    assert_eq!(b.node().successor().await.host, "http://a");
    // The join already stabilized once, so a learned about b.
    assert_eq!(a.node().predecessor().await.unwrap().host, "http://b");

    // a's next cycle adopts b (its successor was still itself) and notifies.
    a.stabilize().await.unwrap();
    assert_eq!(a.node().successor().await.host, "http://b");
    assert_eq!(b.node().predecessor().await.unwrap().host, "http://a");
}

#[tokio::test]
async fn two_node_arcs_resolve_across_the_wrap() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;
    let b = spawn(&net, "b", "http://b", 160).await;
    b.join("http://a").await.unwrap();
    a.stabilize().await.unwrap();
    b.stabilize().await.unwrap();

    let (a_id, b_id) = (a.node().id().clone(), b.node().id().clone());

    // Just past a belongs to b; just past b belongs to a (wrap arc).
    let resp = a
        .find_successor(&FindSuccessorRequest::new(&offset(&a_id, 1, 160), "http://a"))
        .await
        .unwrap();
    assert_eq!(resp.host, "http://b");

    let resp = b
        .find_successor(&FindSuccessorRequest::new(&offset(&b_id, 1, 160), "http://b"))
        .await
        .unwrap();
    assert_eq!(resp.host, "http://a");

    // Once a has a finger, it can route the wrap arc too.
    a.fix_finger().await.unwrap();
    let resp = a
        .find_successor(&FindSuccessorRequest::new(&offset(&b_id, 1, 160), "http://a"))
        .await
        .unwrap();
    assert_eq!(resp.host, "http://a");

    // Each node's own identifier resolves to itself.
    let resp = a
        .find_successor(&FindSuccessorRequest::new(&a_id, "http://a"))
        .await
        .unwrap();
    assert_eq!(resp.host, "http://a");
}

#[tokio::test]
async fn join_resolves_the_successor_over_the_existing_ring() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;
    let b = spawn(&net, "b", "http://b", 160).await;
    b.join("http://a").await.unwrap();
    a.stabilize().await.unwrap();
    b.stabilize().await.unwrap();

    let c = spawn(&net, "c", "http://c", 160).await;
    c.join("http://a").await.unwrap();

    let (a_id, b_id, c_id) = (
        a.node().id().clone(),
        b.node().id().clone(),
        c.node().id().clone(),
    );
    let expect = if chord::id::between_right_incl(&a_id, &b_id, &c_id) {
        "http://b"
    } else {
        "http://a"
    };
    assert_eq!(c.node().successor().await.host, expect);
}

#[tokio::test]
async fn three_nodes_converge_to_a_single_cycle() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;
    let b = spawn(&net, "b", "http://b", 160).await;
    let c = spawn(&net, "c", "http://c", 160).await;

    b.join("http://a").await.unwrap();
    c.join("http://a").await.unwrap();

    for _ in 0..6 {
        a.stabilize().await.unwrap();
        b.stabilize().await.unwrap();
        c.stabilize().await.unwrap();
    }

    // Walking successor pointers from any node visits every host once and
    // returns to the origin.
    let transport = LocalTransport(net.clone());
    for origin in ["http://a", "http://b", "http://c"] {
        let mut seen = Vec::new();
        let mut at = origin.to_string();
        for _ in 0..3 {
            let next = transport.send_get_successor(&at).await.unwrap().host;
            seen.push(next.clone());
            at = next;
        }
        assert_eq!(at, origin, "walk from {origin} did not close the cycle");
        seen.sort();
        assert_eq!(seen, vec!["http://a", "http://b", "http://c"]);
    }
}

#[tokio::test]
async fn fix_finger_fills_slots_round_robin() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "ring-a", 3).await;

    for slot in 0..3 {
        assert!(a.node().finger(slot).await.is_none());
        a.fix_finger().await.unwrap();
        let entry = a.node().finger(slot).await.unwrap();
        // Alone on the ring, every start resolves to self.
        assert_eq!(entry.node.host, "ring-a");
        assert_eq!(
            entry.start,
            chord::id::power_offset(a.node().id(), slot, 3)
        );
    }

    // The cursor wraps back to slot zero.
    a.fix_finger().await.unwrap();
    assert!(a.node().finger(0).await.is_some());
}

#[tokio::test]
async fn maintenance_failures_do_not_corrupt_state() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;

    // Unreachable successor: the cycle reports the notify failure but the
    // reference stays put for the next tick to retry.
    let ghost = RemoteRef::new(a.config().id_of("http://ghost"), "http://ghost");
    a.node().set_successor(ghost.clone()).await;
    assert!(matches!(a.stabilize().await, Err(Error::Transport(_))));
    assert_eq!(a.node().successor().await, ghost);
}

#[tokio::test]
async fn failed_join_keeps_the_single_node_configuration() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;

    assert!(matches!(
        a.join("http://nowhere").await,
        Err(Error::Transport(_))
    ));
    assert_eq!(a.node().successor().await.host, "http://a");
    assert!(a.node().predecessor().await.is_none());
}

#[tokio::test]
async fn lifecycle_rejects_reentry_and_stops_the_queue() {
    let net = Arc::new(LocalNet::default());
    let a = spawn(&net, "a", "http://a", 160).await;

    assert!(matches!(
        a.clone().start().await,
        Err(Error::AlreadyRunning)
    ));

    // Commands run on the loop while it is up.
    a.execute(Command::Leave).await.unwrap();

    a.stop().await.unwrap();
    assert!(matches!(a.stop().await, Err(Error::AlreadyStopped)));

    // Mutating submissions after stop fail fast.
    let hint = NotifyRequest::new(&a.config().id_of("x"), "http://x", "http://a");
    assert!(matches!(a.notify(hint).await, Err(Error::ServerStopped)));
    assert!(matches!(
        a.execute(Command::Leave).await,
        Err(Error::ServerStopped)
    ));

    // Read-only getters still serve the last state.
    assert_eq!(a.get_successor().await.host, "http://a");

    // A stopped server can start again with fresh channels.
    a.clone().start().await.unwrap();
    a.execute(Command::Leave).await.unwrap();
    a.stop().await.unwrap();
}
