//! The Chord server: protocol handlers, the join bootstrap, the periodic
//! maintenance routines, and the lifecycle that ties them together.
//!
//! Mutations to ring state are serialized two ways. Field-level writes go
//! through the node's lock, which linearizes them for any reader. Mutating
//! *requests* (notify and admin commands) additionally flow through a
//! single-writer event loop fed by a bounded queue, so they are applied in
//! FIFO order by one task. Read-only handlers and the local reads that
//! maintenance performs take short-lived read locks and never enter the
//! loop.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::id::{self, Id};
use crate::message::{
    FindSuccessorRequest, FindSuccessorResponse, GetPredecessorResponse, NotifyRequest,
    NotifyResponse,
};
use crate::node::{FingerInfo, Node, RemoteRef};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Capacity of the single-writer event queue. A full queue rejects the
/// submission rather than blocking the caller.
pub const EVENT_QUEUE_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Running,
}

/// Admin commands applied on the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Departure stub. Performs no ring mutation; the ring heals through
    /// stabilization once the node actually goes away.
    Leave,
}

enum Event {
    Notify {
        req: NotifyRequest,
        reply: oneshot::Sender<Result<NotifyResponse>>,
    },
    Command {
        cmd: Command,
        reply: oneshot::Sender<Result<()>>,
    },
}

pub struct Server {
    name: String,
    config: Config,
    node: Node,
    transport: Arc<dyn Transport>,
    state: RwLock<State>,
    events: RwLock<Option<mpsc::Sender<Event>>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    pub fn new(name: impl Into<String>, config: Config, transport: Arc<dyn Transport>) -> Server {
        let node = Node::new(&config);
        Server {
            name: name.into(),
            config,
            node,
            transport,
            state: RwLock::new(State::Stopped),
            events: RwLock::new(None),
            stop_tx: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub async fn state(&self) -> State {
        *self.state.read().await
    }

    // ------------------------------------------------------------------
    // Protocol handlers
    // ------------------------------------------------------------------

    /// Resolve the peer responsible for `req.id`. Answers locally when the
    /// target falls in `(self, successor]`, otherwise forwards through the
    /// closest preceding finger.
    pub async fn find_successor(&self, req: &FindSuccessorRequest) -> Result<FindSuccessorResponse> {
        let target = Id::from_be_bytes(&req.id, self.config.hash_bits);
        let successor = self.node.successor().await;
        if id::between_right_incl(self.node.id(), &successor.id, &target) {
            return Ok(FindSuccessorResponse::from(&successor));
        }

        let Some(next_hop) = self.node.closest_preceding_node(&target).await else {
            // Nothing routable in the finger table yet; answer with self and
            // let the requester's maintenance converge.
            return Ok(FindSuccessorResponse::from(&self.node.self_ref()));
        };

        debug!(
            "{}: forwarding lookup for {} to {}",
            self.name, target, next_hop.host
        );
        let forwarded = FindSuccessorRequest::new(&target, self.node.host());
        self.transport
            .send_find_successor(&next_hop.host, forwarded)
            .await
    }

    /// Accept or reject a predecessor hint. Adoption happens when no
    /// predecessor is known, or when the sender sits strictly between the
    /// current predecessor and this node. The reply carries this node's
    /// reference on adoption and is empty otherwise.
    pub(crate) async fn handle_notify(&self, req: &NotifyRequest) -> Result<NotifyResponse> {
        let sender = RemoteRef::from_wire(&req.id, &req.host, self.config.hash_bits);
        let adopt = match self.node.predecessor().await {
            None => true,
            Some(pred) => id::between(&pred.id, self.node.id(), &sender.id),
        };
        if !adopt {
            return Ok(NotifyResponse::empty());
        }

        info!("{}: adopting predecessor {}", self.name, sender.host);
        self.node.set_predecessor(sender).await;
        Ok(NotifyResponse::from(&self.node.self_ref()))
    }

    /// Submit a notify through the event queue and wait for its reply.
    pub async fn notify(&self, req: NotifyRequest) -> Result<NotifyResponse> {
        let (reply, rx) = oneshot::channel();
        self.submit(Event::Notify { req, reply }).await?;
        rx.await.map_err(|_| Error::ServerStopped)?
    }

    pub async fn get_predecessor(&self) -> Result<GetPredecessorResponse> {
        match self.node.predecessor().await {
            Some(pred) => Ok(GetPredecessorResponse::from(&pred)),
            None => Err(Error::NoPredecessor),
        }
    }

    pub async fn get_successor(&self) -> FindSuccessorResponse {
        FindSuccessorResponse::from(&self.node.successor().await)
    }

    /// Execute an admin command on the event loop.
    pub async fn execute(&self, cmd: Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Event::Command { cmd, reply }).await?;
        rx.await.map_err(|_| Error::ServerStopped)?
    }

    async fn submit(&self, event: Event) -> Result<()> {
        let guard = self.events.read().await;
        match guard.as_ref() {
            Some(tx) => tx.try_send(event).map_err(|_| Error::ServerStopped),
            None => Err(Error::ServerStopped),
        }
    }

    fn apply_command(&self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Leave => {
                info!("{}: leave requested; ring heals via stabilization", self.name);
                Ok(())
            }
        }
    }

    pub async fn finger_table(&self) -> Vec<FingerInfo> {
        self.node.finger_table().await
    }

    // ------------------------------------------------------------------
    // Join and maintenance
    // ------------------------------------------------------------------

    /// Bootstrap into an existing ring through `existing_host`. On transport
    /// failure nothing changes and the node stays a one-element ring.
    pub async fn join(&self, existing_host: &str) -> Result<()> {
        let req = FindSuccessorRequest::new(self.node.id(), self.node.host());
        let resp = self.transport.send_find_successor(existing_host, req).await?;
        let successor = RemoteRef::from_wire(&resp.id, &resp.host, self.config.hash_bits);
        info!(
            "{}: joined via {}, successor is {}",
            self.name, existing_host, successor.host
        );
        self.node.set_successor(successor).await;

        // The successor is adopted at this point, so a failure here is a
        // maintenance failure, not a join failure; the next tick retries.
        if let Err(e) = self.stabilize().await {
            warn!("{}: stabilize after join failed: {}", self.name, e);
        }
        Ok(())
    }

    /// One stabilization cycle: check the successor's predecessor, adopt a
    /// closer successor if one appeared, then notify the successor of self.
    pub async fn stabilize(&self) -> Result<()> {
        let successor = self.node.successor().await;

        match self.transport.send_get_predecessor(&successor.host).await {
            Ok(resp) => {
                let candidate =
                    RemoteRef::from_wire(&resp.id, &resp.host, self.config.hash_bits);
                // Either the ring was a single node pointing at itself, or a
                // node slid in between us and the successor.
                let adopt = successor.host == self.node.host()
                    || id::between(self.node.id(), &successor.id, &candidate.id);
                if adopt && candidate.host != successor.host {
                    info!(
                        "{}: successor {} -> {}",
                        self.name, successor.host, candidate.host
                    );
                }
                if adopt {
                    self.node.set_successor(candidate).await;
                }
            }
            Err(Error::NoPredecessor) => {}
            Err(e) => {
                warn!(
                    "{}: get_predecessor from {} failed: {}",
                    self.name, successor.host, e
                );
            }
        }

        let successor = self.node.successor().await;
        let req = NotifyRequest::new(self.node.id(), self.node.host(), &successor.host);
        self.transport.send_notify(req).await?;
        Ok(())
    }

    /// Refresh one finger-table slot, round-robin.
    pub async fn fix_finger(&self) -> Result<()> {
        let slot = self.node.advance_finger_cursor().await;
        let start = self.node.finger_start(slot).await;
        let req = FindSuccessorRequest::new(&start, self.node.host());
        let resp = self.find_successor(&req).await?;
        let owner = RemoteRef::from_wire(&resp.id, &resp.host, self.config.hash_bits);
        debug!("{}: finger[{}] = {}", self.name, slot, owner.host);
        self.node.set_finger(slot, owner).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawn the stabilize ticker, the fix-finger ticker, and the event
    /// loop. Fails with `AlreadyRunning` on re-entry.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == State::Running {
                return Err(Error::AlreadyRunning);
            }
            *state = State::Running;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        *self.events.write().await = Some(event_tx);
        *self.stop_tx.lock().await = Some(stop_tx);

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(Self::run_stabilize(
            self.clone(),
            stop_rx.clone(),
        )));
        tasks.push(tokio::spawn(Self::run_fix_finger(
            self.clone(),
            stop_rx.clone(),
        )));
        tasks.push(tokio::spawn(Self::run_events(
            self.clone(),
            event_rx,
            stop_rx,
        )));
        info!("{}: running on {}", self.name, self.node.host());
        Ok(())
    }

    /// Signal the background tasks and wait for all of them. Events still
    /// queued are dropped; their submitters observe `ServerStopped`.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == State::Stopped {
                return Err(Error::AlreadyStopped);
            }
            *state = State::Stopped;
        }

        *self.events.write().await = None;
        if let Some(stop_tx) = self.stop_tx.lock().await.take() {
            let _ = stop_tx.send(true);
        }
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        info!("{}: stopped", self.name);
        Ok(())
    }

    /// A ticker whose first tick fires after one full period.
    fn ticker(period: std::time::Duration) -> tokio::time::Interval {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    async fn run_stabilize(server: Arc<Server>, mut stop: watch::Receiver<bool>) {
        let mut ticker = Self::ticker(server.config.stabilize_interval);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = server.stabilize().await {
                        warn!("{}: stabilize cycle failed: {}", server.name, e);
                    }
                }
            }
        }
    }

    async fn run_fix_finger(server: Arc<Server>, mut stop: watch::Receiver<bool>) {
        let mut ticker = Self::ticker(server.config.fix_finger_interval);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = server.fix_finger().await {
                        warn!("{}: fix_finger cycle failed: {}", server.name, e);
                    }
                }
            }
        }
    }

    /// The single writer: applies queued mutations in FIFO order until the
    /// stop signal fires or the queue closes.
    async fn run_events(
        server: Arc<Server>,
        mut events: mpsc::Receiver<Event>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                event = events.recv() => match event {
                    Some(Event::Notify { req, reply }) => {
                        let resp = server.handle_notify(&req).await;
                        let _ = reply.send(resp);
                    }
                    Some(Event::Command { cmd, reply }) => {
                        let _ = reply.send(server.apply_command(cmd));
                    }
                    None => break,
                },
            }
        }
    }
}
