//! Bully-style leader election.
//!
//! Priority is the process birth time: the node started first wins. An
//! election sends ELECTION to every peer and waits a bounded time for an OK.
//! Silence means no senior node is alive and the node announces itself with
//! COORDINATOR; an OK means a senior node took the round over.

use crate::communication::{
    ElectionTransport, HttpPeers, PeerProbe, StatusReport, StatusSource, ALIVE,
};
use crate::config::ClusterConfig;
use crate::error::Result;
use crate::local_bus::LocalBus;
use crate::message::{ElectionMessage, MessageType};
use crate::node::{KnownPeers, NodeIdentity};
use crate::pending::PendingElections;
use crate::scheduler::{Scheduler, TimerKey};
use crate::state::{ElectionOutcome, ElectionState, NodePhase, OutcomeReceiver};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Boxed election future, spawnable from the engine's own timers
pub type ElectionFuture<'a> = Pin<Box<dyn Future<Output = ElectionOutcome> + Send + 'a>>;

struct Inner {
    identity: NodeIdentity,
    peers: KnownPeers,
    config: ClusterConfig,
    transport: Arc<dyn ElectionTransport>,
    probe: Arc<dyn PeerProbe>,
    state: Mutex<ElectionState>,
    pending: PendingElections,
    scheduler: Scheduler,
    started: AtomicBool,
}

/// Election engine of one node; clones share the same state
#[derive(Clone)]
pub struct ElectionEngine {
    inner: Arc<Inner>,
}

impl ElectionEngine {
    pub fn new(
        identity: NodeIdentity,
        config: &ClusterConfig,
        transport: Arc<dyn ElectionTransport>,
        probe: Arc<dyn PeerProbe>,
    ) -> Self {
        if identity.id() != config.node_id {
            warn!(
                "Node identity {} differs from configured node id {}",
                identity.id(),
                config.node_id
            );
        }
        let peers = config.known_peers();
        let state = ElectionState::new(identity.id());

        Self {
            inner: Arc::new(Inner {
                identity,
                peers,
                config: config.clone(),
                transport,
                probe,
                state: Mutex::new(state),
                pending: PendingElections::new(),
                scheduler: Scheduler::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Engine reaching its peers over HTTP
    pub fn with_http(identity: NodeIdentity, config: &ClusterConfig) -> Result<Self> {
        let http = Arc::new(HttpPeers::new(config.known_peers(), config.probe_timeout())?);
        Ok(Self::new(identity, config, http.clone(), http))
    }

    /// Engine reaching its peers through an in-process bus.
    ///
    /// The engine still has to be attached with [`LocalBus::join`].
    pub fn on_bus(identity: NodeIdentity, config: &ClusterConfig, bus: &LocalBus) -> Self {
        let transport = Arc::new(bus.transport(identity.id()));
        Self::new(identity, config, transport.clone(), transport)
    }

    pub fn my_id(&self) -> &str {
        self.inner.identity.id()
    }

    pub fn my_birth_time(&self) -> i64 {
        self.inner.identity.birth_time()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.inner.identity
    }

    pub fn peers(&self) -> &KnownPeers {
        &self.inner.peers
    }

    pub async fn is_leader(&self) -> bool {
        self.inner.state.lock().await.is_leader()
    }

    pub async fn current_leader_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .await
            .current_leader_id()
            .map(ToString::to_string)
    }

    pub async fn phase(&self) -> NodePhase {
        self.inner.state.lock().await.phase()
    }

    /// Verify the leadership invariants of the local state
    pub async fn check_invariants(&self) -> Result<()> {
        self.inner.state.lock().await.check_invariants()
    }

    pub async fn status_report(&self) -> StatusReport {
        let state = self.inner.state.lock().await;
        StatusReport {
            node_id: self.my_id().to_string(),
            role: state.role(),
            phase: state.phase(),
            leader_id: state.current_leader_id().map(ToString::to_string),
            birth_time: self.my_birth_time(),
        }
    }

    /// Schedule leader discovery; only the first call has an effect
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("Election engine of {} already started", self.my_id());
            return;
        }

        info!(
            "Starting election engine of {} (birth time {}, {} peers)",
            self.my_id(),
            self.my_birth_time(),
            self.inner.peers.len()
        );

        let engine = self.clone();
        self.inner
            .scheduler
            .schedule(TimerKey::Discovery, self.inner.config.discovery_delay(), async move {
                engine.discover_leader().await;
            });
    }

    /// Adopt a peer that already reports itself as leader, or run an election
    async fn discover_leader(&self) {
        for peer in self.inner.peers.iter() {
            match self.inner.probe.status(peer).await {
                Ok(report) if report.is_leader() => {
                    if self.inner.state.lock().await.leader_found(peer) {
                        info!("Node {} discovered existing leader {}", self.my_id(), peer);
                    }
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!("Peer {} unreachable during discovery: {}", peer, e),
            }
        }

        if self.phase().await == NodePhase::Discovering {
            info!("No leader found by {}, starting election", self.my_id());
            self.start_election().await;
        }
    }

    /// Run an election, or join the one already in flight.
    ///
    /// The round runs on its own task: dropping the returned future stops
    /// the wait, never the round.
    pub fn start_election(&self) -> ElectionFuture<'_> {
        let engine = self.clone();
        Box::pin(async move {
            match tokio::spawn(async move { engine.run_election().await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Election round aborted: {}", e);
                    ElectionOutcome::Deferred
                }
            }
        })
    }

    async fn run_election(&self) -> ElectionOutcome {
        let election_id = Uuid::new_v4().to_string();

        let (guard, ok_signal, deadline) = {
            let mut state = self.inner.state.lock().await;
            if let Some(done) = state.join_active() {
                drop(state);
                debug!("Node {} joining election already in flight", self.my_id());
                return Self::await_outcome(done).await;
            }

            if let Err(e) = state.begin_election(election_id.as_str()) {
                warn!("Node {} could not begin election: {}", self.my_id(), e);
                return ElectionOutcome::Deferred;
            }
            let (guard, ok_signal) = self.inner.pending.register(election_id.as_str());
            (guard, ok_signal, Instant::now() + self.inner.config.ok_wait())
        };
        self.inner.scheduler.cancel(TimerKey::Reassert);

        info!("Node {} starting election {}", self.my_id(), election_id);
        let message = ElectionMessage::election(election_id.as_str(), &self.inner.identity);
        for peer in self.inner.peers.iter() {
            let transport = Arc::clone(&self.inner.transport);
            let peer = peer.to_string();
            let message = message.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.send_to(&peer, message).await {
                    debug!("ELECTION to {} failed: {}", peer, e);
                }
            });
        }

        let received_ok = matches!(tokio::time::timeout_at(deadline, ok_signal).await, Ok(Ok(())));
        drop(guard);

        let outcome = {
            let mut state = self.inner.state.lock().await;
            match state.finish_election(&election_id, received_ok) {
                Ok(outcome) => {
                    if state.phase() == NodePhase::AwaitingCoordinator {
                        self.arm_coordinator_wait();
                    }
                    outcome
                }
                Err(e) => {
                    warn!("Node {} could not finish election: {}", self.my_id(), e);
                    ElectionOutcome::Deferred
                }
            }
        };

        match outcome {
            ElectionOutcome::BecameLeader => self.announce(),
            ElectionOutcome::Deferred => {
                info!("Node {} deferred election {} to a senior node", self.my_id(), election_id)
            }
        }
        outcome
    }

    async fn await_outcome(mut done: OutcomeReceiver) -> ElectionOutcome {
        match done.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(ElectionOutcome::Deferred),
            Err(_) => ElectionOutcome::Deferred,
        }
    }

    fn arm_coordinator_wait(&self) {
        let engine = self.clone();
        let wait = self.inner.config.coordinator_wait();
        self.inner
            .scheduler
            .schedule(TimerKey::CoordinatorWait, wait, async move {
                if engine.phase().await == NodePhase::AwaitingCoordinator {
                    warn!(
                        "Node {} received no COORDINATOR within {:?}, re-running election",
                        engine.my_id(),
                        wait
                    );
                    engine.start_election().await;
                }
            });
    }

    /// Answer an ELECTION from a junior node and assert our own candidacy
    pub async fn on_election_received(&self, message: ElectionMessage) {
        if !self.inner.identity.is_senior_to(message.sender_birth_time) {
            debug!(
                "Node {} ignoring ELECTION {} from senior node {}",
                self.my_id(),
                message.election_id,
                message.sender_id
            );
            return;
        }

        let reply = ElectionMessage::ok(message.election_id.as_str(), &self.inner.identity);
        let transport = Arc::clone(&self.inner.transport);
        let requester = message.sender_id;
        tokio::spawn(async move {
            if let Err(e) = transport.send_to(&requester, reply).await {
                warn!("Failed to send OK to {}: {}", requester, e);
            }
        });

        let engine = self.clone();
        self.inner
            .scheduler
            .schedule_if_idle(TimerKey::Reassert, self.inner.config.settle_delay(), async move {
                engine.start_election().await;
            });
    }

    /// Resolve a pending election; late and duplicate OKs are ignored
    pub fn on_ok(&self, election_id: &str) -> bool {
        let resolved = self.inner.pending.resolve(election_id);
        if !resolved {
            debug!("Node {} ignoring OK for inactive election {}", self.my_id(), election_id);
        }
        resolved
    }

    /// Accept `sender_id` as the leader
    pub async fn on_coordinator(&self, sender_id: &str) {
        self.inner.scheduler.cancel(TimerKey::CoordinatorWait);

        let mut state = self.inner.state.lock().await;
        let known = state.current_leader_id() == Some(sender_id);
        state.recognize_leader(sender_id);
        drop(state);

        if known {
            debug!("Node {} already follows {}", self.my_id(), sender_id);
        } else {
            info!("Node {} recognizes {} as leader", self.my_id(), sender_id);
        }
    }

    /// Take leadership and announce it to every peer
    pub async fn become_leader(&self) {
        self.inner.state.lock().await.promote();
        self.announce();
    }

    fn announce(&self) {
        self.inner.scheduler.cancel(TimerKey::CoordinatorWait);
        info!("Node {} is now the leader", self.my_id());

        let transport = Arc::clone(&self.inner.transport);
        let message = ElectionMessage::coordinator(&self.inner.identity);
        tokio::spawn(async move {
            transport.broadcast(message).await;
        });
    }

    /// Probe the current leader and re-elect when it is missing or unhealthy.
    ///
    /// Returns the outcome of the election it triggered, if any.
    pub async fn ping_leader(&self) -> Option<ElectionOutcome> {
        let (is_leader, leader) = {
            let state = self.inner.state.lock().await;
            (state.is_leader(), state.current_leader_id().map(ToString::to_string))
        };

        if is_leader {
            return None;
        }

        let leader = match leader {
            Some(leader) => leader,
            None => {
                info!("Node {} knows no leader, starting election", self.my_id());
                return Some(self.start_election().await);
            }
        };

        match self.inner.probe.ping(&leader).await {
            Ok(body) if body.trim() == ALIVE => {
                debug!("Leader {} is alive", leader);
                None
            }
            Ok(body) => {
                warn!("Leader {} answered ping with {:?}, starting election", leader, body);
                Some(self.start_election().await)
            }
            Err(e) => {
                warn!("Leader {} unreachable ({}), starting election", leader, e);
                Some(self.start_election().await)
            }
        }
    }

    /// Dispatch an inbound message by type
    pub async fn handle_message(&self, message: ElectionMessage) {
        debug!(
            "Node {} received {} from {}",
            self.my_id(),
            message.message_type,
            message.sender_id
        );

        match message.message_type {
            MessageType::Election => self.on_election_received(message).await,
            MessageType::Ok => {
                self.on_ok(&message.election_id);
            }
            MessageType::Coordinator => self.on_coordinator(&message.sender_id).await,
        }
    }

    /// Process inbound messages one at a time until the sender side closes
    pub fn spawn_listener(&self, mut inbox: mpsc::UnboundedReceiver<ElectionMessage>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                engine.handle_message(message).await;
            }
            debug!("Election listener of {} stopped", engine.my_id());
        })
    }

    /// Abort every pending timer
    pub fn shutdown(&self) {
        info!("Stopping election engine of {}", self.my_id());
        self.inner.scheduler.shutdown();
    }
}

#[async_trait]
impl StatusSource for ElectionEngine {
    async fn status_report(&self) -> StatusReport {
        ElectionEngine::status_report(self).await
    }
}
