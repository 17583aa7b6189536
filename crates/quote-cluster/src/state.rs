//! Election state of a single node

use crate::error::{ClusterError, Result};
use crate::node::NodeRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Phase of the per-node election state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePhase {
    /// Start-up, before the leader discovery probe has run
    Discovering,
    /// Own election in flight, waiting for an OK
    Electing,
    /// A senior node answered OK; waiting for its COORDINATOR
    AwaitingCoordinator,
    /// This node is the coordinator
    Leader,
    /// Another node is the coordinator
    Follower,
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovering => write!(f, "discovering"),
            Self::Electing => write!(f, "electing"),
            Self::AwaitingCoordinator => write!(f, "awaiting_coordinator"),
            Self::Leader => write!(f, "leader"),
            Self::Follower => write!(f, "follower"),
        }
    }
}

/// How an election round ended for the node that ran it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// No OK arrived before the deadline; this node promoted itself
    BecameLeader,
    /// A senior node answered; this node defers to it
    Deferred,
}

/// Completion signal of the active election, observed by coalesced callers
pub type OutcomeReceiver = watch::Receiver<Option<ElectionOutcome>>;

#[derive(Debug)]
struct ActiveElection {
    id: String,
    done: watch::Sender<Option<ElectionOutcome>>,
}

/// Leadership state of one node.
///
/// Only the named transitions below mutate it; the engine holds it behind a
/// single mutex so that every "read, decide, mutate" step is atomic.
#[derive(Debug)]
pub struct ElectionState {
    self_id: String,
    phase: NodePhase,
    current_leader_id: Option<String>,
    active: Option<ActiveElection>,
}

impl ElectionState {
    pub fn new<S: Into<String>>(self_id: S) -> Self {
        Self {
            self_id: self_id.into(),
            phase: NodePhase::Discovering,
            current_leader_id: None,
            active: None,
        }
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn is_leader(&self) -> bool {
        self.phase == NodePhase::Leader
    }

    pub fn role(&self) -> NodeRole {
        if self.is_leader() {
            NodeRole::Leader
        } else {
            NodeRole::Follower
        }
    }

    pub fn current_leader_id(&self) -> Option<&str> {
        self.current_leader_id.as_deref()
    }

    pub fn active_election_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    /// Subscribe to the completion of the election currently in flight
    pub fn join_active(&self) -> Option<OutcomeReceiver> {
        self.active.as_ref().map(|a| a.done.subscribe())
    }

    /// Start a new election round, forgetting the current leader
    pub fn begin_election<S: Into<String>>(&mut self, election_id: S) -> Result<OutcomeReceiver> {
        if let Some(active) = &self.active {
            return Err(ClusterError::invalid_state(format!(
                "election {} is already active",
                active.id
            )));
        }

        let (done, receiver) = watch::channel(None);
        self.active = Some(ActiveElection {
            id: election_id.into(),
            done,
        });
        self.phase = NodePhase::Electing;
        self.current_leader_id = None;
        Ok(receiver)
    }

    /// Close election `election_id`.
    ///
    /// With `received_ok` the node defers: it waits for a COORDINATOR unless
    /// one was already recognized while the round was in flight. Without it
    /// the node promotes itself.
    pub fn finish_election(&mut self, election_id: &str, received_ok: bool) -> Result<ElectionOutcome> {
        match &self.active {
            Some(active) if active.id == election_id => {}
            Some(active) => {
                return Err(ClusterError::invalid_state(format!(
                    "cannot finish election {} while {} is active",
                    election_id, active.id
                )))
            }
            None => {
                return Err(ClusterError::invalid_state(format!(
                    "cannot finish election {}: no election is active",
                    election_id
                )))
            }
        }

        let outcome = if received_ok {
            self.defer();
            ElectionOutcome::Deferred
        } else {
            self.promote();
            ElectionOutcome::BecameLeader
        };

        if let Some(active) = self.active.take() {
            let _ = active.done.send(Some(outcome));
        }
        Ok(outcome)
    }

    /// Yield to a senior node and wait for its COORDINATOR.
    ///
    /// A leader already recognized during the round is kept.
    pub fn defer(&mut self) {
        if self.current_leader_id.is_none() {
            self.phase = NodePhase::AwaitingCoordinator;
        }
    }

    /// Make this node the leader
    pub fn promote(&mut self) {
        self.phase = NodePhase::Leader;
        self.current_leader_id = Some(self.self_id.clone());
    }

    /// Accept a COORDINATOR announcement from `leader_id`
    pub fn recognize_leader<S: Into<String>>(&mut self, leader_id: S) {
        let leader_id = leader_id.into();
        self.phase = if leader_id == self.self_id {
            NodePhase::Leader
        } else {
            NodePhase::Follower
        };
        self.current_leader_id = Some(leader_id);
    }

    /// Adopt a leader found by the discovery probe.
    ///
    /// Ignored unless the node is still discovering; returns whether it applied.
    pub fn leader_found<S: Into<String>>(&mut self, leader_id: S) -> bool {
        if self.phase != NodePhase::Discovering {
            return false;
        }
        self.recognize_leader(leader_id);
        true
    }

    /// Check the structural invariants of the state
    pub fn check_invariants(&self) -> Result<()> {
        if self.is_leader() && self.current_leader_id.as_deref() != Some(self.self_id.as_str()) {
            return Err(ClusterError::invalid_state(
                "node is leader but does not record itself as current leader",
            ));
        }
        if self.phase == NodePhase::Electing && self.active.is_none() {
            return Err(ClusterError::invalid_state(
                "node is electing without an active election",
            ));
        }
        Ok(())
    }
}
