//! Quote Cluster Coordination
//!
//! This crate elects a single leader among the nodes of a quote ingestion
//! cluster. It provides the election engine, its timers and state machine,
//! an HTTP and an in-process transport, and the status endpoints each node
//! serves.

pub mod communication;
pub mod config;
pub mod election;
pub mod error;
pub mod local_bus;
pub mod message;
pub mod node;
pub mod pending;
pub mod scheduler;
pub mod server;
pub mod state;

pub use communication::{ElectionTransport, HttpPeers, PeerProbe, StatusReport, StatusSource};
pub use config::ClusterConfig;
pub use election::ElectionEngine;
pub use error::{ClusterError, Result};
pub use local_bus::{LocalBus, LocalTransport};
pub use message::{ElectionMessage, MessageType};
pub use node::{KnownPeers, NodeIdentity, NodeRole};
pub use pending::PendingElections;
pub use scheduler::{Scheduler, TimerKey};
pub use server::election_router;
pub use state::{ElectionOutcome, ElectionState, NodePhase};
