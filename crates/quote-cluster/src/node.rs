//! Node identity and cluster membership

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node process.
///
/// `birth_time` is captured once, when the process starts, and is the sole
/// priority key of an election: the smaller birth time wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    id: String,
    birth_time: i64,
}

impl NodeIdentity {
    /// Capture the identity of the running process from the wall clock
    pub fn capture<S: Into<String>>(id: S) -> Self {
        Self::with_birth_time(id, chrono::Utc::now().timestamp_millis())
    }

    /// Identity with an explicit birth time (epoch millis)
    pub fn with_birth_time<S: Into<String>>(id: S, birth_time: i64) -> Self {
        Self {
            id: id.into(),
            birth_time,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn birth_time(&self) -> i64 {
        self.birth_time
    }

    /// Whether this node outranks a node born at `other_birth_time`
    pub fn is_senior_to(&self, other_birth_time: i64) -> bool {
        self.birth_time < other_birth_time
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Ordered, de-duplicated set of peer identities, never containing self
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPeers {
    peers: Vec<String>,
}

impl KnownPeers {
    /// Build the peer set of `self_id` from a list of cluster members
    pub fn new<'a, I>(self_id: &str, members: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut peers: Vec<String> = Vec::new();
        for member in members {
            let member = member.trim();
            if member.is_empty() || member == self_id {
                continue;
            }
            if !peers.iter().any(|p| p == member) {
                peers.push(member.to_string());
            }
        }
        Self { peers }
    }

    /// Build the peer set from a comma-separated member list
    pub fn parse_csv(self_id: &str, csv: &str) -> Self {
        Self::new(self_id, csv.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.peers.iter().any(|p| p == peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Externally visible role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Node currently authorized to persist quotes
    Leader,

    /// Any node that is not the leader
    Follower,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::Follower => write!(f, "follower"),
        }
    }
}
