//! Election protocol messages

use crate::node::NodeIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of an election message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// A node asks every peer whether a more senior node is alive
    Election,
    /// A more senior node answers an ELECTION and takes over the round
    Ok,
    /// The winner announces itself to every node
    Coordinator,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Election => write!(f, "ELECTION"),
            Self::Ok => write!(f, "OK"),
            Self::Coordinator => write!(f, "COORDINATOR"),
        }
    }
}

/// Message exchanged between nodes during an election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionMessage {
    pub election_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender_id: String,
    pub sender_birth_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl ElectionMessage {
    fn from_sender(election_id: String, message_type: MessageType, sender: &NodeIdentity) -> Self {
        Self {
            election_id,
            message_type,
            sender_id: sender.id().to_string(),
            sender_birth_time: sender.birth_time(),
            payload: None,
        }
    }

    /// ELECTION for round `election_id`
    pub fn election<S: Into<String>>(election_id: S, sender: &NodeIdentity) -> Self {
        Self::from_sender(election_id.into(), MessageType::Election, sender)
    }

    /// OK answering round `election_id`
    pub fn ok<S: Into<String>>(election_id: S, sender: &NodeIdentity) -> Self {
        Self::from_sender(election_id.into(), MessageType::Ok, sender)
    }

    /// COORDINATOR announcement; carries a fresh id of its own
    pub fn coordinator(sender: &NodeIdentity) -> Self {
        Self::from_sender(Uuid::new_v4().to_string(), MessageType::Coordinator, sender)
    }
}
