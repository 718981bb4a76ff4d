use serde::{Deserialize, Serialize};

use super::PeerError;
use crate::blockchain::Block;

/// What an inbound envelope asks the node to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Mine a block holding just the payload, right now.
    AddBlock,
    /// Stage the payload.
    AddData,
    /// Mine whatever is pending.
    MineBlock,
    /// Payload is a JSON-encoded sealed block to append.
    SealedBlock,
    /// Greeting sent once by a node when it starts.
    NewPeer,
    Unknown(String),
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "AddBlock" => MessageKind::AddBlock,
            "AddData" => MessageKind::AddData,
            "MineBlock" => MessageKind::MineBlock,
            "SealedBlock" => MessageKind::SealedBlock,
            "NewPeer" => MessageKind::NewPeer,
            _ => MessageKind::Unknown(kind),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::AddBlock => "AddBlock".into(),
            MessageKind::AddData => "AddData".into(),
            MessageKind::MineBlock => "MineBlock".into(),
            MessageKind::SealedBlock => "SealedBlock".into(),
            MessageKind::NewPeer => "NewPeer".into(),
            MessageKind::Unknown(other) => other,
        }
    }
}

/// One message per connection, JSON encoded as `{"Type": ..., "Data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type", alias = "kind")]
    pub kind: MessageKind,
    #[serde(rename = "Data", alias = "payload", default)]
    pub payload: String,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn sealed_block(block: &Block) -> Result<Self, PeerError> {
        Ok(Self::new(
            MessageKind::SealedBlock,
            serde_json::to_string(block)?,
        ))
    }

    pub fn encode(&self) -> Result<Vec<u8>, PeerError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PeerError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
