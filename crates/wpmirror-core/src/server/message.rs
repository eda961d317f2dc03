//! Client protocol message types
//!
//! One JSON object per WebSocket text frame.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{Post, RemoteId};
use crate::store::ChangeLedger;

/// Requests sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "req", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Acknowledge a broadcast; never answered
    Ack,

    /// Ask for every stored id
    IdList,

    /// Ask for one post
    Post { id: RemoteId },
}

/// Replies sent to the requesting client only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ack", content = "obj", rename_all = "snake_case")]
pub enum ServerReply {
    IdList(Vec<String>),

    /// `null` when the id is unknown
    Post(Option<Post>),
}

impl ClientRequest {
    /// Decode a text frame
    ///
    /// Invalid JSON and well-formed JSON that is not a known request are
    /// reported separately.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
        serde_json::from_value(value).map_err(ProtocolError::Request)
    }

    /// Encode as a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

impl ServerReply {
    /// Encode as a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Encode a ledger snapshot as the broadcast message
pub fn encode_broadcast(ledger: &ChangeLedger) -> Result<String, ProtocolError> {
    serde_json::to_string(ledger).map_err(ProtocolError::Encode)
}

/// Decode a broadcast message
pub fn decode_broadcast(text: &str) -> Result<ChangeLedger, serde_json::Error> {
    serde_json::from_str(text)
}
