//! Typed messages of the JSON hub protocol.
//!
//! Only the message types a generic client consumes or produces are modeled:
//! invocation (1), completion (3), ping (6), and close (7), plus the
//! handshake pair exchanged before any of them. Field names follow the wire
//! protocol's camelCase spelling via serde renames; the numeric `type`
//! discriminator is attached and stripped by the codec, not stored here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved target receiving every invocation that matches no known binding.
pub const CATCH_ALL_TARGET: &str = "$__catchAll";

/// Protocol name the client offers during the handshake.
pub const PROTOCOL_NAME: &str = "json";

/// Protocol version the client offers during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

// Message type discriminators carried in the `type` member.
pub const TYPE_INVOCATION: u8 = 1;
pub const TYPE_COMPLETION: u8 = 3;
pub const TYPE_PING: u8 = 6;
pub const TYPE_CLOSE: u8 = 7;

// ── Handshake ─────────────────────────────────────────────────────────────────

/// First frame sent by the client after the transport opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

impl HandshakeRequest {
    /// The handshake this client always sends: JSON protocol, version 1.
    pub fn json_v1() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_owned(),
            version: PROTOCOL_VERSION,
        }
    }
}

/// Server reply to the handshake. An empty object means the server accepted
/// the offered protocol; a populated `error` member means it refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandshakeResponse {
    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }
}

// ── Hub messages ──────────────────────────────────────────────────────────────

/// A named method call. Inbound invocations dispatch to a subscription;
/// outbound ones carry a correlation id only when a completion is awaited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl InvocationMessage {
    /// Fire-and-forget invocation: no correlation id, no completion expected.
    pub fn send(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            invocation_id: None,
            target: target.into(),
            arguments,
        }
    }

    /// Correlated invocation awaiting exactly one completion.
    pub fn invoke(
        invocation_id: impl Into<String>,
        target: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            invocation_id: Some(invocation_id.into()),
            target: target.into(),
            arguments,
        }
    }
}

/// Correlated reply to an invocation. At most one of `result` and `error`
/// is populated; both absent means a void completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMessage {
    pub invocation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connection termination notice from either side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub allow_reconnect: bool,
}

/// Every post-handshake hub message this client handles.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation(InvocationMessage),
    Completion(CompletionMessage),
    Ping,
    Close(CloseMessage),
}

impl HubMessage {
    /// The numeric discriminator carried in the wire document's `type`
    /// member.
    pub fn message_type(&self) -> u8 {
        match self {
            HubMessage::Invocation(_) => TYPE_INVOCATION,
            HubMessage::Completion(_) => TYPE_COMPLETION,
            HubMessage::Ping => TYPE_PING,
            HubMessage::Close(_) => TYPE_CLOSE,
        }
    }
}
