//! Base codec for the JSON hub protocol.
//!
//! Turns record-separated JSON frames into typed [`HubMessage`]s and back.
//! Every wire document carries a numeric `type` member:
//! ```text
//! {"type":1,"target":"Foo","arguments":[...],"invocationId":"5"}  invocation
//! {"type":3,"invocationId":"5","result":...}                      completion
//! {"type":6}                                                      ping
//! {"type":7,"error":"...","allowReconnect":true}                  close
//! ```
//! The codec sits behind the [`HubCodec`] trait so the catch-all router can
//! decorate it transparently; the [`InvocationBinder`] seam is how either
//! codec asks the layer above which targets are known and at what arity.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::protocol::frame::{self, FrameError};
use crate::protocol::messages::{
    CloseMessage, CompletionMessage, HandshakeRequest, HandshakeResponse, HubMessage,
    InvocationMessage, TYPE_CLOSE, TYPE_COMPLETION, TYPE_INVOCATION, TYPE_PING,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No complete frame is buffered yet; read more bytes and retry. Nothing
    /// has been consumed.
    #[error("need more data: no complete frame in {available} buffered bytes")]
    NeedMoreData { available: usize },

    /// The frame's `type` member is not a message type this client handles.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u64),

    /// The frame is complete but structurally not a hub message.
    #[error("malformed hub message: {0}")]
    MalformedPayload(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FrameError> for CodecError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Incomplete { available } => CodecError::NeedMoreData { available },
        }
    }
}

/// Answers arity questions during inbound classification.
///
/// Implemented by the subscription registry: the router asks it whether a
/// target is locally bound and how many parameters the binding expects.
#[cfg_attr(test, mockall::automock)]
pub trait InvocationBinder: Send + Sync {
    /// Number of parameters the named target expects, or `None` when the
    /// target is unknown.
    fn parameter_count(&self, target: &str) -> Option<usize>;
}

/// One hub-protocol codec: parses complete frames into messages and encodes
/// messages into framed bytes.
pub trait HubCodec: Send + Sync {
    /// Attempts to parse one message from the front of `input`.
    ///
    /// On success returns the message and the number of bytes consumed,
    /// record separator included; the caller drains that prefix before the
    /// next call. [`CodecError::NeedMoreData`] means no byte was consumed
    /// and the caller should buffer more input. Any other error refers to a
    /// complete but undecodable frame and ends the codec's usefulness for
    /// this stream.
    fn try_parse_message(
        &self,
        input: &[u8],
        binder: &dyn InvocationBinder,
    ) -> Result<(HubMessage, usize), CodecError>;

    /// Encodes `message` as a single framed byte sequence.
    fn write_message(&self, message: &HubMessage) -> Result<Vec<u8>, CodecError>;
}

// ── Base JSON codec ───────────────────────────────────────────────────────────

/// The plain JSON hub codec. Classifies frames strictly by their `type`
/// member and ignores the binder; arity-aware rerouting is the decorator's
/// job.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHubCodec;

impl JsonHubCodec {
    pub fn new() -> Self {
        Self
    }
}

impl HubCodec for JsonHubCodec {
    fn try_parse_message(
        &self,
        input: &[u8],
        _binder: &dyn InvocationBinder,
    ) -> Result<(HubMessage, usize), CodecError> {
        let (payload, consumed) = frame::split_frame(input)?;
        let message = parse_hub_payload(payload)?;
        trace!(message_type = message.message_type(), consumed, "parsed hub frame");
        Ok((message, consumed))
    }

    fn write_message(&self, message: &HubMessage) -> Result<Vec<u8>, CodecError> {
        match message {
            HubMessage::Invocation(inv) => tagged_frame(TYPE_INVOCATION, inv),
            HubMessage::Completion(completion) => tagged_frame(TYPE_COMPLETION, completion),
            HubMessage::Ping => tagged_frame(TYPE_PING, &EmptyBody {}),
            HubMessage::Close(close) => tagged_frame(TYPE_CLOSE, close),
        }
    }
}

// ── Handshake framing ─────────────────────────────────────────────────────────

/// Encodes the client handshake as a single frame. Sent before any hub
/// message after the transport opens.
pub fn encode_handshake_request(request: &HandshakeRequest) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    frame::write_frame(&mut out, &serde_json::to_vec(request)?);
    Ok(out)
}

/// Parses the server's handshake response from the front of `input`.
///
/// Returns the response and the bytes consumed. Signals
/// [`CodecError::NeedMoreData`] until the response frame is complete; bytes
/// after the response frame (the server may pipeline messages behind it)
/// are left untouched.
pub fn decode_handshake_response(input: &[u8]) -> Result<(HandshakeResponse, usize), CodecError> {
    let (payload, consumed) = frame::split_frame(input)?;
    let response: HandshakeResponse = serde_json::from_slice(payload)?;
    Ok((response, consumed))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Serialization target for bodyless messages such as ping.
#[derive(Serialize)]
struct EmptyBody {}

/// Builds one framed wire document: the `type` discriminator first, then the
/// body's fields.
fn tagged_frame<T: Serialize>(message_type: u8, body: &T) -> Result<Vec<u8>, CodecError> {
    let mut doc = serde_json::Map::new();
    doc.insert("type".to_owned(), Value::from(message_type));
    match serde_json::to_value(body)? {
        Value::Object(fields) => doc.extend(fields),
        other => {
            return Err(CodecError::MalformedPayload(format!(
                "message body serialized to non-object JSON: {other}"
            )))
        }
    }
    let mut out = Vec::new();
    frame::write_frame(&mut out, &serde_json::to_vec(&Value::Object(doc))?);
    Ok(out)
}

/// Classifies one complete frame payload by its `type` member and decodes
/// the matching typed message.
fn parse_hub_payload(payload: &[u8]) -> Result<HubMessage, CodecError> {
    let doc: Value = serde_json::from_slice(payload)?;
    let message_type = doc
        .get("type")
        .and_then(Value::as_u64)
        .ok_or_else(|| CodecError::MalformedPayload("missing numeric `type` member".to_owned()))?;

    match message_type {
        t if t == u64::from(TYPE_INVOCATION) => {
            let inv: InvocationMessage = serde_json::from_value(doc)?;
            Ok(HubMessage::Invocation(inv))
        }
        t if t == u64::from(TYPE_COMPLETION) => {
            let completion: CompletionMessage = serde_json::from_value(doc)?;
            Ok(HubMessage::Completion(completion))
        }
        t if t == u64::from(TYPE_PING) => Ok(HubMessage::Ping),
        t if t == u64::from(TYPE_CLOSE) => {
            let close: CloseMessage = serde_json::from_value(doc)?;
            Ok(HubMessage::Close(close))
        }
        other => Err(CodecError::UnknownMessageType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Binder that knows nothing; the base codec must never consult it.
    struct UnknownAll;

    impl InvocationBinder for UnknownAll {
        fn parameter_count(&self, _target: &str) -> Option<usize> {
            None
        }
    }

    fn parse(input: &[u8]) -> Result<(HubMessage, usize), CodecError> {
        JsonHubCodec::new().try_parse_message(input, &UnknownAll)
    }

    /// Encodes `msg`, parses it back, and checks full consumption.
    fn round_trip(msg: &HubMessage) -> HubMessage {
        let bytes = JsonHubCodec::new().write_message(msg).unwrap();
        let (parsed, consumed) = parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len(), "whole frame must be consumed");
        parsed
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[test]
    fn test_send_invocation_round_trip() {
        let msg = HubMessage::Invocation(InvocationMessage::send(
            "Notify",
            vec![json!("status"), json!(17)],
        ));
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_invoke_invocation_round_trip() {
        let msg = HubMessage::Invocation(InvocationMessage::invoke(
            "12",
            "Add",
            vec![json!(1), json!(2)],
        ));
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_invocation_no_arguments_round_trip() {
        let msg = HubMessage::Invocation(InvocationMessage::send("Tick", vec![]));
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_completion_result_round_trip() {
        let msg = HubMessage::Completion(CompletionMessage {
            invocation_id: "12".to_owned(),
            result: Some(json!({ "ok": true })),
            error: None,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_completion_error_round_trip() {
        let msg = HubMessage::Completion(CompletionMessage {
            invocation_id: "13".to_owned(),
            result: None,
            error: Some("no such method".to_owned()),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_ping_round_trip() {
        assert_eq!(round_trip(&HubMessage::Ping), HubMessage::Ping);
    }

    #[test]
    fn test_close_round_trip() {
        let msg = HubMessage::Close(CloseMessage {
            error: Some("server shutting down".to_owned()),
            allow_reconnect: true,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Wire shape ────────────────────────────────────────────────────────────

    #[test]
    fn test_written_frame_ends_with_record_separator() {
        let bytes = JsonHubCodec::new().write_message(&HubMessage::Ping).unwrap();

        assert_eq!(bytes.last(), Some(&0x1Eu8));
    }

    #[test]
    fn test_written_frame_puts_type_first() {
        let bytes = JsonHubCodec::new().write_message(&HubMessage::Ping).unwrap();

        assert!(
            bytes.starts_with(b"{\"type\":6"),
            "interop tools expect the discriminator up front: {:?}",
            String::from_utf8_lossy(&bytes)
        );
    }

    #[test]
    fn test_parses_wire_invocation_from_server() {
        // Shape as emitted by a standard hub server.
        let input = b"{\"type\":1,\"target\":\"ReceiveMessage\",\"arguments\":[\"bob\",\"hi\"]}\x1e";

        let (msg, consumed) = parse(input).unwrap();

        assert_eq!(consumed, input.len());
        match msg {
            HubMessage::Invocation(inv) => {
                assert_eq!(inv.target, "ReceiveMessage");
                assert_eq!(inv.arguments, vec![json!("bob"), json!("hi")]);
                assert_eq!(inv.invocation_id, None);
            }
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    // ── Error paths ───────────────────────────────────────────────────────────

    #[test]
    fn test_incomplete_frame_needs_more_data() {
        let result = parse(b"{\"type\":6}");

        assert!(
            matches!(result, Err(CodecError::NeedMoreData { available: 10 })),
            "got {result:?}"
        );
    }

    #[test]
    fn test_empty_input_needs_more_data() {
        assert!(matches!(
            parse(b""),
            Err(CodecError::NeedMoreData { available: 0 })
        ));
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let result = parse(b"{\"type\":4,\"invocationId\":\"1\",\"target\":\"S\"}\x1e");

        assert!(matches!(result, Err(CodecError::UnknownMessageType(4))));
    }

    #[test]
    fn test_missing_type_member_is_malformed() {
        let result = parse(b"{\"target\":\"Foo\"}\x1e");

        assert!(matches!(result, Err(CodecError::MalformedPayload(_))));
    }

    #[test]
    fn test_non_object_frame_is_malformed() {
        let result = parse(b"[1,2,3]\x1e");

        assert!(matches!(result, Err(CodecError::MalformedPayload(_))));
    }

    #[test]
    fn test_invalid_json_frame_is_rejected() {
        let result = parse(b"{\"type\":1,\x1e");

        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_second_frame_left_in_buffer() {
        let input = b"{\"type\":6}\x1e{\"type\":6}\x1e";

        let (_, consumed) = parse(input).unwrap();

        assert_eq!(consumed, 11, "only the first frame may be consumed");
        let (second, second_consumed) = parse(&input[consumed..]).unwrap();
        assert_eq!(second, HubMessage::Ping);
        assert_eq!(consumed + second_consumed, input.len());
    }

    // ── Handshake ─────────────────────────────────────────────────────────────

    #[test]
    fn test_handshake_request_wire_bytes() {
        let bytes = encode_handshake_request(&HandshakeRequest::json_v1()).unwrap();

        assert_eq!(bytes, b"{\"protocol\":\"json\",\"version\":1}\x1e");
    }

    #[test]
    fn test_handshake_response_success() {
        let (response, consumed) = decode_handshake_response(b"{}\x1e").unwrap();

        assert!(response.is_accepted());
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_handshake_response_refusal() {
        let input = b"{\"error\":\"Requested protocol 'json' is not available.\"}\x1e";

        let (response, _) = decode_handshake_response(input).unwrap();

        assert!(!response.is_accepted());
        assert_eq!(
            response.error.as_deref(),
            Some("Requested protocol 'json' is not available.")
        );
    }

    #[test]
    fn test_handshake_response_keeps_pipelined_messages() {
        // Servers may pipeline the first ping directly behind the handshake.
        let input = b"{}\x1e{\"type\":6}\x1e";

        let (response, consumed) = decode_handshake_response(input).unwrap();

        assert!(response.is_accepted());
        let (next, _) = parse(&input[consumed..]).unwrap();
        assert_eq!(next, HubMessage::Ping);
    }

    #[test]
    fn test_handshake_response_incomplete() {
        assert!(matches!(
            decode_handshake_response(b"{"),
            Err(CodecError::NeedMoreData { .. })
        ));
    }
}
