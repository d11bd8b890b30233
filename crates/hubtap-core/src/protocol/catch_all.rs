//! Catch-all routing decorator over a base hub codec.
//!
//! A generic inspection client cannot know a server's contract up front, so
//! invocations that match no locally bound target must not be dropped or
//! errored. This decorator peeks at every complete inbound frame: when the
//! frame is an invocation whose target and argument count the binder
//! recognizes, it falls through to the inner codec untouched; otherwise it
//! repackages the frame as an invocation of the reserved `$__catchAll`
//! target whose single argument is the entire original envelope. Subscribing
//! to that one name therefore receives every server call the client did not
//! specifically bind.
//!
//! The peek must never fail a message the inner codec could handle: any
//! classification miss (unparseable JSON, missing or non-string fields,
//! unexpected shapes) abandons the peek and delegates the original,
//! unconsumed input downward.

use serde_json::Value;
use tracing::debug;

use crate::protocol::codec::{CodecError, HubCodec, InvocationBinder};
use crate::protocol::frame::{self, FrameError};
use crate::protocol::messages::{HubMessage, InvocationMessage, CATCH_ALL_TARGET, TYPE_INVOCATION};

/// Decorator rerouting unmatched invocations to [`CATCH_ALL_TARGET`].
///
/// Wraps any [`HubCodec`]; writes delegate unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatchAllCodec<C> {
    inner: C,
}

impl<C> CatchAllCodec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// The wrapped codec.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HubCodec> HubCodec for CatchAllCodec<C> {
    fn try_parse_message(
        &self,
        input: &[u8],
        binder: &dyn InvocationBinder,
    ) -> Result<(HubMessage, usize), CodecError> {
        let (payload, consumed) = match frame::split_frame(input) {
            Ok(split) => split,
            Err(FrameError::Incomplete { available }) => {
                return Err(CodecError::NeedMoreData { available })
            }
        };

        if let Some(rerouted) = reroute_unmatched(payload, binder) {
            return Ok((rerouted, consumed));
        }

        // Normal path: hand the delimiting back to the inner codec so it
        // sees the stream exactly as if the peek never happened.
        self.inner.try_parse_message(input, binder)
    }

    fn write_message(&self, message: &HubMessage) -> Result<Vec<u8>, CodecError> {
        self.inner.write_message(message)
    }
}

/// Classifies one complete frame payload. Returns the rerouted catch-all
/// invocation when the payload is an invocation the binder does not match;
/// `None` means fall through to the inner codec.
fn reroute_unmatched(payload: &[u8], binder: &dyn InvocationBinder) -> Option<HubMessage> {
    let envelope: Value = serde_json::from_slice(payload).ok()?;

    let (target, argument_count, invocation_id) = {
        let doc = envelope.as_object()?;
        if doc.get("type")?.as_u64()? != u64::from(TYPE_INVOCATION) {
            return None;
        }
        let target = doc.get("target")?.as_str()?.to_owned();
        let argument_count = doc
            .get("arguments")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let invocation_id = doc
            .get("invocationId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        (target, argument_count, invocation_id)
    };

    match binder.parameter_count(&target) {
        Some(expected) if expected == argument_count => None,
        known => {
            debug!(
                %target,
                argument_count,
                expected = ?known,
                "rerouting unmatched invocation to catch-all"
            );
            // The envelope is owned, so the single argument is a deep copy
            // that outlives the transient parse buffer.
            Some(HubMessage::Invocation(InvocationMessage {
                invocation_id,
                target: CATCH_ALL_TARGET.to_owned(),
                arguments: vec![envelope],
            }))
        }
    }
}
