//! # hubtap-core
//!
//! Protocol layer shared by the hubtap client and command-line tool: wire
//! frame delimiting, the typed hub message set, the schema-less dynamic
//! value model, and the catch-all routing decorator.
//!
//! This crate performs no I/O. Everything here operates on byte slices and
//! owned values, so the transport and session layers above it can be tested
//! against it without sockets.
//!
//! The wire format is the standard JSON hub protocol: each message is one
//! JSON document terminated by a 0x1E record separator. The pieces fit
//! together like this:
//!
//! - **`protocol::frame`** – finds record-separator boundaries in a byte
//!   stream and never consumes a frame it cannot fully delimit.
//! - **`protocol::messages`** – the typed message set (invocation,
//!   completion, ping, close) plus the handshake pair.
//! - **`protocol::codec`** – the base codec turning framed JSON into typed
//!   messages and back, behind the [`HubCodec`] trait.
//! - **`protocol::catch_all`** – a decorator over any [`HubCodec`] that
//!   reroutes invocations no local binding matches to the reserved
//!   `$__catchAll` target instead of failing.
//! - **`value`** – [`DynamicValue`], the tagged union used to decode
//!   arbitrary argument payloads without a schema.

pub mod protocol;
pub mod value;

// Re-export the most-used types at the crate root so callers can write
// `hubtap_core::DynamicValue` instead of spelling out the module path.
pub use protocol::catch_all::CatchAllCodec;
pub use protocol::codec::{
    decode_handshake_response, encode_handshake_request, CodecError, HubCodec, InvocationBinder,
    JsonHubCodec,
};
pub use protocol::correlation::InvocationIdSource;
pub use protocol::frame::{FrameBuffer, FrameError, RECORD_SEPARATOR};
pub use protocol::messages::{
    CloseMessage, CompletionMessage, HandshakeRequest, HandshakeResponse, HubMessage,
    InvocationMessage, CATCH_ALL_TARGET,
};
pub use value::{DynamicValue, ValueError};
