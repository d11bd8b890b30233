//! Client-side session layer for hubtap.
//!
//! This crate turns the wire-level building blocks from `hubtap-core` into a
//! long-lived hub session:
//!
//! - [`registry`]: named subscriptions with parameter labels, doubling as the
//!   argument-count oracle the catch-all router consults
//! - [`transport`]: WebSocket dialing plus the hub handshake
//! - [`session`]: the connection state machine, outbound invocations with
//!   completion correlation, inbound dispatch, and automatic reconnect

pub mod registry;
pub mod session;
pub mod transport;

pub use registry::{Subscription, SubscriptionCallback, SubscriptionRegistry};
pub use session::{
    marshal_arguments, ConnectionState, HubSession, SessionConfig, SessionError, SessionEvent,
};
pub use transport::TransportError;
