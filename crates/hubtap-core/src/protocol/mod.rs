//! Protocol module containing frame delimiting, message types, the base
//! JSON codec, and the catch-all routing decorator.

pub mod catch_all;
pub mod codec;
pub mod correlation;
pub mod frame;
pub mod messages;

pub use catch_all::CatchAllCodec;
pub use codec::{CodecError, HubCodec, InvocationBinder, JsonHubCodec};
pub use correlation::InvocationIdSource;
pub use frame::{FrameBuffer, FrameError, RECORD_SEPARATOR};
pub use messages::*;
