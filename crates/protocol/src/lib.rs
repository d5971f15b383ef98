//! Wire protocol between the conductor and its players.
//!
//! Every message is a versioned JSON envelope, framed with a 4-byte
//! big-endian length. This crate only turns envelopes into bytes and back;
//! moving the bytes is left to the caller.

mod codec;
mod error;
mod message;

pub use codec::{CodecConfig, FrameCodec, DEFAULT_MAX_MESSAGE_SIZE, HEADER_LEN};
pub use error::{ProtocolError, Result};
pub use message::{Envelope, MessageType, PROTOCOL_VERSION};
