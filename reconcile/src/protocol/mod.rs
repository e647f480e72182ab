//! The command protocol spoken between the two endpoints.
//!
//! Messages travel as length-prefixed MessagePack frames over any ordered byte stream.

mod channel;
pub mod codec;
mod message;
mod verb;

pub use channel::Channel;
pub use message::{HashRequest, HashResponse, Request, Response, decode_row, encode_row};
pub use verb::Verb;

/// Newest protocol version this implementation speaks.
pub const LATEST_PROTOCOL_VERSION: u32 = 8;

/// Oldest protocol version this implementation still accepts.
pub const EARLIEST_PROTOCOL_VERSION: u32 = 7;
