//! Length-prefixed packet framing for the BLE serialization link.
//!
//! Every packet on the link is framed with:
//! - A 2-byte little-endian length covering everything after it
//! - A 1-byte packet type (command, response, event)
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    MAX_WIRE_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use packet::PacketType;
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::LinkCodec;
