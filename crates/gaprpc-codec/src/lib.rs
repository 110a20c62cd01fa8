//! Encode and decode of BLE GAP serialization commands, responses and events.
//!
//! Every operation is a type implementing [`Operation`]: an opcode, a
//! parameter layout and an output layout. Events decode into the closed
//! [`GapEvent`] enum wrapped in an [`EventRecord`]. Advertising payloads
//! are parsed by [`adv::parse`].
//!
//! Pure functions over byte buffers: no I/O, no state beyond the
//! advertising truncation counter.

pub mod adv;
pub mod ble;
pub mod error;
pub mod events;
pub mod gap;
pub mod ops;
pub mod security;
pub mod status;
pub mod types;
pub mod units;
pub mod wire;

pub use adv::{parse as parse_adv_data, truncated_reports, AdFlag, AdReport, AdStructure, MAX_ADV_DATA};
pub use ble::{BleUuid, Version};
pub use error::{CodecError, Result};
pub use events::{decode_event, peek_event_id, EventRecord, GapEvent};
pub use ops::{
    decode_request, decode_response, encode_request, encode_response, peek_opcode, Operation,
    Outcome,
};
pub use security::{
    EncInfo, EncKey, IdKey, IoCaps, Key16, KeyDist, MasterId, SecKeys, SecKeyset, SecLevels,
    SecParams, SignKey,
};
pub use status::Status;
pub use types::{
    AddrType, AdvFilterPolicy, AdvParams, AdvType, ChannelMask, ConnParams, ConnSec, ConnSecMode,
    GapAddr, Role, ScanParams,
};
pub use units::Unit;
pub use wire::{Wire, WireReader};

/// Name of the operation with this opcode, for logs.
pub fn opcode_name(opcode: u8) -> &'static str {
    gap::opcode_name(opcode).unwrap_or("unknown")
}
