//! GAP events.
//!
//! Event body: `evt_id: u16`, `conn_handle: u16`, then the fields of the
//! event kind. [`GapEvent`] is closed over the known kinds; an unknown id
//! is a decode error.

use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};

use crate::adv::{self, AdReport};
use crate::error::{CodecError, Result};
use crate::gap::{AuthKeyType, KeypressType};
use crate::security::{KeyDist, MasterId, SecKeys, SecLevels, SecParams};
use crate::types::{AdvType, ConnParams, ConnSec, GapAddr, Role};
use crate::wire::{wire_enum, wire_struct, Wire, WireReader};

/// Connection handle carried by events that are not tied to a link.
pub const CONN_HANDLE_INVALID: u16 = 0xFFFF;

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Connected {
        pub peer_addr: GapAddr,
        pub own_addr: GapAddr,
        pub role: Role,
        /// The peer's address resolved against a known IRK.
        pub irk_match: bool,
        pub irk_match_idx: u8,
        pub conn_params: ConnParams,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Disconnected {
        /// HCI status code.
        pub reason: u8,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnParamUpdate {
        pub conn_params: ConnParams,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecParamsRequest {
        pub peer_params: SecParams,
    }
}

wire_struct! {
    /// The peer asks for stored keys; the flags say which it needs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecInfoRequest {
        pub peer_addr: GapAddr,
        pub master_id: MasterId,
        pub enc_info: bool,
        pub id_info: bool,
        pub sign_info: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PasskeyDisplay {
        /// Six ASCII digits.
        pub passkey: [u8; 6],
        pub match_request: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyPressed {
        pub kp_not: KeypressType,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuthKeyRequest {
        pub key_type: AuthKeyType,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LescDhkeyRequest {
        pub pk_peer: [u8; 64],
        pub oobd_req: bool,
    }
}

wire_struct! {
    /// Pairing or bonding finished. Keys distributed during the procedure
    /// are carried along.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AuthStatus {
        pub auth_status: u8,
        pub error_src: u8,
        pub bonded: bool,
        pub sm1_levels: SecLevels,
        pub sm2_levels: SecLevels,
        pub kdist_own: KeyDist,
        pub kdist_peer: KeyDist,
        pub own_keys: SecKeys,
        pub peer_keys: SecKeys,
    }
}

impl AuthStatus {
    pub const SUCCESS: u8 = 0x00;

    pub fn is_success(&self) -> bool {
        self.auth_status == Self::SUCCESS
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnSecUpdate {
        pub conn_sec: ConnSec,
    }
}

wire_enum! {
    pub enum TimeoutSource ("timeout src") {
        Advertising = 0,
        SecurityRequest = 1,
        Scan = 2,
        Conn = 3,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Timeout {
        pub src: TimeoutSource,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RssiChanged {
        pub rssi: i8,
    }
}

wire_struct! {
    /// One advertising or scan response packet seen while scanning.
    ///
    /// `data` is kept raw; call [`AdvReport::parse`] to decode it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct AdvReport {
        pub peer_addr: GapAddr,
        pub rssi: i8,
        pub scan_rsp: bool,
        pub adv_type: AdvType,
        pub data: Vec<u8>,
    }
}

impl AdvReport {
    pub fn parse(&self) -> AdReport {
        adv::parse(&self.data)
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecRequest {
        pub bond: bool,
        pub mitm: bool,
        pub lesc: bool,
        pub keypress: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnParamUpdateRequest {
        pub conn_params: ConnParams,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScanReqReport {
        pub rssi: i8,
        pub peer_addr: GapAddr,
    }
}

macro_rules! gap_events {
    ( $( $const:ident = $id:literal => $variant:ident, $label:literal; )* ) => {
        $( pub const $const: u16 = $id; )*

        /// A decoded GAP event.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum GapEvent {
            $( $variant($variant), )*
        }

        impl GapEvent {
            pub fn id(&self) -> u16 {
                match self {
                    $( GapEvent::$variant(_) => $id, )*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( GapEvent::$variant(_) => $label, )*
                }
            }

            fn decode(id: u16, src: &mut WireReader<'_>) -> Result<Self> {
                match id {
                    $( $id => Ok(GapEvent::$variant(Wire::get(src)?)), )*
                    other => Err(CodecError::UnknownEvent(other)),
                }
            }

            fn encode(&self, dst: &mut BytesMut) -> Result<()> {
                match self {
                    $( GapEvent::$variant(payload) => payload.put(dst), )*
                }
            }
        }

        /// Event id to name, for logs.
        pub fn event_name(id: u16) -> Option<&'static str> {
            match id {
                $( $id => Some($label), )*
                _ => None,
            }
        }
    };
}

gap_events! {
    CONNECTED = 0x10 => Connected, "connected";
    DISCONNECTED = 0x11 => Disconnected, "disconnected";
    CONN_PARAM_UPDATE = 0x12 => ConnParamUpdate, "conn_param_update";
    SEC_PARAMS_REQUEST = 0x13 => SecParamsRequest, "sec_params_request";
    SEC_INFO_REQUEST = 0x14 => SecInfoRequest, "sec_info_request";
    PASSKEY_DISPLAY = 0x15 => PasskeyDisplay, "passkey_display";
    KEY_PRESSED = 0x16 => KeyPressed, "key_pressed";
    AUTH_KEY_REQUEST = 0x17 => AuthKeyRequest, "auth_key_request";
    LESC_DHKEY_REQUEST = 0x18 => LescDhkeyRequest, "lesc_dhkey_request";
    AUTH_STATUS = 0x19 => AuthStatus, "auth_status";
    CONN_SEC_UPDATE = 0x1A => ConnSecUpdate, "conn_sec_update";
    TIMEOUT = 0x1B => Timeout, "timeout";
    RSSI_CHANGED = 0x1C => RssiChanged, "rssi_changed";
    ADV_REPORT = 0x1D => AdvReport, "adv_report";
    SEC_REQUEST = 0x1E => SecRequest, "sec_request";
    CONN_PARAM_UPDATE_REQUEST = 0x1F => ConnParamUpdateRequest, "conn_param_update_request";
    SCAN_REQ_REPORT = 0x20 => ScanReqReport, "scan_req_report";
}

/// A decoded event plus its common header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: u16,
    /// Arrival time on the host.
    pub timestamp: SystemTime,
    pub conn_handle: u16,
    pub event: GapEvent,
}

impl EventRecord {
    pub fn new(conn_handle: u16, event: GapEvent) -> Self {
        Self {
            id: event.id(),
            timestamp: SystemTime::now(),
            conn_handle,
            event,
        }
    }

    pub fn name(&self) -> &'static str {
        self.event.name()
    }

    /// Encode as an event body, as the controller would send it.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(32);
        dst.put_u16_le(self.event.id());
        dst.put_u16_le(self.conn_handle);
        self.event.encode(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Decode an event body, stamping it with the current time.
pub fn decode_event(payload: &[u8]) -> Result<EventRecord> {
    let mut src = WireReader::new(payload);
    let id = src.u16()?;
    let conn_handle = src.u16()?;
    let event = GapEvent::decode(id, &mut src)?;
    src.finish()?;
    Ok(EventRecord {
        id,
        timestamp: SystemTime::now(),
        conn_handle,
        event,
    })
}

/// Event id of an event body, if it has one.
pub fn peek_event_id(payload: &[u8]) -> Option<u16> {
    match payload {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}
