//! GAP operations.

use bytes::{BufMut, BytesMut};

use crate::adv::MAX_ADV_DATA;
use crate::error::{CodecError, Result};
use crate::ops::{operation, Operation};
use crate::security::{EncInfo, Key16, MasterId, SecKeyset, SecParams, SignKey};
use crate::types::{AdvParams, ConnParams, ConnSec, ConnSecMode, GapAddr, ScanParams};
use crate::wire::{put_len_prefixed, wire_enum, Wire, WireReader};

pub const ADDRESS_SET: u8 = 0x7C;
pub const ADDRESS_GET: u8 = 0x7D;
pub const ADV_DATA_SET: u8 = 0x7E;
pub const ADV_START: u8 = 0x7F;
pub const ADV_STOP: u8 = 0x80;
pub const CONN_PARAM_UPDATE: u8 = 0x81;
pub const DISCONNECT: u8 = 0x82;
pub const TX_POWER_SET: u8 = 0x83;
pub const APPEARANCE_SET: u8 = 0x84;
pub const APPEARANCE_GET: u8 = 0x85;
pub const PPCP_SET: u8 = 0x86;
pub const PPCP_GET: u8 = 0x87;
pub const DEVICE_NAME_SET: u8 = 0x88;
pub const DEVICE_NAME_GET: u8 = 0x89;
pub const AUTHENTICATE: u8 = 0x8A;
pub const SEC_PARAMS_REPLY: u8 = 0x8B;
pub const AUTH_KEY_REPLY: u8 = 0x8C;
pub const LESC_DHKEY_REPLY: u8 = 0x8D;
pub const KEYPRESS_NOTIFY: u8 = 0x8E;
pub const ENCRYPT: u8 = 0x91;
pub const SEC_INFO_REPLY: u8 = 0x92;
pub const CONN_SEC_GET: u8 = 0x93;
pub const RSSI_START: u8 = 0x94;
pub const RSSI_STOP: u8 = 0x95;
pub const SCAN_START: u8 = 0x96;
pub const SCAN_STOP: u8 = 0x97;
pub const CONNECT: u8 = 0x98;
pub const CONNECT_CANCEL: u8 = 0x99;
pub const RSSI_GET: u8 = 0x9A;

/// Longest device name the controller stores.
pub const MAX_DEVICE_NAME: usize = 248;

/// HCI reason: remote user terminated connection.
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddressSet [0x7C, "address_set"] {
        pub addr: GapAddr,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AddressGet [0x7D, "address_get"] {} -> GapAddr;
}

/// Advertising and scan response payloads, each at most 31 bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvDataSet {
    pub data: Vec<u8>,
    pub scan_rsp: Vec<u8>,
}

impl Operation for AdvDataSet {
    const OPCODE: u8 = ADV_DATA_SET;
    const NAME: &'static str = "adv_data_set";
    type Output = ();

    fn encode_params(&self, dst: &mut BytesMut) -> Result<()> {
        for (field, data) in [("adv data", &self.data), ("scan response data", &self.scan_rsp)] {
            if data.len() > MAX_ADV_DATA {
                return Err(CodecError::TooLong {
                    field,
                    len: data.len(),
                    max: MAX_ADV_DATA,
                });
            }
        }
        put_len_prefixed(dst, "adv data", &self.data, MAX_ADV_DATA)?;
        put_len_prefixed(dst, "scan response data", &self.scan_rsp, MAX_ADV_DATA)
    }

    fn decode_params(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            data: Wire::get(src)?,
            scan_rsp: Wire::get(src)?,
        })
    }

    fn encode_output(_output: &(), _dst: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn decode_output(_src: &mut WireReader<'_>) -> Result<()> {
        Ok(())
    }
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdvStart [0x7F, "adv_start"] {
        pub params: AdvParams,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AdvStop [0x80, "adv_stop"] {} -> ();
}

operation! {
    /// Request new parameters; `None` lets the controller pick from PPCP.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnParamUpdate [0x81, "conn_param_update"] {
        pub conn_handle: u16,
        pub params: Option<ConnParams>,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Disconnect [0x82, "disconnect"] {
        pub conn_handle: u16,
        pub hci_status_code: u8,
    } -> ();
}

operation! {
    /// Radio transmit power in dBm.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxPowerSet [0x83, "tx_power_set"] {
        pub tx_power: i8,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AppearanceSet [0x84, "appearance_set"] {
        pub appearance: u16,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AppearanceGet [0x85, "appearance_get"] {} -> u16;
}

operation! {
    /// Peripheral preferred connection parameters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpcpSet [0x86, "ppcp_set"] {
        pub params: ConnParams,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PpcpGet [0x87, "ppcp_get"] {} -> ConnParams;
}

/// Set the GAP device name and its write permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNameSet {
    pub write_perm: ConnSecMode,
    pub name: String,
}

impl Operation for DeviceNameSet {
    const OPCODE: u8 = DEVICE_NAME_SET;
    const NAME: &'static str = "device_name_set";
    type Output = ();

    fn encode_params(&self, dst: &mut BytesMut) -> Result<()> {
        if self.name.len() > MAX_DEVICE_NAME {
            return Err(CodecError::TooLong {
                field: "device name",
                len: self.name.len(),
                max: MAX_DEVICE_NAME,
            });
        }
        self.write_perm.put(dst)?;
        put_len_prefixed(dst, "device name", self.name.as_bytes(), MAX_DEVICE_NAME)
    }

    fn decode_params(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            write_perm: ConnSecMode::get(src)?,
            name: Wire::get(src)?,
        })
    }

    fn encode_output(_output: &(), _dst: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn decode_output(_src: &mut WireReader<'_>) -> Result<()> {
        Ok(())
    }
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct DeviceNameGet [0x89, "device_name_get"] {} -> String;
}

operation! {
    /// Start pairing, or send a security request as peripheral.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Authenticate [0x8A, "authenticate"] {
        pub conn_handle: u16,
        pub params: Option<SecParams>,
    } -> ();
}

operation! {
    /// Answer a SEC_PARAMS_REQUEST.
    ///
    /// The controller returns the keyset with the keys it generated filled in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecParamsReply [0x8B, "sec_params_reply"] {
        pub conn_handle: u16,
        pub sec_status: u8,
        pub params: Option<SecParams>,
        pub keyset: Option<SecKeyset>,
    } -> SecKeyset;
}

wire_enum! {
    pub enum AuthKeyType ("auth key_type") {
        None = 0,
        Passkey = 1,
        Oob = 2,
    }
}

/// Answer an AUTH_KEY_REQUEST with a passkey or OOB key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthKeyReply {
    pub conn_handle: u16,
    pub key_type: AuthKeyType,
    /// Six ASCII digits for a passkey, sixteen bytes for OOB.
    pub key: Option<Vec<u8>>,
}

impl AuthKeyReply {
    fn expected_len(key_type: AuthKeyType) -> usize {
        match key_type {
            AuthKeyType::None => 0,
            AuthKeyType::Passkey => 6,
            AuthKeyType::Oob => 16,
        }
    }
}

impl Operation for AuthKeyReply {
    const OPCODE: u8 = AUTH_KEY_REPLY;
    const NAME: &'static str = "auth_key_reply";
    type Output = ();

    fn encode_params(&self, dst: &mut BytesMut) -> Result<()> {
        let expected = Self::expected_len(self.key_type);
        let key = self.key.as_deref();
        match key {
            None if expected > 0 => return Err(CodecError::MissingField("key")),
            Some(key) if key.len() != expected => {
                return Err(CodecError::InvalidValue {
                    field: "key length",
                    value: key.len() as u32,
                })
            }
            Some(key) if self.key_type == AuthKeyType::Passkey && !key.iter().all(u8::is_ascii_digit) => {
                return Err(CodecError::InvalidValue {
                    field: "passkey",
                    value: 0,
                })
            }
            _ => {}
        }
        dst.put_u16_le(self.conn_handle);
        self.key_type.put(dst)?;
        match key {
            Some(key) => {
                dst.put_u8(1);
                dst.put_slice(key);
            }
            None => dst.put_u8(0),
        }
        Ok(())
    }

    fn decode_params(src: &mut WireReader<'_>) -> Result<Self> {
        let conn_handle = src.u16()?;
        let key_type = AuthKeyType::get(src)?;
        let key = if src.present("key")? {
            Some(src.bytes(Self::expected_len(key_type))?.to_vec())
        } else {
            None
        };
        Ok(Self {
            conn_handle,
            key_type,
            key,
        })
    }

    fn encode_output(_output: &(), _dst: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn decode_output(_src: &mut WireReader<'_>) -> Result<()> {
        Ok(())
    }
}

operation! {
    /// Answer a LESC_DHKEY_REQUEST.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LescDhkeyReply [0x8D, "lesc_dhkey_reply"] {
        pub conn_handle: u16,
        pub dhkey: Option<[u8; 32]>,
    } -> ();
}

wire_enum! {
    pub enum KeypressType ("kp_not") {
        EntryStarted = 0,
        DigitIn = 1,
        DigitOut = 2,
        Cleared = 3,
        EntryCompleted = 4,
    }
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeypressNotify [0x8E, "keypress_notify"] {
        pub conn_handle: u16,
        pub kp_not: KeypressType,
    } -> ();
}

operation! {
    /// Start encryption with a stored LTK, as central.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Encrypt [0x91, "encrypt"] {
        pub conn_handle: u16,
        pub master_id: MasterId,
        pub enc_info: EncInfo,
    } -> ();
}

operation! {
    /// Answer a SEC_INFO_REQUEST with stored keys, or none to reject.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecInfoReply [0x92, "sec_info_reply"] {
        pub conn_handle: u16,
        pub enc_info: Option<EncInfo>,
        pub id_irk: Option<Key16>,
        pub sign_info: Option<SignKey>,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnSecGet [0x93, "conn_sec_get"] {
        pub conn_handle: u16,
    } -> ConnSec;
}

operation! {
    /// Report RSSI changes of at least `threshold_dbm`, after `skip_count` samples.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RssiStart [0x94, "rssi_start"] {
        pub conn_handle: u16,
        pub threshold_dbm: u8,
        pub skip_count: u8,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RssiStop [0x95, "rssi_stop"] {
        pub conn_handle: u16,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScanStart [0x96, "scan_start"] {
        pub params: ScanParams,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ScanStop [0x97, "scan_stop"] {} -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Connect [0x98, "connect"] {
        pub peer_addr: GapAddr,
        pub scan_params: ScanParams,
        pub conn_params: ConnParams,
    } -> ();
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ConnectCancel [0x99, "connect_cancel"] {} -> ();
}

operation! {
    /// Last sampled RSSI in dBm.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RssiGet [0x9A, "rssi_get"] {
        pub conn_handle: u16,
    } -> i8;
}

/// Opcode to operation name, for logs.
pub fn opcode_name(opcode: u8) -> Option<&'static str> {
    Some(match opcode {
        ADDRESS_SET => AddressSet::NAME,
        ADDRESS_GET => AddressGet::NAME,
        ADV_DATA_SET => AdvDataSet::NAME,
        ADV_START => AdvStart::NAME,
        ADV_STOP => AdvStop::NAME,
        CONN_PARAM_UPDATE => ConnParamUpdate::NAME,
        DISCONNECT => Disconnect::NAME,
        TX_POWER_SET => TxPowerSet::NAME,
        APPEARANCE_SET => AppearanceSet::NAME,
        APPEARANCE_GET => AppearanceGet::NAME,
        PPCP_SET => PpcpSet::NAME,
        PPCP_GET => PpcpGet::NAME,
        DEVICE_NAME_SET => DeviceNameSet::NAME,
        DEVICE_NAME_GET => DeviceNameGet::NAME,
        AUTHENTICATE => Authenticate::NAME,
        SEC_PARAMS_REPLY => SecParamsReply::NAME,
        AUTH_KEY_REPLY => AuthKeyReply::NAME,
        LESC_DHKEY_REPLY => LescDhkeyReply::NAME,
        KEYPRESS_NOTIFY => KeypressNotify::NAME,
        ENCRYPT => Encrypt::NAME,
        SEC_INFO_REPLY => SecInfoReply::NAME,
        CONN_SEC_GET => ConnSecGet::NAME,
        RSSI_START => RssiStart::NAME,
        RSSI_STOP => RssiStop::NAME,
        SCAN_START => ScanStart::NAME,
        SCAN_STOP => ScanStop::NAME,
        CONNECT => Connect::NAME,
        CONNECT_CANCEL => ConnectCancel::NAME,
        RSSI_GET => RssiGet::NAME,
        _ => return crate::ble::opcode_name(opcode),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ops::{decode_request, decode_response, encode_request, encode_response, Outcome};
    use crate::security::{IoCaps, KeyDist};
    use crate::types::{AddrType, AdvType};

    #[test]
    fn adv_start_connectable_100ms() {
        let op = AdvStart {
            params: AdvParams {
                adv_type: AdvType::ConnectableUndirected,
                interval: Duration::from_millis(100),
                timeout: 0,
                ..AdvParams::default()
            },
        };
        let wire = encode_request(&op).unwrap();
        // opcode, type, no peer, filter, interval 160, timeout 0, channel mask
        assert_eq!(wire.as_ref(), &[0x7F, 0, 0, 0, 0xA0, 0x00, 0, 0, 0]);

        let echoed = decode_request::<AdvStart>(&wire).unwrap();
        assert_eq!(echoed.params.adv_type, AdvType::ConnectableUndirected);
        assert_eq!(echoed.params.timeout, 0);
        let diff = echoed.params.interval.as_micros().abs_diff(100_000);
        assert!(diff <= 625);
    }

    #[test]
    fn encode_error_produces_no_bytes() {
        let op = AdvStart {
            params: AdvParams {
                interval: Duration::from_millis(5),
                ..AdvParams::default()
            },
        };
        assert!(matches!(
            encode_request(&op),
            Err(CodecError::OutOfRange { field: "adv interval", value: 8, .. })
        ));
    }

    #[test]
    fn adv_data_limited_to_31_bytes() {
        let op = AdvDataSet {
            data: vec![0; 32],
            scan_rsp: Vec::new(),
        };
        assert!(matches!(
            encode_request(&op),
            Err(CodecError::TooLong { max: 31, .. })
        ));

        let ok = AdvDataSet {
            data: vec![0x02, 0x01, 0x06],
            scan_rsp: vec![0x03, 0x09, b'h', b'i'],
        };
        let wire = encode_request(&ok).unwrap();
        assert_eq!(decode_request::<AdvDataSet>(&wire).unwrap(), ok);
    }

    #[test]
    fn address_get_response() {
        let addr = GapAddr::new(AddrType::RandomStatic, [1, 2, 3, 4, 5, 0xC6]);
        let wire = encode_response::<AddressGet>(&Outcome::Success(addr)).unwrap();
        assert_eq!(wire[0], ADDRESS_GET);
        assert_eq!(
            decode_response::<AddressGet>(&wire).unwrap(),
            Outcome::Success(addr)
        );
        assert_eq!(encode_request(&AddressGet {}).unwrap().as_ref(), &[ADDRESS_GET]);
    }

    #[test]
    fn device_name_round_trip_and_limit() {
        let op = DeviceNameSet {
            write_perm: ConnSecMode::OPEN,
            name: "gaprpc".into(),
        };
        let wire = encode_request(&op).unwrap();
        assert_eq!(&wire[..4], &[DEVICE_NAME_SET, 0x11, 6, 0]);
        assert_eq!(decode_request::<DeviceNameSet>(&wire).unwrap(), op);

        let long = DeviceNameSet {
            write_perm: ConnSecMode::OPEN,
            name: "x".repeat(MAX_DEVICE_NAME + 1),
        };
        assert!(encode_request(&long).is_err());

        let reply = encode_response::<DeviceNameGet>(&Outcome::Success("peer".into())).unwrap();
        assert_eq!(
            decode_response::<DeviceNameGet>(&reply).unwrap(),
            Outcome::Success("peer".to_string())
        );
    }

    #[test]
    fn tx_power_is_signed() {
        let wire = encode_request(&TxPowerSet { tx_power: -8 }).unwrap();
        assert_eq!(wire.as_ref(), &[TX_POWER_SET, 0xF8]);
    }

    #[test]
    fn sec_params_reply_layout() {
        let op = SecParamsReply {
            conn_handle: 1,
            sec_status: 0,
            params: Some(SecParams {
                bond: true,
                io_caps: IoCaps::None,
                kdist_peer: KeyDist { enc: true, id: true, ..KeyDist::default() },
                ..SecParams::default()
            }),
            keyset: Some(SecKeyset::default()),
        };
        let wire = encode_request(&op).unwrap();
        assert_eq!(&wire[..5], &[SEC_PARAMS_REPLY, 1, 0, 0, 1]);
        assert_eq!(decode_request::<SecParamsReply>(&wire).unwrap(), op);
    }

    #[test]
    fn auth_key_reply_validates_key() {
        let missing = AuthKeyReply {
            conn_handle: 0,
            key_type: AuthKeyType::Passkey,
            key: None,
        };
        assert_eq!(encode_request(&missing).unwrap_err(), CodecError::MissingField("key"));

        let letters = AuthKeyReply {
            key: Some(b"12345a".to_vec()),
            ..missing.clone()
        };
        assert!(encode_request(&letters).is_err());

        let passkey = AuthKeyReply {
            key: Some(b"123456".to_vec()),
            ..missing
        };
        let wire = encode_request(&passkey).unwrap();
        assert_eq!(wire.len(), 1 + 2 + 1 + 1 + 6);
        assert_eq!(decode_request::<AuthKeyReply>(&wire).unwrap(), passkey);
    }

    #[test]
    fn connect_carries_all_parameter_blocks() {
        let op = Connect {
            peer_addr: "C6:05:04:03:02:01".parse::<GapAddr>().unwrap().with_type(AddrType::RandomStatic),
            scan_params: ScanParams::default(),
            conn_params: ConnParams::default(),
        };
        let wire = encode_request(&op).unwrap();
        assert_eq!(wire.len(), 1 + 7 + 8 + 8);
        assert_eq!(decode_request::<Connect>(&wire).unwrap(), op);
    }

    #[test]
    fn rssi_get_output_signed() {
        let wire = encode_response::<RssiGet>(&Outcome::Success(-60)).unwrap();
        assert_eq!(wire.as_ref(), &[RSSI_GET, 0, 0, 0, 0, 0xC4]);
    }

    #[test]
    fn names_cover_every_opcode() {
        assert_eq!(opcode_name(ADV_START), Some("adv_start"));
        assert_eq!(opcode_name(RSSI_GET), Some("rssi_get"));
        assert_eq!(opcode_name(0x66), Some("version_get"));
        assert_eq!(opcode_name(0xEE), None);
    }
}
