//! Generic stack operations outside GAP.

use bytes::BytesMut;

use crate::error::Result;
use crate::ops::{operation, Operation};
use crate::wire::{wire_struct, WireReader};

pub const SYSTEM_RESET: u8 = 0x00;
pub const ENABLE: u8 = 0x60;
pub const UUID_VS_ADD: u8 = 0x63;
pub const UUID_DECODE: u8 = 0x64;
pub const UUID_ENCODE: u8 = 0x65;
pub const VERSION_GET: u8 = 0x66;

/// Reset the controller. It does not answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemReset;

impl Operation for SystemReset {
    const OPCODE: u8 = SYSTEM_RESET;
    const NAME: &'static str = "system_reset";
    const EXPECTS_RESPONSE: bool = false;
    type Output = ();

    fn encode_params(&self, _dst: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn decode_params(_src: &mut WireReader<'_>) -> Result<Self> {
        Ok(SystemReset)
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
    pub struct Enable [0x60, "enable"] {} -> ();
}

wire_struct! {
    /// A 16-bit UUID plus the base it is relative to.
    ///
    /// `uuid_type` 1 is the Bluetooth SIG base; 2 and up are vendor bases
    /// registered with [`UuidVsAdd`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BleUuid {
        pub uuid: u16,
        pub uuid_type: u8,
    }
}

impl BleUuid {
    pub const TYPE_BLE: u8 = 1;

    pub fn sig(uuid: u16) -> Self {
        Self {
            uuid,
            uuid_type: Self::TYPE_BLE,
        }
    }
}

operation! {
    /// Register a vendor-specific 128-bit base; returns its `uuid_type`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UuidVsAdd [0x63, "uuid_vs_add"] {
        pub base: [u8; 16],
    } -> u8;
}

operation! {
    /// Resolve little-endian UUID bytes (2 or 16) to a [`BleUuid`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UuidDecode [0x64, "uuid_decode"] {
        pub uuid_le: Vec<u8>,
    } -> BleUuid;
}

operation! {
    /// Expand a [`BleUuid`] to its little-endian bytes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UuidEncode [0x65, "uuid_encode"] {
        pub uuid: BleUuid,
    } -> Vec<u8>;
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Version {
        pub version_number: u8,
        pub company_id: u16,
        pub subversion_number: u16,
    }
}

operation! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VersionGet [0x66, "version_get"] {} -> Version;
}

pub(crate) fn opcode_name(opcode: u8) -> Option<&'static str> {
    Some(match opcode {
        SYSTEM_RESET => SystemReset::NAME,
        ENABLE => Enable::NAME,
        UUID_VS_ADD => UuidVsAdd::NAME,
        UUID_DECODE => UuidDecode::NAME,
        UUID_ENCODE => UuidEncode::NAME,
        VERSION_GET => VersionGet::NAME,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{decode_response, encode_request, encode_response, Outcome};

    #[test]
    fn version_response_layout() {
        let version = Version {
            version_number: 9,
            company_id: 0x0059,
            subversion_number: 0x00B6,
        };
        let wire = encode_response::<VersionGet>(&Outcome::Success(version)).unwrap();
        assert_eq!(wire.as_ref(), &[VERSION_GET, 0, 0, 0, 0, 9, 0x59, 0, 0xB6, 0]);
        assert_eq!(
            decode_response::<VersionGet>(&wire).unwrap(),
            Outcome::Success(version)
        );
    }

    #[test]
    fn system_reset_expects_no_reply() {
        assert!(!SystemReset::EXPECTS_RESPONSE);
        assert!(VersionGet::EXPECTS_RESPONSE);
        assert_eq!(encode_request(&SystemReset).unwrap().as_ref(), &[SYSTEM_RESET]);
    }

    #[test]
    fn uuid_encode_returns_bytes() {
        let op = UuidEncode { uuid: BleUuid::sig(0x180D) };
        assert_eq!(encode_request(&op).unwrap().as_ref(), &[UUID_ENCODE, 0x0D, 0x18, 1]);

        let reply = encode_response::<UuidEncode>(&Outcome::Success(vec![0x0D, 0x18])).unwrap();
        assert_eq!(
            decode_response::<UuidEncode>(&reply).unwrap(),
            Outcome::Success(vec![0x0D, 0x18])
        );
    }
}
