//! Security parameter and key material types.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, Result};
use crate::types::GapAddr;
use crate::wire::{wire_enum, wire_struct, Wire, WireReader};

pub const KEY_LEN: usize = 16;

/// A 128-bit key (LTK, IRK or CSRK).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Key16(pub [u8; KEY_LEN]);

impl fmt::Debug for Key16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted:{KEY_LEN} bytes>")
    }
}

impl Wire for Key16 {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&self.0);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self(src.array()?))
    }
}

wire_enum! {
    /// Local input/output capabilities for pairing.
    pub enum IoCaps ("io_caps") {
        DisplayOnly = 0,
        DisplayYesNo = 1,
        KeyboardOnly = 2,
        None = 3,
        KeyboardDisplay = 4,
    }
}

/// Which keys a side distributes during bonding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyDist {
    pub enc: bool,
    pub id: bool,
    pub sign: bool,
    pub link: bool,
}

impl KeyDist {
    fn bits(self) -> u8 {
        u8::from(self.enc) | u8::from(self.id) << 1 | u8::from(self.sign) << 2 | u8::from(self.link) << 3
    }
}

impl Wire for KeyDist {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.bits());
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let raw = src.u8()?;
        if raw & 0xF0 != 0 {
            return Err(CodecError::InvalidValue {
                field: "kdist",
                value: raw as u32,
            });
        }
        Ok(Self {
            enc: raw & 0x01 != 0,
            id: raw & 0x02 != 0,
            sign: raw & 0x04 != 0,
            link: raw & 0x08 != 0,
        })
    }
}

const KEY_SIZE_MIN: u8 = 7;
const KEY_SIZE_MAX: u8 = 16;

/// Pairing feature exchange parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecParams {
    pub bond: bool,
    pub mitm: bool,
    pub lesc: bool,
    pub keypress: bool,
    pub io_caps: IoCaps,
    pub oob: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub kdist_own: KeyDist,
    pub kdist_peer: KeyDist,
}

impl Default for SecParams {
    fn default() -> Self {
        Self {
            bond: false,
            mitm: false,
            lesc: false,
            keypress: false,
            io_caps: IoCaps::None,
            oob: false,
            min_key_size: KEY_SIZE_MIN,
            max_key_size: KEY_SIZE_MAX,
            kdist_own: KeyDist::default(),
            kdist_peer: KeyDist::default(),
        }
    }
}

impl Wire for SecParams {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        for (field, size) in [("min_key_size", self.min_key_size), ("max_key_size", self.max_key_size)] {
            if !(KEY_SIZE_MIN..=KEY_SIZE_MAX).contains(&size) {
                return Err(CodecError::OutOfRange {
                    field,
                    value: size as u64,
                    min: KEY_SIZE_MIN as u64,
                    max: KEY_SIZE_MAX as u64,
                });
            }
        }
        if self.min_key_size > self.max_key_size {
            return Err(CodecError::InvalidValue {
                field: "min_key_size",
                value: self.min_key_size as u32,
            });
        }
        let flags = u8::from(self.bond)
            | u8::from(self.mitm) << 1
            | u8::from(self.lesc) << 2
            | u8::from(self.keypress) << 3
            | self.io_caps.as_u8() << 4
            | u8::from(self.oob) << 7;
        dst.put_u8(flags);
        dst.put_u8(self.min_key_size);
        dst.put_u8(self.max_key_size);
        self.kdist_own.put(dst)?;
        self.kdist_peer.put(dst)
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let flags = src.u8()?;
        Ok(Self {
            bond: flags & 0x01 != 0,
            mitm: flags & 0x02 != 0,
            lesc: flags & 0x04 != 0,
            keypress: flags & 0x08 != 0,
            io_caps: IoCaps::try_from((flags >> 4) & 0x07)?,
            oob: flags & 0x80 != 0,
            min_key_size: src.u8()?,
            max_key_size: src.u8()?,
            kdist_own: KeyDist::get(src)?,
            kdist_peer: KeyDist::get(src)?,
        })
    }
}

/// Security levels reached in each security mode, as bit sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecLevels {
    pub lv1: bool,
    pub lv2: bool,
    pub lv3: bool,
    pub lv4: bool,
}

impl Wire for SecLevels {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(u8::from(self.lv1) | u8::from(self.lv2) << 1 | u8::from(self.lv3) << 2 | u8::from(self.lv4) << 3);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let raw = src.u8()?;
        Ok(Self {
            lv1: raw & 0x01 != 0,
            lv2: raw & 0x02 != 0,
            lv3: raw & 0x04 != 0,
            lv4: raw & 0x08 != 0,
        })
    }
}

const LTK_LEN_MAX: u8 = 0x3F;

/// Long-term key plus its properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncInfo {
    pub ltk: Key16,
    pub lesc: bool,
    pub auth: bool,
    /// Significant LTK bytes, 6 bits on the wire.
    pub ltk_len: u8,
}

impl Wire for EncInfo {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        if self.ltk_len > LTK_LEN_MAX {
            return Err(CodecError::OutOfRange {
                field: "ltk_len",
                value: self.ltk_len as u64,
                min: 0,
                max: LTK_LEN_MAX as u64,
            });
        }
        self.ltk.put(dst)?;
        dst.put_u8(u8::from(self.lesc) | u8::from(self.auth) << 1 | self.ltk_len << 2);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let ltk = Key16::get(src)?;
        let flags = src.u8()?;
        Ok(Self {
            ltk,
            lesc: flags & 0x01 != 0,
            auth: flags & 0x02 != 0,
            ltk_len: flags >> 2,
        })
    }
}

wire_struct! {
    /// Identifies which LTK the peer expects.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MasterId {
        pub ediv: u16,
        pub rand: [u8; 8],
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct EncKey {
        pub enc_info: EncInfo,
        pub master_id: MasterId,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IdKey {
        pub irk: Key16,
        pub id_addr: GapAddr,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SignKey {
        pub csrk: Key16,
    }
}

wire_struct! {
    /// Keys held by one side of a connection; each may be absent.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SecKeys {
        pub enc_key: Option<EncKey>,
        pub id_key: Option<IdKey>,
        pub sign_key: Option<SignKey>,
    }
}

impl SecKeys {
    pub fn is_empty(&self) -> bool {
        self.enc_key.is_none() && self.id_key.is_none() && self.sign_key.is_none()
    }

    /// Overlay the keys present in `other`, keeping ours where it has none.
    pub fn merge(&mut self, other: &SecKeys) {
        if other.enc_key.is_some() {
            self.enc_key = other.enc_key;
        }
        if other.id_key.is_some() {
            self.id_key = other.id_key;
        }
        if other.sign_key.is_some() {
            self.sign_key = other.sign_key;
        }
    }
}

wire_struct! {
    /// Own and peer key storage for one pairing procedure.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SecKeyset {
        pub own: SecKeys,
        pub peer: SecKeys,
    }
}

impl SecKeyset {
    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.peer.is_empty()
    }

    pub fn merge(&mut self, other: &SecKeyset) {
        self.own.merge(&other.own);
        self.peer.merge(&other.peer);
    }
}
