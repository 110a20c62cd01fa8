//! GAP parameter types shared by operations and events.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, Result};
use crate::units::{from_units, to_units, Unit};
use crate::wire::{wire_enum, wire_struct, Wire, WireReader};

wire_enum! {
    /// Bluetooth device address type.
    pub enum AddrType ("addr_type") {
        Public = 0,
        RandomStatic = 1,
        RandomPrivateResolvable = 2,
        RandomPrivateNonResolvable = 3,
    }
}

impl AddrType {
    pub fn name(self) -> &'static str {
        match self {
            AddrType::Public => "public",
            AddrType::RandomStatic => "random static",
            AddrType::RandomPrivateResolvable => "random private resolvable",
            AddrType::RandomPrivateNonResolvable => "random private non-resolvable",
        }
    }
}

/// A 48-bit device address plus its type tag.
///
/// Bytes are stored least significant first, as on the wire; the text
/// form prints the most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GapAddr {
    pub addr_type: AddrType,
    pub addr: [u8; 6],
}

impl GapAddr {
    pub fn new(addr_type: AddrType, addr: [u8; 6]) -> Self {
        Self { addr_type, addr }
    }

    /// Same address bytes under a different type tag.
    pub fn with_type(self, addr_type: AddrType) -> Self {
        Self { addr_type, ..self }
    }
}

impl fmt::Display for GapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.addr;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )
    }
}

impl FromStr for GapAddr {
    type Err = CodecError;

    /// Parse `AA:BB:CC:DD:EE:FF` as a public address.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CodecError::InvalidAddress(s.to_string());
        let mut addr = [0u8; 6];
        let mut parts = s.trim().split(':');
        for slot in addr.iter_mut().rev() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(AddrType::Public, addr))
    }
}

impl Wire for GapAddr {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        self.addr_type.put(dst)?;
        dst.put_slice(&self.addr);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            addr_type: AddrType::get(src)?,
            addr: src.array()?,
        })
    }
}

const CONN_INTERVAL_MIN: u16 = 0x0006;
const CONN_INTERVAL_MAX: u16 = 0x0C80;
const SUP_TIMEOUT_MIN: u16 = 0x000A;
const SUP_TIMEOUT_MAX: u16 = 0x0C80;
const SLAVE_LATENCY_MAX: u16 = 0x01F3;

/// Connection parameters, in real-world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParams {
    pub min_conn_interval: Duration,
    pub max_conn_interval: Duration,
    /// Connection events the peripheral may skip.
    pub slave_latency: u16,
    pub conn_sup_timeout: Duration,
}

impl Default for ConnParams {
    fn default() -> Self {
        Self {
            min_conn_interval: Duration::from_micros(7_500),
            max_conn_interval: Duration::from_millis(30),
            slave_latency: 0,
            conn_sup_timeout: Duration::from_secs(4),
        }
    }
}

impl Wire for ConnParams {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let min = to_units(
            self.min_conn_interval,
            Unit::Us1250,
            "min_conn_interval",
            CONN_INTERVAL_MIN,
            CONN_INTERVAL_MAX,
        )?;
        let max = to_units(
            self.max_conn_interval,
            Unit::Us1250,
            "max_conn_interval",
            CONN_INTERVAL_MIN,
            CONN_INTERVAL_MAX,
        )?;
        if min > max {
            return Err(CodecError::InvalidValue {
                field: "min_conn_interval",
                value: min as u32,
            });
        }
        if self.slave_latency > SLAVE_LATENCY_MAX {
            return Err(CodecError::OutOfRange {
                field: "slave_latency",
                value: self.slave_latency as u64,
                min: 0,
                max: SLAVE_LATENCY_MAX as u64,
            });
        }
        let timeout = to_units(
            self.conn_sup_timeout,
            Unit::Us10000,
            "conn_sup_timeout",
            SUP_TIMEOUT_MIN,
            SUP_TIMEOUT_MAX,
        )?;
        dst.put_u16_le(min);
        dst.put_u16_le(max);
        dst.put_u16_le(self.slave_latency);
        dst.put_u16_le(timeout);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            min_conn_interval: from_units(src.u16()?, Unit::Us1250),
            max_conn_interval: from_units(src.u16()?, Unit::Us1250),
            slave_latency: src.u16()?,
            conn_sup_timeout: from_units(src.u16()?, Unit::Us10000),
        })
    }
}

const SCAN_INTERVAL_MIN: u16 = 0x0004;
const SCAN_INTERVAL_MAX: u16 = 0x4000;

/// Scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// Send scan requests to advertisers.
    pub active: bool,
    /// Only report whitelisted advertisers.
    pub use_whitelist: bool,
    pub interval: Duration,
    pub window: Duration,
    /// Scan timeout in seconds, 0 for none.
    pub timeout: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            use_whitelist: false,
            interval: Duration::from_millis(100),
            window: Duration::from_millis(50),
            timeout: 0,
        }
    }
}

impl Wire for ScanParams {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let interval = to_units(
            self.interval,
            Unit::Us625,
            "scan interval",
            SCAN_INTERVAL_MIN,
            SCAN_INTERVAL_MAX,
        )?;
        let window = to_units(
            self.window,
            Unit::Us625,
            "scan window",
            SCAN_INTERVAL_MIN,
            SCAN_INTERVAL_MAX,
        )?;
        if window > interval {
            return Err(CodecError::InvalidValue {
                field: "scan window",
                value: window as u32,
            });
        }
        self.active.put(dst)?;
        self.use_whitelist.put(dst)?;
        dst.put_u16_le(interval);
        dst.put_u16_le(window);
        dst.put_u16_le(self.timeout);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            active: src.bool("scan active")?,
            use_whitelist: src.bool("scan use_whitelist")?,
            interval: from_units(src.u16()?, Unit::Us625),
            window: from_units(src.u16()?, Unit::Us625),
            timeout: src.u16()?,
        })
    }
}

wire_enum! {
    /// Advertising PDU type.
    pub enum AdvType ("adv_type") {
        ConnectableUndirected = 0,
        ConnectableDirected = 1,
        ScannableUndirected = 2,
        NonConnectableUndirected = 3,
    }
}

wire_enum! {
    /// Which scan/connect requests the advertiser filters by whitelist.
    pub enum AdvFilterPolicy ("adv filter_policy") {
        Any = 0,
        FilterScanRequests = 1,
        FilterConnectRequests = 2,
        FilterBoth = 3,
    }
}

/// Advertising channels to skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMask {
    pub ch_37_off: bool,
    pub ch_38_off: bool,
    pub ch_39_off: bool,
}

impl Wire for ChannelMask {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let bits =
            u8::from(self.ch_37_off) | u8::from(self.ch_38_off) << 1 | u8::from(self.ch_39_off) << 2;
        if bits == 0b111 {
            return Err(CodecError::InvalidValue {
                field: "channel_mask",
                value: bits as u32,
            });
        }
        dst.put_u8(bits);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let bits = src.u8()?;
        if bits & !0b111 != 0 {
            return Err(CodecError::InvalidValue {
                field: "channel_mask",
                value: bits as u32,
            });
        }
        Ok(Self {
            ch_37_off: bits & 0b001 != 0,
            ch_38_off: bits & 0b010 != 0,
            ch_39_off: bits & 0b100 != 0,
        })
    }
}

const ADV_INTERVAL_MIN: u16 = 0x0020;
const ADV_INTERVAL_MAX: u16 = 0x4000;
const ADV_TIMEOUT_MAX: u16 = 0x3FFF;

/// Advertising parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvParams {
    pub adv_type: AdvType,
    /// Required for directed advertising, ignored otherwise.
    pub peer_addr: Option<GapAddr>,
    pub filter_policy: AdvFilterPolicy,
    /// Ignored for high duty cycle directed advertising.
    pub interval: Duration,
    /// Advertising timeout in seconds, 0 for none.
    pub timeout: u16,
    pub channel_mask: ChannelMask,
}

impl Default for AdvParams {
    fn default() -> Self {
        Self {
            adv_type: AdvType::ConnectableUndirected,
            peer_addr: None,
            filter_policy: AdvFilterPolicy::Any,
            interval: Duration::from_millis(100),
            timeout: 0,
            channel_mask: ChannelMask::default(),
        }
    }
}

impl Wire for AdvParams {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let directed = self.adv_type == AdvType::ConnectableDirected;
        if directed && self.peer_addr.is_none() {
            return Err(CodecError::MissingField("peer_addr"));
        }
        let interval = if directed {
            to_units(self.interval, Unit::Us625, "adv interval", 0, ADV_INTERVAL_MAX)?
        } else {
            to_units(
                self.interval,
                Unit::Us625,
                "adv interval",
                ADV_INTERVAL_MIN,
                ADV_INTERVAL_MAX,
            )?
        };
        if self.timeout > ADV_TIMEOUT_MAX {
            return Err(CodecError::OutOfRange {
                field: "adv timeout",
                value: self.timeout as u64,
                min: 0,
                max: ADV_TIMEOUT_MAX as u64,
            });
        }
        self.adv_type.put(dst)?;
        self.peer_addr.put(dst)?;
        self.filter_policy.put(dst)?;
        dst.put_u16_le(interval);
        dst.put_u16_le(self.timeout);
        self.channel_mask.put(dst)
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            adv_type: AdvType::get(src)?,
            peer_addr: Option::<GapAddr>::get(src)?,
            filter_policy: AdvFilterPolicy::get(src)?,
            interval: from_units(src.u16()?, Unit::Us625),
            timeout: src.u16()?,
            channel_mask: ChannelMask::get(src)?,
        })
    }
}

wire_enum! {
    /// Local role on a connection.
    pub enum Role ("role") {
        Invalid = 0,
        Peripheral = 1,
        Central = 2,
    }
}

/// Security mode and level, packed as `sm | lv << 4`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnSecMode {
    pub sm: u8,
    pub lv: u8,
}

impl ConnSecMode {
    /// Mode 1 level 1: no protection, open link.
    pub const OPEN: ConnSecMode = ConnSecMode { sm: 1, lv: 1 };
    /// Mode 0 level 0: no access.
    pub const NO_ACCESS: ConnSecMode = ConnSecMode { sm: 0, lv: 0 };
}

impl Wire for ConnSecMode {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        if self.sm > 0x0F || self.lv > 0x0F {
            return Err(CodecError::InvalidValue {
                field: "conn_sec_mode",
                value: (self.sm as u32) << 8 | self.lv as u32,
            });
        }
        dst.put_u8(self.sm | self.lv << 4);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let raw = src.u8()?;
        Ok(Self {
            sm: raw & 0x0F,
            lv: raw >> 4,
        })
    }
}

wire_struct! {
    /// Current security of a connection.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ConnSec {
        pub sec_mode: ConnSecMode,
        pub encr_key_size: u8,
    }
}
