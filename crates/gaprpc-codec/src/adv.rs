//! Advertising and scan response data parser.
//!
//! The payload is a sequence of AD structures: `len: u8`, `ad_type: u8`,
//! then `len - 1` value bytes. A zero length or a length that runs past
//! the buffer ends the parse; the structures before it are kept, the
//! report is flagged as truncated and the process-wide counter returned
//! by [`truncated_reports`] is bumped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Largest legacy advertising or scan response payload.
pub const MAX_ADV_DATA: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_UUID16_INCOMPLETE: u8 = 0x02;
pub const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;
pub const AD_TYPE_UUID32_INCOMPLETE: u8 = 0x04;
pub const AD_TYPE_UUID32_COMPLETE: u8 = 0x05;
pub const AD_TYPE_UUID128_INCOMPLETE: u8 = 0x06;
pub const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
pub const AD_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

static TRUNCATED_REPORTS: AtomicU64 = AtomicU64::new(0);

/// Number of reports, since process start, whose parse stopped early.
pub fn truncated_reports() -> u64 {
    TRUNCATED_REPORTS.load(Ordering::Relaxed)
}

/// One bit of the Flags AD structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdFlag {
    LeLimitedDiscoverable,
    LeGeneralDiscoverable,
    BrEdrNotSupported,
    LeBrEdrController,
    LeBrEdrHost,
}

impl AdFlag {
    const ALL: [(u8, AdFlag); 5] = [
        (0x01, AdFlag::LeLimitedDiscoverable),
        (0x02, AdFlag::LeGeneralDiscoverable),
        (0x04, AdFlag::BrEdrNotSupported),
        (0x08, AdFlag::LeBrEdrController),
        (0x10, AdFlag::LeBrEdrHost),
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdFlag::LeLimitedDiscoverable => "LE Limited Discoverable Mode",
            AdFlag::LeGeneralDiscoverable => "LE General Discoverable Mode",
            AdFlag::BrEdrNotSupported => "BR/EDR Not Supported",
            AdFlag::LeBrEdrController => "LE BR/EDR Controller",
            AdFlag::LeBrEdrHost => "LE BR/EDR Host",
        }
    }

    pub fn from_bits(bits: u8) -> Vec<AdFlag> {
        Self::ALL
            .iter()
            .filter(|(mask, _)| bits & mask != 0)
            .map(|(_, flag)| *flag)
            .collect()
    }

    pub fn to_bits(flags: &[AdFlag]) -> u8 {
        Self::ALL
            .iter()
            .filter(|(_, flag)| flags.contains(flag))
            .fold(0, |bits, (mask, _)| bits | mask)
    }
}

/// A decoded AD structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdStructure {
    Flags(Vec<AdFlag>),
    LocalName { complete: bool, name: String },
    Uuids16 { complete: bool, uuids: Vec<String> },
    Uuids32 { complete: bool, uuids: Vec<String> },
    Uuids128 { complete: bool, uuids: Vec<String> },
    TxPower(i8),
    ManufacturerData { company_id: u16, data: Vec<u8> },
    Raw { ad_type: u8, data: Vec<u8> },
}

impl AdStructure {
    pub fn ad_type(&self) -> u8 {
        match self {
            AdStructure::Flags(_) => AD_TYPE_FLAGS,
            AdStructure::LocalName { complete: true, .. } => AD_TYPE_COMPLETE_LOCAL_NAME,
            AdStructure::LocalName { complete: false, .. } => AD_TYPE_SHORT_LOCAL_NAME,
            AdStructure::Uuids16 { complete: true, .. } => AD_TYPE_UUID16_COMPLETE,
            AdStructure::Uuids16 { complete: false, .. } => AD_TYPE_UUID16_INCOMPLETE,
            AdStructure::Uuids32 { complete: true, .. } => AD_TYPE_UUID32_COMPLETE,
            AdStructure::Uuids32 { complete: false, .. } => AD_TYPE_UUID32_INCOMPLETE,
            AdStructure::Uuids128 { complete: true, .. } => AD_TYPE_UUID128_COMPLETE,
            AdStructure::Uuids128 { complete: false, .. } => AD_TYPE_UUID128_INCOMPLETE,
            AdStructure::TxPower(_) => AD_TYPE_TX_POWER_LEVEL,
            AdStructure::ManufacturerData { .. } => AD_TYPE_MANUFACTURER_DATA,
            AdStructure::Raw { ad_type, .. } => *ad_type,
        }
    }

    /// Display label for the AD type.
    pub fn label(&self) -> &'static str {
        match self {
            AdStructure::Flags(_) => "flags",
            AdStructure::LocalName { complete: true, .. } => "complete local name",
            AdStructure::LocalName { complete: false, .. } => "short local name",
            AdStructure::Uuids16 { .. } => "16-bit service uuids",
            AdStructure::Uuids32 { .. } => "32-bit service uuids",
            AdStructure::Uuids128 { .. } => "128-bit service uuids",
            AdStructure::TxPower(_) => "tx power level",
            AdStructure::ManufacturerData { .. } => "manufacturer specific data",
            AdStructure::Raw { .. } => "raw",
        }
    }

    fn decode(ad_type: u8, value: &[u8]) -> AdStructure {
        match ad_type {
            AD_TYPE_FLAGS => AdStructure::Flags(AdFlag::from_bits(value.first().copied().unwrap_or(0))),
            AD_TYPE_SHORT_LOCAL_NAME | AD_TYPE_COMPLETE_LOCAL_NAME => AdStructure::LocalName {
                complete: ad_type == AD_TYPE_COMPLETE_LOCAL_NAME,
                name: String::from_utf8_lossy(value).into_owned(),
            },
            AD_TYPE_UUID16_INCOMPLETE | AD_TYPE_UUID16_COMPLETE => AdStructure::Uuids16 {
                complete: ad_type == AD_TYPE_UUID16_COMPLETE,
                uuids: value
                    .chunks_exact(2)
                    .map(|c| format!("{:04X}", u16::from_le_bytes([c[0], c[1]])))
                    .collect(),
            },
            AD_TYPE_UUID32_INCOMPLETE | AD_TYPE_UUID32_COMPLETE => AdStructure::Uuids32 {
                complete: ad_type == AD_TYPE_UUID32_COMPLETE,
                uuids: value
                    .chunks_exact(4)
                    .map(|c| {
                        format!(
                            "{:08X}-0000-1000-8000-00805F9B34FB",
                            u32::from_le_bytes([c[0], c[1], c[2], c[3]])
                        )
                    })
                    .collect(),
            },
            AD_TYPE_UUID128_INCOMPLETE | AD_TYPE_UUID128_COMPLETE => AdStructure::Uuids128 {
                complete: ad_type == AD_TYPE_UUID128_COMPLETE,
                uuids: value.chunks_exact(16).map(uuid128_text).collect(),
            },
            AD_TYPE_TX_POWER_LEVEL if value.len() == 1 => AdStructure::TxPower(value[0] as i8),
            AD_TYPE_MANUFACTURER_DATA if value.len() >= 2 => AdStructure::ManufacturerData {
                company_id: u16::from_le_bytes([value[0], value[1]]),
                data: value[2..].to_vec(),
            },
            _ => AdStructure::Raw {
                ad_type,
                data: value.to_vec(),
            },
        }
    }
}

impl fmt::Display for AdStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdStructure::Flags(flags) => {
                let names: Vec<_> = flags.iter().map(|flag| flag.name()).collect();
                write!(f, "{}", names.join(", "))
            }
            AdStructure::LocalName { name, .. } => write!(f, "{name}"),
            AdStructure::Uuids16 { uuids, .. }
            | AdStructure::Uuids32 { uuids, .. }
            | AdStructure::Uuids128 { uuids, .. } => write!(f, "{}", uuids.join(", ")),
            AdStructure::TxPower(dbm) => write!(f, "{dbm} dBm"),
            AdStructure::ManufacturerData { company_id, data } => {
                write!(f, "company {company_id:#06x}: {}", hex(data))
            }
            AdStructure::Raw { ad_type, data } => write!(f, "type {ad_type:#04x}: {}", hex(data)),
        }
    }
}

fn uuid128_text(le: &[u8]) -> String {
    let be: Vec<u8> = le.iter().rev().copied().collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex(&be[0..4]),
        hex(&be[4..6]),
        hex(&be[6..8]),
        hex(&be[8..10]),
        hex(&be[10..16])
    )
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Result of parsing one advertising payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdReport {
    pub structures: Vec<AdStructure>,
    /// Parsing stopped at a malformed structure.
    pub truncated: bool,
}

impl AdReport {
    /// Complete local name, else short local name.
    pub fn local_name(&self) -> Option<&str> {
        let mut short = None;
        for structure in &self.structures {
            if let AdStructure::LocalName { complete, name } = structure {
                if *complete {
                    return Some(name.as_str());
                }
                short.get_or_insert(name.as_str());
            }
        }
        short
    }

    pub fn flags(&self) -> Option<&[AdFlag]> {
        self.structures.iter().find_map(|s| match s {
            AdStructure::Flags(flags) => Some(flags.as_slice()),
            _ => None,
        })
    }

    pub fn tx_power(&self) -> Option<i8> {
        self.structures.iter().find_map(|s| match s {
            AdStructure::TxPower(dbm) => Some(*dbm),
            _ => None,
        })
    }
}

/// Parse an advertising or scan response payload.
///
/// Bytes beyond [`MAX_ADV_DATA`] are ignored. Never fails.
pub fn parse(data: &[u8]) -> AdReport {
    let data = &data[..data.len().min(MAX_ADV_DATA)];
    let mut report = AdReport::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let len = data[pos] as usize;
        pos += 1;
        if len == 0 || pos + len > data.len() {
            debug!(offset = pos - 1, len, available = data.len() - pos, "malformed AD structure, stopping parse");
            report.truncated = true;
            TRUNCATED_REPORTS.fetch_add(1, Ordering::Relaxed);
            break;
        }
        let ad_type = data[pos];
        let value = &data[pos + 1..pos + len];
        report.structures.push(AdStructure::decode(ad_type, value));
        pos += len;
    }

    report
}

/// Builds advertising payloads, for the advertising side.
#[derive(Debug, Clone, Default)]
pub struct AdBuilder {
    buf: Vec<u8>,
}

impl AdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw structure; returns false, leaving the payload
    /// unchanged, if it would exceed [`MAX_ADV_DATA`].
    pub fn push(&mut self, ad_type: u8, value: &[u8]) -> bool {
        if self.buf.len() + 2 + value.len() > MAX_ADV_DATA {
            return false;
        }
        self.buf.push(value.len() as u8 + 1);
        self.buf.push(ad_type);
        self.buf.extend_from_slice(value);
        true
    }

    pub fn flags(mut self, flags: &[AdFlag]) -> Self {
        self.push(AD_TYPE_FLAGS, &[AdFlag::to_bits(flags)]);
        self
    }

    /// Add the name, shortened to fit if needed.
    pub fn local_name(mut self, name: &str) -> Self {
        let room = MAX_ADV_DATA.saturating_sub(self.buf.len() + 2);
        if name.len() <= room {
            self.push(AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes());
        } else {
            let mut end = room;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            self.push(AD_TYPE_SHORT_LOCAL_NAME, &name.as_bytes()[..end]);
        }
        self
    }

    pub fn tx_power(mut self, dbm: i8) -> Self {
        self.push(AD_TYPE_TX_POWER_LEVEL, &[dbm as u8]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_structures() {
        let data = [
            0x02, 0x01, 0x06, // flags
            0x05, 0x03, 0x0D, 0x18, 0x0F, 0x18, // 16-bit uuids
            0x04, 0x09, b'H', b'R', b'M', // name
            0x02, 0x0A, 0xF8, // tx power
        ];
        let report = parse(&data);
        assert!(!report.truncated);
        assert_eq!(report.structures.len(), 4);
        assert_eq!(
            report.flags().unwrap(),
            &[AdFlag::LeGeneralDiscoverable, AdFlag::BrEdrNotSupported]
        );
        assert_eq!(
            report.structures[1],
            AdStructure::Uuids16 {
                complete: true,
                uuids: vec!["180D".into(), "180F".into()],
            }
        );
        assert_eq!(report.local_name(), Some("HRM"));
        assert_eq!(report.tx_power(), Some(-8));
    }

    #[test]
    fn overlong_element_keeps_prior_structures() {
        let before = truncated_reports();
        let data = [0x02, 0x01, 0x06, 0x10, 0x09, b'a', b'b'];
        let report = parse(&data);
        assert!(report.truncated);
        assert_eq!(report.structures, vec![AdStructure::Flags(vec![
            AdFlag::LeGeneralDiscoverable,
            AdFlag::BrEdrNotSupported,
        ])]);
        assert!(truncated_reports() > before);
    }

    #[test]
    fn zero_length_stops_parse() {
        let data = [0x00, 0x02, 0x01, 0x06];
        let report = parse(&data);
        assert!(report.truncated);
        assert!(report.structures.is_empty());
    }

    #[test]
    fn empty_payload_is_clean() {
        let report = parse(&[]);
        assert!(!report.truncated);
        assert!(report.structures.is_empty());
    }

    #[test]
    fn uuid32_and_uuid128_text() {
        let mut data = vec![0x05, 0x05, 0x78, 0x56, 0x34, 0x12];
        data.push(0x11);
        data.push(0x07);
        data.extend((0u8..16).rev());
        let report = parse(&data);
        assert_eq!(
            report.structures[0],
            AdStructure::Uuids32 {
                complete: true,
                uuids: vec!["12345678-0000-1000-8000-00805F9B34FB".into()],
            }
        );
        assert_eq!(
            report.structures[1],
            AdStructure::Uuids128 {
                complete: true,
                uuids: vec!["00010203-0405-0607-0809-0A0B0C0D0E0F".into()],
            }
        );
    }

    #[test]
    fn tx_power_with_wrong_length_passes_through() {
        let report = parse(&[0x03, 0x0A, 0x01, 0x02]);
        assert_eq!(
            report.structures[0],
            AdStructure::Raw {
                ad_type: AD_TYPE_TX_POWER_LEVEL,
                data: vec![1, 2],
            }
        );
    }

    #[test]
    fn manufacturer_data_splits_company_id() {
        let report = parse(&[0x05, 0xFF, 0x59, 0x00, 0xAA, 0xBB, 0x01, 0xFF]);
        assert_eq!(
            report.structures[0],
            AdStructure::ManufacturerData {
                company_id: 0x0059,
                data: vec![0xAA, 0xBB],
            }
        );
        assert_eq!(
            report.structures[1],
            AdStructure::Raw {
                ad_type: AD_TYPE_MANUFACTURER_DATA,
                data: vec![],
            }
        );
    }

    #[test]
    fn input_past_31_bytes_is_ignored() {
        let mut data = vec![0x1E, 0xFE];
        data.extend([0u8; 29]);
        data.extend([0x02, 0x01, 0x06]);
        let report = parse(&data);
        assert_eq!(report.structures.len(), 1);
        assert!(!report.truncated);
    }

    #[test]
    fn invalid_name_bytes_replaced() {
        let report = parse(&[0x03, 0x08, 0xC3, 0x28]);
        assert_eq!(
            report.structures[0],
            AdStructure::LocalName {
                complete: false,
                name: "\u{FFFD}(".into(),
            }
        );
    }

    #[test]
    fn builder_output_parses_back() {
        let data = AdBuilder::new()
            .flags(&[AdFlag::LeGeneralDiscoverable, AdFlag::BrEdrNotSupported])
            .local_name("gaprpc-demo")
            .build();
        assert_eq!(&data[..3], &[0x02, 0x01, 0x06]);
        let report = parse(&data);
        assert_eq!(report.local_name(), Some("gaprpc-demo"));
    }

    #[test]
    fn builder_shortens_long_names() {
        let data = AdBuilder::new()
            .flags(&[AdFlag::LeGeneralDiscoverable])
            .local_name(&"n".repeat(40))
            .build();
        assert_eq!(data.len(), MAX_ADV_DATA);
        let report = parse(&data);
        assert_eq!(
            report.structures[1],
            AdStructure::LocalName {
                complete: false,
                name: "n".repeat(26),
            }
        );
    }
}
