use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gaprpc_codec::{AdReport, AdStructure, EventRecord, GapEvent};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct StructureOutput {
    pub ad_type: u8,
    pub label: &'static str,
    pub value: String,
}

#[derive(Serialize)]
pub struct AdOutput {
    pub local_name: Option<String>,
    pub truncated: bool,
    pub structures: Vec<StructureOutput>,
}

impl AdOutput {
    pub fn from_report(report: &AdReport) -> Self {
        Self {
            local_name: report.local_name().map(str::to_string),
            truncated: report.truncated,
            structures: report.structures.iter().map(structure_output).collect(),
        }
    }
}

fn structure_output(structure: &AdStructure) -> StructureOutput {
    StructureOutput {
        ad_type: structure.ad_type(),
        label: structure.label(),
        value: structure.to_string(),
    }
}

#[derive(Serialize)]
struct AdvReportOutput {
    peer_addr: String,
    addr_type: &'static str,
    rssi: i8,
    scan_rsp: bool,
    adv_type: String,
    #[serde(flatten)]
    data: AdOutput,
}

#[derive(Serialize)]
struct EventOutput {
    schema_id: &'static str,
    event: &'static str,
    id: u16,
    conn_handle: u16,
    timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    adv_report: Option<AdvReportOutput>,
    detail: String,
}

fn event_output(record: &EventRecord) -> EventOutput {
    let adv_report = match &record.event {
        GapEvent::AdvReport(report) => Some(AdvReportOutput {
            peer_addr: report.peer_addr.to_string(),
            addr_type: report.peer_addr.addr_type.name(),
            rssi: report.rssi,
            scan_rsp: report.scan_rsp,
            adv_type: format!("{:?}", report.adv_type),
            data: AdOutput::from_report(&report.parse()),
        }),
        _ => None,
    };
    EventOutput {
        schema_id: "https://schemas.3leaps.dev/gaprpc/cli/v1/event.schema.json",
        event: record.name(),
        id: record.id,
        conn_handle: record.conn_handle,
        timestamp_ms: unix_millis(record.timestamp),
        adv_report,
        detail: event_detail(&record.event),
    }
}

/// One-line summary of an event's payload.
pub fn event_detail(event: &GapEvent) -> String {
    match event {
        GapEvent::Connected(ev) => format!("peer={} role={:?}", ev.peer_addr, ev.role),
        GapEvent::Disconnected(ev) => format!("reason={:#04x}", ev.reason),
        GapEvent::AuthStatus(ev) => format!(
            "auth_status={:#04x} bonded={}",
            ev.auth_status, ev.bonded
        ),
        GapEvent::RssiChanged(ev) => format!("rssi={}", ev.rssi),
        GapEvent::Timeout(ev) => format!("src={:?}", ev.src),
        GapEvent::AdvReport(ev) => {
            let report = ev.parse();
            format!(
                "peer={} rssi={} name={}",
                ev.peer_addr,
                ev.rssi,
                report.local_name().unwrap_or("-")
            )
        }
        GapEvent::ScanReqReport(ev) => format!("peer={} rssi={}", ev.peer_addr, ev.rssi),
        other => format!("{other:?}"),
    }
}

pub fn print_event(record: &EventRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&event_output(record)).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "CONN", "DETAIL"])
                .add_row(vec![
                    record.name().to_string(),
                    format!("{:#06x}", record.conn_handle),
                    event_detail(&record.event),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} conn={:#06x} {}",
                record.name(),
                record.conn_handle,
                event_detail(&record.event)
            );
        }
        OutputFormat::Raw => match record.encode() {
            Ok(body) => print_raw(&body),
            Err(_) => print_raw(&[]),
        },
    }
}

pub fn print_ad_report(report: &AdReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = AdOutput::from_report(report);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "LABEL", "VALUE"]);
            for structure in &report.structures {
                table.add_row(vec![
                    format!("{:#04x}", structure.ad_type()),
                    structure.label().to_string(),
                    structure.to_string(),
                ]);
            }
            println!("{table}");
            if report.truncated {
                println!("(truncated: parsing stopped at a malformed structure)");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for structure in &report.structures {
                println!("{}: {}", structure.label(), structure);
            }
            if report.truncated {
                println!("truncated");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
