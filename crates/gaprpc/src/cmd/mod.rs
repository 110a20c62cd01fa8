use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use gaprpc_codec::EventRecord;
use gaprpc_session::{Session, SessionConfig};
use gaprpc_transport::{LinkAddr, LinkConfig};

use crate::exit::{rpc_error, transport_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod advertise;
pub mod decode_adv;
pub mod events;
pub mod info;
pub mod scan;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Parse a hex advertising payload without touching the radio.
    DecodeAdv(DecodeAdvArgs),
    /// Print controller version and device address.
    Info(InfoArgs),
    /// Scan and print advertising reports.
    Scan(ScanArgs),
    /// Advertise under a device name until interrupted.
    Advertise(AdvertiseArgs),
    /// Print every event the controller sends.
    Events(EventsArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::DecodeAdv(args) => decode_adv::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Scan(args) => scan::run(args, format),
        Command::Advertise(args) => advertise::run(args, format),
        Command::Events(args) => events::run(args, format),
    }
}

/// How to reach the controller.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device (e.g. /dev/ttyACM0) or `unix:<path>` socket bridge.
    pub port: String,
    /// Serial baud rate.
    #[arg(long, default_value_t = 1_000_000)]
    pub baud: u32,
    /// Disable RTS/CTS flow control.
    #[arg(long)]
    pub no_flow_control: bool,
    /// Per-call response timeout (e.g. 2s, 1500ms).
    #[arg(long, value_name = "DURATION")]
    pub response_timeout: Option<String>,
    /// Session configuration file (JSON).
    #[arg(long, value_name = "FILE", env = "GAPRPC_CONFIG")]
    pub config: Option<PathBuf>,
}

impl LinkArgs {
    pub fn open_session(&self) -> CliResult<Session> {
        let addr: LinkAddr = self
            .port
            .parse()
            .map_err(|err| transport_error("invalid port", err))?;

        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)
                .map_err(|err| CliError::new(DATA_INVALID, format!("config {}: {err}", path.display())))?,
            None => SessionConfig::default(),
        };
        if let Some(timeout) = &self.response_timeout {
            config.response_timeout = parse_duration(timeout)?;
        }

        let link_config = LinkConfig {
            baud_rate: self.baud,
            flow_control: !self.no_flow_control,
            ..LinkConfig::default()
        };

        Session::open(&addr, &link_config, config).map_err(|err| rpc_error("open failed", err))
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct DecodeAdvArgs {
    /// Payload as hex; spaces, colons and dashes are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Send scan requests to advertisers.
    #[arg(long)]
    pub active: bool,
    /// Scan interval (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// Scan window; must not exceed the interval.
    #[arg(long, default_value = "50ms")]
    pub window: String,
    /// Controller-side scan timeout in seconds, 0 for none.
    #[arg(long, default_value_t = 0)]
    pub timeout: u16,
    /// Stop after N advertising reports.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct AdvertiseArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Device name to set and advertise.
    #[arg(long, default_value = "gaprpc")]
    pub name: String,
    /// Advertising interval (e.g. 40ms).
    #[arg(long, default_value = "40ms")]
    pub interval: String,
    /// Controller-side advertising timeout in seconds, 0 for none.
    #[arg(long, default_value_t = 0)]
    pub timeout: u16,
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after receiving N events.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Set on Ctrl-C.
pub fn interrupt_flag() -> CliResult<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(crate::exit::INTERNAL, format!("failed to set Ctrl-C handler: {err}")))?;
    Ok(stop)
}

pub enum Next {
    Event(EventRecord),
    Interrupted,
    LinkDown,
}

/// Wait for the next event, waking periodically to check for Ctrl-C.
pub fn next_event(events: &Receiver<EventRecord>, session: &Session, stop: &AtomicBool) -> Next {
    let tick = session.config().poll_interval.max(Duration::from_millis(100));
    loop {
        if stop.load(Ordering::SeqCst) {
            return Next::Interrupted;
        }
        match events.recv_timeout(tick) {
            Ok(record) => return Next::Event(record),
            Err(RecvTimeoutError::Timeout) => {
                if session.is_link_down() {
                    return Next::LinkDown;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Next::LinkDown,
        }
    }
}
