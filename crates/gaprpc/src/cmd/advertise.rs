use gaprpc_codec::adv::AdBuilder;
use gaprpc_codec::events::TimeoutSource;
use gaprpc_codec::{AdFlag, AdvParams, ConnSecMode, GapEvent};
use tracing::{info, warn};

use crate::cmd::{interrupt_flag, next_event, parse_duration, AdvertiseArgs, Next};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::{print_event, OutputFormat};

pub fn run(args: AdvertiseArgs, format: OutputFormat) -> CliResult<i32> {
    if args.name.is_empty() {
        return Err(CliError::new(USAGE, "device name must not be empty"));
    }
    let params = AdvParams {
        interval: parse_duration(&args.interval)?,
        timeout: args.timeout,
        ..AdvParams::default()
    };

    let stop = interrupt_flag()?;
    let session = args.link.open_session()?;
    let events = session.events();

    session
        .set_device_name(ConnSecMode::OPEN, args.name.as_str())
        .map_err(|err| rpc_error("set device name", err))?;
    let data = AdBuilder::new()
        .flags(&[AdFlag::LeGeneralDiscoverable, AdFlag::BrEdrNotSupported])
        .local_name(&args.name)
        .build();
    session
        .set_advertising_data(data, Vec::new())
        .map_err(|err| rpc_error("set advertising data", err))?;
    session
        .start_advertising(params)
        .map_err(|err| rpc_error("start advertising", err))?;
    info!(name = %args.name, interval = ?params.interval, "advertising");

    let mut advertising = true;
    loop {
        match next_event(&events, &session, &stop) {
            Next::Event(record) => {
                print_event(&record, format);
                match &record.event {
                    GapEvent::Timeout(ev) if ev.src == TimeoutSource::Advertising => {
                        advertising = false;
                        break;
                    }
                    // Advertising stops on connect.
                    GapEvent::Connected(_) => advertising = false,
                    GapEvent::Disconnected(_) if !advertising => {
                        session
                            .start_advertising(params)
                            .map_err(|err| rpc_error("restart advertising", err))?;
                        advertising = true;
                    }
                    _ => {}
                }
            }
            Next::Interrupted => break,
            Next::LinkDown => {
                return Err(CliError::new(TRANSPORT_ERROR, "link closed by controller"));
            }
        }
    }

    if advertising {
        if let Err(err) = session.stop_advertising() {
            warn!(error = %err, "stop advertising failed");
        }
    }
    info!("advertising finished");
    session.close();
    Ok(SUCCESS)
}
