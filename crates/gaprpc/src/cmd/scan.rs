use gaprpc_codec::events::TimeoutSource;
use gaprpc_codec::{GapEvent, ScanParams};
use tracing::{info, warn};

use crate::cmd::{interrupt_flag, next_event, parse_duration, Next, ScanArgs};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::{print_event, OutputFormat};

pub fn run(args: ScanArgs, format: OutputFormat) -> CliResult<i32> {
    let params = ScanParams {
        active: args.active,
        use_whitelist: false,
        interval: parse_duration(&args.interval)?,
        window: parse_duration(&args.window)?,
        timeout: args.timeout,
    };
    if params.window > params.interval {
        return Err(CliError::new(
            USAGE,
            format!(
                "scan window {:?} exceeds interval {:?}",
                params.window, params.interval
            ),
        ));
    }

    let stop = interrupt_flag()?;
    let session = args.link.open_session()?;
    let events = session.events();

    session
        .start_scan(params)
        .map_err(|err| rpc_error("start scan", err))?;
    info!(active = params.active, interval = ?params.interval, window = ?params.window, "scanning");

    let mut reports = 0usize;
    let mut link_down = false;
    loop {
        if args.count.is_some_and(|n| reports >= n) {
            break;
        }
        match next_event(&events, &session, &stop) {
            Next::Event(record) => match &record.event {
                GapEvent::AdvReport(_) => {
                    print_event(&record, format);
                    reports += 1;
                }
                GapEvent::Timeout(ev) if ev.src == TimeoutSource::Scan => {
                    info!("scan timed out on the controller");
                    break;
                }
                _ => {}
            },
            Next::Interrupted => break,
            Next::LinkDown => {
                link_down = true;
                break;
            }
        }
    }

    if link_down {
        return Err(CliError::new(TRANSPORT_ERROR, "link closed by controller"));
    }
    if let Err(err) = session.stop_scan() {
        // The controller rejects stop when a scan already timed out.
        warn!(error = %err, "stop scan failed");
    }
    info!(reports, "scan finished");
    session.close();
    Ok(SUCCESS)
}
