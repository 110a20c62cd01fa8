use crate::cmd::{interrupt_flag, next_event, EventsArgs, Next};
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_event, OutputFormat};

pub fn run(args: EventsArgs, format: OutputFormat) -> CliResult<i32> {
    let stop = interrupt_flag()?;
    let session = args.link.open_session()?;
    let events = session.events();

    let mut received = 0usize;
    loop {
        if args.count.is_some_and(|n| received >= n) {
            break;
        }
        match next_event(&events, &session, &stop) {
            Next::Event(record) => {
                print_event(&record, format);
                received += 1;
            }
            Next::Interrupted => break,
            Next::LinkDown => {
                return Err(CliError::new(TRANSPORT_ERROR, "link closed by controller"));
            }
        }
    }

    tracing::debug!(received, stats = ?session.stats(), "event stream finished");
    session.close();
    Ok(SUCCESS)
}
