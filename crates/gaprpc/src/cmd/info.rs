use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{rpc_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct InfoOutput {
    schema_id: &'static str,
    port: String,
    version_number: u8,
    company_id: u16,
    subversion_number: u16,
    address: String,
    address_type: &'static str,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.link.open_session()?;

    let version = session
        .get_version()
        .map_err(|err| rpc_error("get version", err))?;
    let addr = session
        .get_address()
        .map_err(|err| rpc_error("get address", err))?;
    session.close();

    let out = InfoOutput {
        schema_id: "https://schemas.3leaps.dev/gaprpc/cli/v1/controller-info.schema.json",
        port: args.link.port,
        version_number: version.version_number,
        company_id: version.company_id,
        subversion_number: version.subversion_number,
        address: addr.to_string(),
        address_type: addr.addr_type.name(),
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Controller Info:");
            println!("  Port:        {}", out.port);
            println!("  LL version:  {}", out.version_number);
            println!("  Company ID:  {:#06x}", out.company_id);
            println!("  Subversion:  {:#06x}", out.subversion_number);
            println!("  Address:     {} ({})", out.address, out.address_type);
        }
        OutputFormat::Raw => {
            println!("{}", out.address);
        }
    }
}
