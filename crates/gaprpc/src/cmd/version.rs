use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("gaprpc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: gaprpc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("GAPRPC_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, async={}, cli=true",
        cfg!(feature = "session"),
        cfg!(feature = "async")
    );
    println!(
        "wire: max_payload={} default_payload={}",
        gaprpc_frame::MAX_WIRE_PAYLOAD,
        gaprpc_frame::DEFAULT_MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
