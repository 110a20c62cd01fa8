mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gaprpc", version, about = "BLE GAP calls over a serial link")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scan_subcommand() {
        let cli = Cli::try_parse_from([
            "gaprpc",
            "scan",
            "/dev/ttyACM0",
            "--active",
            "--interval",
            "200ms",
            "--count",
            "5",
        ])
        .expect("scan args should parse");

        match cli.command {
            Command::Scan(args) => {
                assert!(args.active);
                assert_eq!(args.count, Some(5));
                assert_eq!(args.link.baud, 1_000_000);
                assert!(!args.link.no_flow_control);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_link_options() {
        let cli = Cli::try_parse_from([
            "gaprpc",
            "info",
            "unix:/tmp/radio.sock",
            "--baud",
            "115200",
            "--no-flow-control",
            "--response-timeout",
            "3s",
        ])
        .expect("info args should parse");

        match cli.command {
            Command::Info(args) => {
                assert_eq!(args.link.port, "unix:/tmp/radio.sock");
                assert_eq!(args.link.baud, 115_200);
                assert!(args.link.no_flow_control);
                assert_eq!(args.link.response_timeout.as_deref(), Some("3s"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn info_requires_a_port() {
        let err = Cli::try_parse_from(["gaprpc", "info"]).expect_err("missing port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_decode_adv() {
        let cli = Cli::try_parse_from(["gaprpc", "--format", "json", "decode-adv", "020106"])
            .expect("decode-adv args should parse");
        assert!(matches!(cli.command, Command::DecodeAdv(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
