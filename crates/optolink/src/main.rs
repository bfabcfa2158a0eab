mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "optolink", version, about = "Optical-alignment serial link driver")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). RUST_LOG refines it when set.
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
    fn parses_move_motor_send() {
        let cli = Cli::try_parse_from([
            "optolink",
            "send",
            "move-motor",
            "--x",
            "10",
            "--y=-20",
            "--motors-device",
            "/dev/ttyAMA0",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.x, 10);
        assert_eq!(args.y, -20);
        assert_eq!(args.z, 0);
        assert_eq!(
            args.devices.motors_device,
            std::path::PathBuf::from("/dev/ttyAMA0")
        );
    }

    #[test]
    fn rejects_unknown_command() {
        let err = Cli::try_parse_from(["optolink", "send", "self-destruct"])
            .expect_err("unknown command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_run_with_status_polling() {
        let cli = Cli::try_parse_from(["optolink", "run", "--poll-status", "2s", "--count", "3"])
            .expect("run args should parse");
        assert!(matches!(cli.command, Command::Run(_)));
    }

    #[test]
    fn parses_raw_decode() {
        let cli = Cli::try_parse_from(["optolink", "decode", "--raw", "01000102"])
            .expect("decode args should parse");
        let Command::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert!(args.raw);
        assert_eq!(args.hex, vec!["01000102".to_string()]);
    }

    #[test]
    fn line_speed_is_not_configurable() {
        let err = Cli::try_parse_from(["optolink", "run", "--baud-rate", "9600"])
            .expect_err("baud rate flag should not exist");
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);

        let cli = Cli::try_parse_from(["optolink", "run"]).expect("run args should parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.devices.serial_config().baud_rate, 115_200);
    }
}
