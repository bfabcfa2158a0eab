use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use optolink_link::{LinkConfig, LinkName, DEFAULT_ACCELEROMETER_DEVICE, DEFAULT_MOTORS_DEVICE};
use optolink_transport::SerialConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive both links, printing every received message.
    Run(RunArgs),
    /// Send one command on a link.
    Send(SendArgs),
    /// Decode a hex-encoded frame or message.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Device settings shared by every command that opens a link.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Motor-controller serial device.
    #[arg(long, env = "OPTOLINK_MOTORS_DEVICE", default_value = DEFAULT_MOTORS_DEVICE)]
    pub motors_device: PathBuf,
    /// Accelerometer serial device.
    #[arg(long, env = "OPTOLINK_ACCELEROMETER_DEVICE", default_value = DEFAULT_ACCELEROMETER_DEVICE)]
    pub accelerometer_device: PathBuf,
    /// Interval between reopen attempts for links that are down (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub retry_interval: String,
    /// Give up on a send when the device has not drained for this long.
    #[arg(long, default_value = "1s")]
    pub write_timeout: String,
    /// Do not claim the tty exclusively.
    #[arg(long)]
    pub shared: bool,
}

impl DeviceArgs {
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        Ok(LinkConfig {
            motors_device: self.motors_device.clone(),
            accelerometer_device: self.accelerometer_device.clone(),
            retry_interval: parse_duration(&self.retry_interval)?,
            write_timeout: parse_duration(&self.write_timeout)?,
        })
    }

    /// The line always runs at the firmware's fixed speed.
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            exclusive: !self.shared,
            ..SerialConfig::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LinkArg {
    Motors,
    Accelerometer,
}

impl From<LinkArg> for LinkName {
    fn from(value: LinkArg) -> Self {
        match value {
            LinkArg::Motors => LinkName::Motors,
            LinkArg::Accelerometer => LinkName::Accelerometer,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CommandArg {
    GetStatus,
    MoveMotor,
    SendIr,
    Reboot,
    FirmwareUpgrade,
    Homing,
    RestoreMotor,
}

impl From<CommandArg> for optolink_message::Command {
    fn from(value: CommandArg) -> Self {
        use optolink_message::Command;
        match value {
            CommandArg::GetStatus => Command::GetStatus,
            CommandArg::MoveMotor => Command::MoveMotor,
            CommandArg::SendIr => Command::SendIr,
            CommandArg::Reboot => Command::Reboot,
            CommandArg::FirmwareUpgrade => Command::FirmwareUpgrade,
            CommandArg::Homing => Command::Homing,
            CommandArg::RestoreMotor => Command::RestoreMotor,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub devices: DeviceArgs,
    /// Ask the motor controller for status at this interval (e.g. 10s).
    #[arg(long, value_name = "INTERVAL")]
    pub poll_status: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command to send.
    pub command: CommandArg,
    /// Link to send on.
    #[arg(long, default_value = "motors")]
    pub link: LinkArg,
    /// Target X position (move-motor).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub x: i32,
    /// Target Y position (move-motor).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub y: i32,
    /// Target Z position (move-motor).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub z: i32,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    #[command(flatten)]
    pub devices: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; whitespace and separate arguments are joined.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Input is a serialized message without framing.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
