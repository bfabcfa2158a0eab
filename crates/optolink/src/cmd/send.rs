use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use optolink_link::{LinkManager, LinkName, Reactor};
use optolink_message::{Command, Message, MotorPosition};
use optolink_transport::{DeviceOpener, SerialOpener};
use tracing::info;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{link_error, message_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = args.devices.link_config()?;
    let name = LinkName::from(args.link);
    let position = MotorPosition {
        x: args.x,
        y: args.y,
        z: args.z,
    };
    let message = build_command(args.command.into(), position)?;

    let mut links = LinkManager::new(SerialOpener::new(args.devices.serial_config()), &config);
    let reply = Rc::new(RefCell::new(None));
    if args.wait {
        let slot = Rc::clone(&reply);
        links.set_handler(name, move |_, message| {
            slot.borrow_mut().get_or_insert(message);
        });
    }

    links
        .start(name)
        .map_err(|err| link_error("open failed", err))?;
    links
        .send(name, &message)
        .map_err(|err| link_error("send failed", err))?;
    info!(link = %name, command = ?args.command, "command sent");

    if args.wait {
        let mut reactor = Reactor::new(config.retry_interval);
        let response = wait_for_reply(&mut links, &mut reactor, &reply, wait_timeout)?;
        print_message(&response, Some(name), format);
    }

    Ok(SUCCESS)
}

/// Build a checksummed command message. Only `MoveMotor` carries a position.
pub fn build_command(command: Command, position: MotorPosition) -> CliResult<Message> {
    let mut message = Message::new();
    message
        .add_command(command)
        .map_err(|err| message_error("build failed", err))?;
    if command == Command::MoveMotor {
        message
            .add_motor_position(&position)
            .map_err(|err| message_error("build failed", err))?;
    }
    message
        .add_checksum()
        .map_err(|err| message_error("build failed", err))?;
    Ok(message)
}

fn wait_for_reply<O: DeviceOpener>(
    links: &mut LinkManager<O>,
    reactor: &mut Reactor,
    slot: &RefCell<Option<Message>>,
    timeout: Duration,
) -> CliResult<Message> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(message) = slot.borrow_mut().take() {
            return Ok(message);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {}ms", timeout.as_millis()),
            ));
        }
        reactor
            .run_once(links, deadline - now)
            .map_err(|err| link_error("receive failed", err))?;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Write};
    use std::os::unix::net::UnixStream;
    use std::path::Path;

    use optolink_frame::{encode_message, FrameParser};
    use optolink_link::LinkConfig;
    use optolink_message::Reply;
    use optolink_transport::TransportError;

    use super::*;

    struct PairOpener(VecDeque<UnixStream>);

    impl DeviceOpener for PairOpener {
        type Device = UnixStream;

        fn open(&mut self, path: &Path) -> optolink_transport::Result<UnixStream> {
            let stream = self.0.pop_front().ok_or_else(|| TransportError::Open {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })?;
            stream.set_nonblocking(true)?;
            Ok(stream)
        }
    }

    fn linked() -> (LinkManager<PairOpener>, UnixStream) {
        let (device, remote) = UnixStream::pair().unwrap();
        let mut links = LinkManager::new(
            PairOpener(VecDeque::from([device])),
            &LinkConfig::default(),
        );
        links.start(LinkName::Motors).unwrap();
        (links, remote)
    }

    #[test]
    fn move_motor_carries_position_and_checksum() {
        let position = MotorPosition { x: 5, y: -6, z: 7 };
        let message = build_command(Command::MoveMotor, position).unwrap();

        assert_eq!(message.len(), 3);
        assert_eq!(message.get_command().unwrap(), Command::MoveMotor);
        assert_eq!(message.get_motor_position().unwrap(), position);
        let parsed = Message::parse(&message.to_bytes()).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn other_commands_carry_no_position() {
        let message = build_command(Command::Reboot, MotorPosition { x: 1, y: 1, z: 1 }).unwrap();
        assert_eq!(message.len(), 2);
        assert!(message.get_motor_position().is_err());
    }

    #[test]
    fn wait_returns_first_reply() {
        let (mut links, mut remote) = linked();
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        links.set_handler(LinkName::Motors, move |_, message| {
            sink.borrow_mut().get_or_insert(message);
        });

        let request = build_command(Command::GetStatus, MotorPosition::default()).unwrap();
        links.send(LinkName::Motors, &request).unwrap();

        let mut seen = FrameParser::new();
        let mut buf = [0u8; 64];
        let n = io::Read::read(&mut remote, &mut buf).unwrap();
        assert_eq!(seen.decode(&buf[..n]), vec![request]);

        let mut reply = Message::new();
        reply.add_reply(Reply::StatusReport).unwrap();
        reply
            .add_motor_position(&MotorPosition { x: 1, y: 2, z: 3 })
            .unwrap();
        reply.add_checksum().unwrap();
        remote.write_all(&encode_message(&reply).unwrap()).unwrap();

        let mut reactor = Reactor::new(Duration::from_secs(3600));
        let got = wait_for_reply(&mut links, &mut reactor, &slot, Duration::from_secs(5)).unwrap();
        assert_eq!(got, reply);
    }

    #[test]
    fn silent_device_times_out() {
        let (mut links, _remote) = linked();
        let slot = RefCell::new(None);
        let mut reactor = Reactor::new(Duration::from_secs(3600));

        let err =
            wait_for_reply(&mut links, &mut reactor, &slot, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
