use std::fmt;
use std::io;

use optolink_frame::FrameError;
use optolink_link::LinkError;
use optolink_message::MessageError;
use optolink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::WriteZero
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::UnsupportedBaudRate(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn message_error(context: &str, err: MessageError) -> CliError {
    match err {
        MessageError::OutOfMemory { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Message(err) => message_error(context, err),
        FrameError::Io(source) => io_error(context, source),
        FrameError::DeviceClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::DeviceOpenFailed { source, .. } | LinkError::DeviceConfigFailed { source, .. } => {
            transport_error(context, source)
        }
        LinkError::LinkNotReady(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        LinkError::Io { source, .. } | LinkError::Poll(source) => io_error(context, source),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::RequiredLinkFailed { source, .. } => link_error(context, *source),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use optolink_link::LinkName;

    use super::*;

    #[test]
    fn missing_device_maps_to_transport_error() {
        let err = LinkError::RequiredLinkFailed {
            name: LinkName::Motors,
            source: Box::new(LinkError::DeviceOpenFailed {
                name: LinkName::Motors,
                path: PathBuf::from("/dev/ttyS1"),
                source: TransportError::Open {
                    path: PathBuf::from("/dev/ttyS1"),
                    source: io::Error::from(io::ErrorKind::NotFound),
                },
            }),
        };
        let cli = link_error("start failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("start failed: "));
    }

    #[test]
    fn permission_denied_is_distinct() {
        let err = TransportError::Open {
            path: PathBuf::from("/dev/ttyS1"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(transport_error("open", err).code, PERMISSION_DENIED);
    }

    #[test]
    fn codec_failures_are_data_invalid() {
        let err = FrameError::Message(MessageError::ChecksumMismatch {
            computed: 1,
            found: vec![0, 0, 0, 2],
        });
        assert_eq!(frame_error("decode", err).code, DATA_INVALID);
        assert_eq!(
            message_error("decode", MessageError::OutOfMemory { len: 4 }).code,
            INTERNAL
        );
    }
}
