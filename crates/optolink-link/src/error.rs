use std::path::PathBuf;

use optolink_frame::FrameError;
use optolink_transport::TransportError;

use crate::link::LinkName;

/// Errors that can occur managing a link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The device node could not be opened.
    #[error("{name} link: cannot open {path}: {source}")]
    DeviceOpenFailed {
        name: LinkName,
        path: PathBuf,
        source: TransportError,
    },

    /// The device opened but could not be switched to raw mode.
    #[error("{name} link: cannot configure {path}: {source}")]
    DeviceConfigFailed {
        name: LinkName,
        path: PathBuf,
        source: TransportError,
    },

    /// The link is not currently usable.
    #[error("{0} link is not ready")]
    LinkNotReady(LinkName),

    /// A read or write on an open device failed.
    #[error("{name} link I/O error: {source}")]
    Io {
        name: LinkName,
        source: std::io::Error,
    },

    /// Waiting for readiness failed.
    #[error("poll failed: {0}")]
    Poll(std::io::Error),

    /// A message could not be framed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A link the process cannot run without failed to start.
    #[error("required {name} link failed to start: {source}")]
    RequiredLinkFailed {
        name: LinkName,
        source: Box<LinkError>,
    },
}

pub type Result<T> = std::result::Result<T, LinkError>;
