use std::path::PathBuf;

/// Errors that can occur opening or configuring a serial device.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device node could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A terminal configuration step failed on an open device.
    #[error("failed to configure {path} ({step}): {source}")]
    Configure {
        path: PathBuf,
        step: &'static str,
        source: std::io::Error,
    },

    /// The requested line speed has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// An I/O error occurred on an open device.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
