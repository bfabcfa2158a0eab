use optolink_message::MessageError;

/// Errors that can occur during frame encoding or writing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message could not be serialized into a frame.
    #[error("message codec error: {0}")]
    Message(#[from] MessageError),

    /// An I/O error occurred while writing a frame.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device accepted zero bytes (closed or hung up).
    #[error("device closed (write returned zero)")]
    DeviceClosed,

    /// The device did not drain its output buffer in time.
    #[error("device stopped accepting bytes (waited {waited:?})")]
    WriteTimeout { waited: std::time::Duration },
}

pub type Result<T> = std::result::Result<T, FrameError>;
