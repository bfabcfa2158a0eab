//! Link-layer driver for a motorized optical-alignment device.
//!
//! Exchanges TLV control and status messages with a motor controller and an
//! accelerometer unit over two serial links.
//!
//! # Crate Structure
//!
//! - [`message`]: TLV message codec with CRC32 validation
//! - [`frame`]: Byte-stuffed framing and incremental frame parsing
//! - [`transport`]: Raw-mode serial device access
//! - [`link`]: Link lifecycle, reinitialization and the poll reactor

/// Re-export message types.
pub mod message {
    pub use optolink_message::*;
}

/// Re-export frame types.
pub mod frame {
    pub use optolink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use optolink_transport::*;
}

/// Re-export link types.
pub mod link {
    pub use optolink_link::*;
}
