//! Serial device transport.
//!
//! Opens a tty device for exclusive read/write and switches it to raw mode
//! (no echo, no line editing, no signal generation) at a fixed baud rate.
//! The link layer reaches devices only through the [`DeviceOpener`] trait,
//! so tests can substitute in-process fakes for real hardware.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::{DeviceOpener, LinkIo};

#[cfg(unix)]
pub use serial::{SerialConfig, SerialOpener, SerialPort, DEFAULT_BAUD_RATE};
