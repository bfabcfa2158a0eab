use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::Path;

use crate::error::Result;

/// An open link device: a byte stream with a pollable descriptor.
pub trait LinkIo: Read + Write + AsRawFd {}

impl<T: Read + Write + AsRawFd> LinkIo for T {}

/// Opens and configures devices by path.
///
/// The link manager owns one opener and calls it on every (re)open.
pub trait DeviceOpener {
    type Device: LinkIo;

    /// Open the device at `path`, ready for raw non-blocking I/O.
    fn open(&mut self, path: &Path) -> Result<Self::Device>;
}
