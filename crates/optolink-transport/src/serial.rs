use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::DeviceOpener;

/// Line speed used by both microcontroller links.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Line settings applied when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Claim the tty with `TIOCEXCL` so no other process can open it.
    pub exclusive: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            exclusive: true,
        }
    }
}

fn speed_for(baud_rate: u32) -> Result<libc::speed_t> {
    let speed = match baud_rate {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

/// An open serial device in raw, non-blocking mode.
#[derive(Debug)]
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    /// Open `path` read/write and configure it per `config`.
    ///
    /// The descriptor is close-on-exec and never becomes the controlling
    /// terminal of this process.
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = speed_for(config.baud_rate)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let port = Self { file, path };
        port.configure(speed, config.exclusive)?;
        debug!(device = ?port.path, baud = config.baud_rate, "serial device configured");
        Ok(port)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure(&self, speed: libc::speed_t, exclusive: bool) -> Result<()> {
        let fd = self.file.as_raw_fd();

        if exclusive {
            // SAFETY: `fd` is an open descriptor owned by `self.file`; TIOCEXCL
            // takes no argument.
            let rc = unsafe { libc::ioctl(fd, libc::TIOCEXCL) };
            if rc != 0 {
                return Err(self.configure_error("TIOCEXCL"));
            }
        }

        let mut termios = MaybeUninit::<libc::termios>::uninit();
        // SAFETY: `termios` points to writable storage of the right size and
        // `fd` is open.
        if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
            return Err(self.configure_error("tcgetattr"));
        }
        // SAFETY: tcgetattr succeeded, so every field has been written.
        let mut termios = unsafe { termios.assume_init() };

        // SAFETY: `termios` is a valid, initialized termios value.
        unsafe { libc::cfmakeraw(&mut termios) };
        termios.c_cflag |= libc::CLOCAL | libc::CREAD;

        // SAFETY: as above; the speed constant comes from libc.
        if unsafe { libc::cfsetispeed(&mut termios, speed) } != 0 {
            return Err(self.configure_error("cfsetispeed"));
        }
        // SAFETY: as above.
        if unsafe { libc::cfsetospeed(&mut termios, speed) } != 0 {
            return Err(self.configure_error("cfsetospeed"));
        }

        // SAFETY: `fd` is open and `termios` is fully initialized.
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &termios) } != 0 {
            return Err(self.configure_error("tcsetattr"));
        }
        Ok(())
    }

    fn configure_error(&self, step: &'static str) -> TransportError {
        TransportError::Configure {
            path: self.path.clone(),
            step,
            source: io::Error::last_os_error(),
        }
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for SerialPort {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Opens real tty devices with a fixed [`SerialConfig`].
#[derive(Debug, Clone, Default)]
pub struct SerialOpener {
    config: SerialConfig,
}

impl SerialOpener {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl DeviceOpener for SerialOpener {
    type Device = SerialPort;

    fn open(&mut self, path: &Path) -> Result<SerialPort> {
        SerialPort::open(path, &self.config)
    }
}
