use std::collections::HashMap;
use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use optolink_frame::{encode_message, write_frame, FrameError};
use optolink_message::Message;
use optolink_transport::{DeviceOpener, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::{Link, LinkName, LinkState};
use crate::status::{LinkStatus, StatusReport};

/// Bytes read from a device per readiness event.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Callback invoked for every message received on a link.
pub type MessageHandler = Box<dyn FnMut(LinkName, Message)>;

/// Owns both links and everything needed to keep them usable.
pub struct LinkManager<O: DeviceOpener> {
    opener: O,
    links: [Link<O::Device>; 2],
    handlers: [Option<MessageHandler>; 2],
    by_handle: HashMap<RawFd, LinkName>,
    read_buf: Vec<u8>,
    write_timeout: Duration,
}

impl<O: DeviceOpener> LinkManager<O> {
    /// Create the registry. No device is opened until [`LinkManager::start`].
    ///
    /// The motors link is required; the accelerometer link is optional.
    pub fn new(opener: O, config: &LinkConfig) -> Self {
        Self {
            opener,
            links: [
                Link::new(LinkName::Motors, config.motors_device.clone(), true),
                Link::new(
                    LinkName::Accelerometer,
                    config.accelerometer_device.clone(),
                    false,
                ),
            ],
            handlers: [None, None],
            by_handle: HashMap::new(),
            read_buf: vec![0u8; READ_CHUNK_SIZE],
            write_timeout: config.write_timeout,
        }
    }

    /// Register the handler for messages arriving on `name`, replacing any
    /// previous one.
    pub fn set_handler<F>(&mut self, name: LinkName, handler: F)
    where
        F: FnMut(LinkName, Message) + 'static,
    {
        self.handlers[name.index()] = Some(Box::new(handler));
    }

    pub fn lookup(&self, name: LinkName) -> &Link<O::Device> {
        &self.links[name.index()]
    }

    /// Resolve the link currently owning descriptor `handle`.
    pub fn lookup_by_handle(&self, handle: RawFd) -> Option<LinkName> {
        self.by_handle.get(&handle).copied()
    }

    /// Descriptors of every open link, for readiness polling.
    pub fn handles(&self) -> Vec<(RawFd, LinkName)> {
        let mut handles: Vec<_> = self.by_handle.iter().map(|(fd, name)| (*fd, *name)).collect();
        handles.sort_unstable_by_key(|(_, name)| name.index());
        handles
    }

    pub fn is_ready(&self, name: LinkName) -> bool {
        self.links[name.index()].is_ready()
    }

    /// Open the link's device for the first time.
    ///
    /// A missing device is logged and returned as an error, never treated as
    /// fatal here; the caller decides whether the link was required.
    pub fn start(&mut self, name: LinkName) -> Result<()> {
        let result = self.open_and_configure(name, true);
        if let Err(err) = &result {
            let link = &self.links[name.index()];
            if link.required {
                warn!(link = %name, device = ?link.path, error = %err, "link failed to start");
            } else {
                info!(link = %name, device = ?link.path, error = %err, "optional link unavailable");
            }
        }
        result
    }

    /// Start every link.
    ///
    /// Fails with [`LinkError::RequiredLinkFailed`] if the motors link cannot
    /// be opened; the optional link is left for later retries.
    pub fn start_all(&mut self) -> Result<()> {
        for name in LinkName::ALL {
            if let Err(err) = self.start(name) {
                let link = &mut self.links[name.index()];
                if link.required {
                    link.state = LinkState::PermanentlyFailed;
                    return Err(LinkError::RequiredLinkFailed {
                        name,
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(())
    }

    /// Open the device, switch it to raw mode and register its handle.
    ///
    /// Any failure leaves the link not ready. With `quiet`, failures are
    /// not logged.
    pub fn open_and_configure(&mut self, name: LinkName, quiet: bool) -> Result<()> {
        self.close_device(name);

        let link = &mut self.links[name.index()];
        link.state = LinkState::Opening;

        match self.opener.open(&link.path) {
            Ok(device) => {
                let handle = link.device.insert(device);
                let fd = handle.as_raw_fd();
                self.by_handle.insert(fd, name);
                link.state = LinkState::Ready;
                info!(link = %name, device = ?link.path, fd, "link ready");
                Ok(())
            }
            Err(source) => {
                link.state = LinkState::Reinitializing;
                let path = link.path.clone();
                let err = match source {
                    TransportError::Open { .. } => LinkError::DeviceOpenFailed { name, path, source },
                    _ => LinkError::DeviceConfigFailed { name, path, source },
                };
                if !quiet {
                    warn!(link = %name, error = %err, "open and configure failed");
                }
                Err(err)
            }
        }
    }

    /// Close the link, drop any partial frame and reopen quietly.
    ///
    /// Only the loss of a ready link counts towards its reinit count;
    /// further reopen attempts on a link that is already down do not.
    pub fn reinitialize(&mut self, name: LinkName) -> Result<()> {
        let state = self.links[name.index()].state;
        if state == LinkState::PermanentlyFailed {
            return Err(LinkError::LinkNotReady(name));
        }

        self.close_device(name);
        let link = &mut self.links[name.index()];
        if state == LinkState::Ready {
            link.reinit_count += 1;
        }
        link.state = LinkState::Reinitializing;
        link.parser.reset();
        debug!(link = %name, reinits = link.reinit_count, "reinitializing link");

        self.open_and_configure(name, true)
    }

    /// Retry every link that is not ready and not permanently failed.
    ///
    /// Returns how many links came back.
    pub fn retry_unready(&mut self) -> usize {
        let mut recovered = 0;
        for name in LinkName::ALL {
            let state = self.links[name.index()].state;
            if matches!(state, LinkState::Ready | LinkState::PermanentlyFailed) {
                continue;
            }
            if self.reinitialize(name).is_ok() {
                recovered += 1;
            }
        }
        recovered
    }

    /// Read one chunk from the link and feed it to its parser.
    ///
    /// Returns the number of messages delivered to the handler. A read
    /// failure reinitializes the link and is returned as
    /// [`LinkError::Io`].
    pub fn on_readable(&mut self, name: LinkName) -> Result<usize> {
        let idx = name.index();
        let Some(device) = self.links[idx].device.as_mut() else {
            return Ok(0);
        };

        let n = match device.read(&mut self.read_buf) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(0);
            }
            Err(err) => {
                warn!(link = %name, error = %err, "read failed, reinitializing");
                let _ = self.reinitialize(name);
                return Err(LinkError::Io { name, source: err });
            }
        };
        trace!(link = %name, bytes = n, "read chunk");

        let Link {
            parser,
            last_motor_position,
            ..
        } = &mut self.links[idx];
        let handler = &mut self.handlers[idx];

        let delivered = parser.push_bytes(&self.read_buf[..n], |message| {
            if let Ok(position) = message.get_motor_position() {
                *last_motor_position = Some(position);
            }
            match handler.as_mut() {
                Some(handler) => handler(name, message),
                None => debug!(link = %name, %message, "no handler for message"),
            }
        });
        Ok(delivered)
    }

    /// Dispatch read readiness on `handle` to its link.
    pub fn on_handle_readable(&mut self, handle: RawFd) -> Result<usize> {
        match self.lookup_by_handle(handle) {
            Some(name) => self.on_readable(name),
            None => {
                debug!(fd = handle, "readiness on unknown handle");
                Ok(0)
            }
        }
    }

    /// Treat hang-up or error readiness on `handle` as an I/O failure.
    pub fn on_handle_error(&mut self, handle: RawFd) -> Result<()> {
        let Some(name) = self.lookup_by_handle(handle) else {
            return Ok(());
        };
        warn!(link = %name, fd = handle, "device hung up, reinitializing");
        self.reinitialize(name)
    }

    /// Frame `message` and write it to the link.
    ///
    /// A link that is not ready is rejected at once with
    /// [`LinkError::LinkNotReady`] after one quiet reopen attempt; the
    /// caller retries the send. A write failure reinitializes the link; the
    /// partially written frame is not resent.
    pub fn send(&mut self, name: LinkName, message: &Message) -> Result<()> {
        if !self.is_ready(name) {
            debug!(link = %name, "send on link that is not ready");
            let _ = self.reinitialize(name);
            return Err(LinkError::LinkNotReady(name));
        }

        let frame = encode_message(message)?;

        let link = &mut self.links[name.index()];
        let Some(device) = link.device.as_mut() else {
            return Err(LinkError::LinkNotReady(name));
        };

        match write_frame(device, &frame, self.write_timeout) {
            Ok(()) => {
                trace!(link = %name, bytes = frame.len(), "sent frame");
                Ok(())
            }
            Err(err) => {
                warn!(link = %name, error = %err, "write failed, reinitializing");
                let source = match err {
                    FrameError::Io(source) => source,
                    FrameError::DeviceClosed => {
                        io::Error::new(ErrorKind::WriteZero, "device accepted no bytes")
                    }
                    FrameError::WriteTimeout { waited } => io::Error::new(
                        ErrorKind::TimedOut,
                        format!("device did not drain within {}ms", waited.as_millis()),
                    ),
                    other => io::Error::other(other.to_string()),
                };
                let _ = self.reinitialize(name);
                Err(LinkError::Io { name, source })
            }
        }
    }

    /// Snapshot of both links for status queries.
    pub fn status(&self) -> StatusReport {
        let links: Vec<LinkStatus> = self.links.iter().map(LinkStatus::from_link).collect();
        let motors = &self.links[LinkName::Motors.index()];
        StatusReport {
            connected: motors.is_ready(),
            motor_position: motors.last_motor_position,
            links,
        }
    }

    fn close_device(&mut self, name: LinkName) {
        let link = &mut self.links[name.index()];
        if let Some(device) = link.device.take() {
            let fd = device.as_raw_fd();
            self.by_handle.remove(&fd);
            drop(device);
            trace!(link = %name, fd, "closed device");
        }
    }
}
