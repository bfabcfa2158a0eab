use std::io;
use std::time::{Duration, Instant};

use optolink_transport::DeviceOpener;
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::manager::LinkManager;

const HANGUP_EVENTS: libc::c_short = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// Single-threaded readiness loop over every open link.
///
/// Each turn polls the link descriptors, dispatches readable and hung-up
/// handles to the [`LinkManager`], and on a fixed interval retries links
/// that are not ready.
#[derive(Debug)]
pub struct Reactor {
    retry_interval: Duration,
    last_retry: Instant,
}

impl Reactor {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            retry_interval,
            last_retry: Instant::now(),
        }
    }

    /// Wait up to `timeout` for readiness and dispatch it.
    ///
    /// Returns the number of messages delivered to handlers. Link I/O
    /// failures are handled by reinitialization and only logged here; the
    /// error path is reserved for `poll(2)` itself failing.
    pub fn run_once<O: DeviceOpener>(
        &mut self,
        links: &mut LinkManager<O>,
        timeout: Duration,
    ) -> Result<usize> {
        let mut fds: Vec<libc::pollfd> = links
            .handles()
            .into_iter()
            .map(|(fd, _)| libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `fds` is a live, exclusively borrowed slice of `fds.len()`
        // pollfd entries for the duration of the call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(LinkError::Poll(err));
        }

        let mut delivered = 0;
        for pollfd in fds.iter().filter(|p| p.revents != 0) {
            if pollfd.revents & libc::POLLIN != 0 {
                match links.on_handle_readable(pollfd.fd) {
                    Ok(n) => delivered += n,
                    Err(err) => {
                        debug!(fd = pollfd.fd, error = %err, "read dispatch failed");
                        continue;
                    }
                }
            }
            if pollfd.revents & HANGUP_EVENTS != 0 {
                if let Err(err) = links.on_handle_error(pollfd.fd) {
                    debug!(fd = pollfd.fd, error = %err, "reopen after hang-up failed");
                }
            }
        }

        if self.last_retry.elapsed() >= self.retry_interval {
            self.last_retry = Instant::now();
            let recovered = links.retry_unready();
            if recovered > 0 {
                info!(recovered, "links recovered on retry");
            }
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use optolink_frame::encode_message;
    use optolink_message::{Message, Reply};
    use optolink_transport::TransportError;

    use super::*;
    use crate::config::LinkConfig;
    use crate::link::LinkName;

    type Plugged = Rc<RefCell<HashMap<PathBuf, VecDeque<UnixStream>>>>;

    struct PairOpener(Plugged);

    impl DeviceOpener for PairOpener {
        type Device = UnixStream;

        fn open(&mut self, path: &Path) -> optolink_transport::Result<UnixStream> {
            let stream = self
                .0
                .borrow_mut()
                .get_mut(path)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| TransportError::Open {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                })?;
            stream.set_nonblocking(true)?;
            Ok(stream)
        }
    }

    fn plug(plugged: &Plugged, path: &str) -> UnixStream {
        let (device, remote) = UnixStream::pair().unwrap();
        plugged
            .borrow_mut()
            .entry(PathBuf::from(path))
            .or_default()
            .push_back(device);
        remote
    }

    fn config() -> LinkConfig {
        LinkConfig {
            motors_device: "/dev/pair-motors".into(),
            accelerometer_device: "/dev/pair-accel".into(),
            retry_interval: Duration::from_secs(3600),
            ..LinkConfig::default()
        }
    }

    fn status_frame() -> Vec<u8> {
        let mut msg = Message::new();
        msg.add_reply(Reply::StatusReport).unwrap();
        msg.add_checksum().unwrap();
        encode_message(&msg).unwrap().to_vec()
    }

    #[test]
    fn delivers_frames_from_readable_handle() {
        let plugged = Plugged::default();
        let mut remote = plug(&plugged, "/dev/pair-motors");
        let mut links = LinkManager::new(PairOpener(Rc::clone(&plugged)), &config());
        links.start_all().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        links.set_handler(LinkName::Motors, move |_, msg| sink.borrow_mut().push(msg));

        let mut reactor = Reactor::new(config().retry_interval);
        assert_eq!(
            reactor
                .run_once(&mut links, Duration::from_millis(10))
                .unwrap(),
            0
        );

        remote.write_all(&status_frame()).unwrap();
        let delivered = reactor
            .run_once(&mut links, Duration::from_secs(5))
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(seen.borrow()[0].get_reply().unwrap(), Reply::StatusReport);
    }

    #[test]
    fn hang_up_reinitializes_link() {
        let plugged = Plugged::default();
        let remote = plug(&plugged, "/dev/pair-motors");
        let mut links = LinkManager::new(PairOpener(Rc::clone(&plugged)), &config());
        links.start_all().unwrap();

        drop(remote);
        let mut reactor = Reactor::new(config().retry_interval);
        reactor
            .run_once(&mut links, Duration::from_secs(5))
            .unwrap();

        let motors = links.lookup(LinkName::Motors);
        assert!(!motors.is_ready());
        assert_eq!(motors.reinit_count(), 1);
        assert!(links.handles().is_empty());

        // A replacement device is picked up on the next reopen.
        let _remote = plug(&plugged, "/dev/pair-motors");
        assert_eq!(links.retry_unready(), 1);
        assert!(links.is_ready(LinkName::Motors));
    }

    #[test]
    fn retry_tick_reopens_optional_link() {
        let plugged = Plugged::default();
        let _motors = plug(&plugged, "/dev/pair-motors");
        let mut links = LinkManager::new(PairOpener(Rc::clone(&plugged)), &config());
        links.start_all().unwrap();
        assert!(!links.is_ready(LinkName::Accelerometer));

        let _accel = plug(&plugged, "/dev/pair-accel");
        let mut reactor = Reactor::new(Duration::ZERO);
        reactor
            .run_once(&mut links, Duration::from_millis(1))
            .unwrap();

        assert!(links.is_ready(LinkName::Accelerometer));
        assert_eq!(links.handles().len(), 2);
    }
}
