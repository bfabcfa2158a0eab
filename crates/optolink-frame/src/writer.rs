use std::io::{self, ErrorKind, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{FrameError, Result};

/// How long a write may wait for a full device buffer to drain.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Write an encoded frame in full, then flush.
///
/// Short writes are resumed from where they stopped. When the descriptor is
/// non-blocking and the device buffer is full, the write waits for it to
/// drain, but for no longer than `timeout` in total; past that the frame is
/// abandoned with [`FrameError::WriteTimeout`]. A zero-length write means
/// the device went away and is reported as [`FrameError::DeviceClosed`].
pub fn write_frame<W: Write + AsRawFd>(dst: &mut W, frame: &[u8], timeout: Duration) -> Result<()> {
    let fd = dst.as_raw_fd();
    let deadline = Instant::now() + timeout;
    write_frame_with(dst, frame, || {
        if wait_writable(fd, deadline)? {
            Ok(())
        } else {
            Err(FrameError::WriteTimeout { waited: timeout })
        }
    })
}

/// Write loop behind [`write_frame`]; `on_full` runs each time the
/// destination reports [`ErrorKind::WouldBlock`] and decides whether to
/// keep going.
fn write_frame_with<W, F>(dst: &mut W, frame: &[u8], mut on_full: F) -> Result<()>
where
    W: Write,
    F: FnMut() -> Result<()>,
{
    let mut offset = 0usize;
    while offset < frame.len() {
        match dst.write(&frame[offset..]) {
            Ok(0) => return Err(FrameError::DeviceClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                trace!(written = offset, total = frame.len(), "device buffer full");
                on_full()?;
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }

    loop {
        match dst.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => on_full()?,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Block until `fd` accepts output or `deadline` passes.
///
/// Returns `Ok(false)` on timeout. Hang-up and error readiness count as
/// writable so the next write surfaces the real error.
fn wait_writable(fd: RawFd, deadline: Instant) -> io::Result<bool> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        let timeout_ms = remaining
            .as_millis()
            .clamp(1, libc::c_int::MAX as u128) as libc::c_int;
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        };
        // SAFETY: one valid pollfd that outlives the call.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        match rc {
            0 => continue,
            n if n > 0 => return Ok(true),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() != ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }
    }
}
