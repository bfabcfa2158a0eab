use std::fmt;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use optolink_frame::{FrameParser, ParserStats};
use optolink_message::MotorPosition;
use serde::{Deserialize, Serialize};

/// The two remote endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkName {
    Motors,
    Accelerometer,
}

impl LinkName {
    /// Every link, in start-up order.
    pub const ALL: [LinkName; 2] = [LinkName::Motors, LinkName::Accelerometer];

    /// Slot in the fixed link registry.
    pub fn index(self) -> usize {
        match self {
            LinkName::Motors => 0,
            LinkName::Accelerometer => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkName::Motors => "motors",
            LinkName::Accelerometer => "accelerometer",
        }
    }
}

impl fmt::Display for LinkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one link.
///
/// ```text
/// Uninitialized -> Opening -> Ready -> (I/O error) -> Reinitializing
///                    ^                                    |
///                    +------------------------------------+
/// Opening -> PermanentlyFailed (required link at start-up only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Uninitialized,
    Opening,
    Ready,
    /// Not usable; waiting for the next reopen attempt.
    Reinitializing,
    PermanentlyFailed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Uninitialized => "uninitialized",
            LinkState::Opening => "opening",
            LinkState::Ready => "ready",
            LinkState::Reinitializing => "reinitializing",
            LinkState::PermanentlyFailed => "permanently_failed",
        };
        f.write_str(s)
    }
}

/// One serial endpoint: its device, framing state and bookkeeping.
#[derive(Debug)]
pub struct Link<D> {
    pub(crate) name: LinkName,
    pub(crate) path: PathBuf,
    pub(crate) required: bool,
    pub(crate) state: LinkState,
    pub(crate) device: Option<D>,
    pub(crate) parser: FrameParser,
    pub(crate) reinit_count: u64,
    pub(crate) last_motor_position: Option<MotorPosition>,
}

impl<D: AsRawFd> Link<D> {
    pub(crate) fn new(name: LinkName, path: PathBuf, required: bool) -> Self {
        Self {
            name,
            path,
            required,
            state: LinkState::Uninitialized,
            device: None,
            parser: FrameParser::new(),
            reinit_count: 0,
            last_motor_position: None,
        }
    }

    pub fn name(&self) -> LinkName {
        self.name
    }

    /// Configured device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the process cannot run without this link.
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Descriptor of the open device, if any.
    pub fn handle(&self) -> Option<RawFd> {
        self.device.as_ref().map(AsRawFd::as_raw_fd)
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Bytes of a partial frame held by the parser.
    pub fn pending_bytes(&self) -> usize {
        self.parser.buffered()
    }

    /// Number of times this link was lost while ready and reopened.
    pub fn reinit_count(&self) -> u64 {
        self.reinit_count
    }

    /// Last motor position carried by a message received on this link.
    pub fn last_motor_position(&self) -> Option<MotorPosition> {
        self.last_motor_position
    }
}
