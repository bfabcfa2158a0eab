use std::os::fd::AsRawFd;
use std::path::PathBuf;

use optolink_frame::ParserStats;
use optolink_message::MotorPosition;
use serde::Serialize;

use crate::link::{Link, LinkName, LinkState};

/// Per-link view for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub name: LinkName,
    pub connected: bool,
    pub state: LinkState,
    pub device: PathBuf,
    pub required: bool,
    pub reinit_count: u64,
    pub parser: ParserStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_motor_position: Option<MotorPosition>,
}

impl LinkStatus {
    pub(crate) fn from_link<D: AsRawFd>(link: &Link<D>) -> Self {
        Self {
            name: link.name(),
            connected: link.is_ready(),
            state: link.state(),
            device: link.path().to_path_buf(),
            required: link.is_required(),
            reinit_count: link.reinit_count(),
            parser: link.parser_stats(),
            last_motor_position: link.last_motor_position(),
        }
    }
}

/// Answer to a "get status" query from a control front end.
///
/// `connected` and `motor_position` describe the motors link; `links`
/// carries the detail for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub motor_position: Option<MotorPosition>,
    pub links: Vec<LinkStatus>,
}

impl StatusReport {
    pub fn link(&self, name: LinkName) -> Option<&LinkStatus> {
        self.links.iter().find(|status| status.name == name)
    }
}
