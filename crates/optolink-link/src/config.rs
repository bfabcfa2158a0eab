use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::link::LinkName;

/// Default motor-controller device.
pub const DEFAULT_MOTORS_DEVICE: &str = "/dev/ttyS1";

/// Default accelerometer device; usually a USB adapter that may be absent.
pub const DEFAULT_ACCELEROMETER_DEVICE: &str = "/dev/ttyUSB0";

/// How often the reactor retries links that are not ready.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How long a send waits for a device that has stopped draining output.
pub const DEFAULT_WRITE_TIMEOUT: Duration = optolink_frame::DEFAULT_WRITE_TIMEOUT;

/// Device paths, retry policy and write timeout for both links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub motors_device: PathBuf,
    pub accelerometer_device: PathBuf,
    pub retry_interval: Duration,
    pub write_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            motors_device: PathBuf::from(DEFAULT_MOTORS_DEVICE),
            accelerometer_device: PathBuf::from(DEFAULT_ACCELEROMETER_DEVICE),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl LinkConfig {
    /// Configured device path for `name`.
    pub fn device(&self, name: LinkName) -> &Path {
        match name {
            LinkName::Motors => &self.motors_device,
            LinkName::Accelerometer => &self.accelerometer_device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_board_wiring() {
        let config = LinkConfig::default();
        assert_eq!(config.device(LinkName::Motors), Path::new("/dev/ttyS1"));
        assert_eq!(
            config.device(LinkName::Accelerometer),
            Path::new("/dev/ttyUSB0")
        );
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.write_timeout, Duration::from_secs(1));
    }
}
