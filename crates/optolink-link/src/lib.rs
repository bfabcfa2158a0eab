//! Link management for the optolink serial protocol.
//!
//! One [`Link`] exists per remote microcontroller for the lifetime of the
//! process. The [`LinkManager`] opens and configures each device, feeds
//! incoming bytes through a per-link frame parser to the registered message
//! handler, writes outgoing frames, and transparently reopens a link after
//! any read or write failure. The [`Reactor`] drives it all from a single
//! thread with `poll(2)`.

pub mod config;
pub mod error;
pub mod link;
pub mod manager;
pub mod reactor;
pub mod status;

pub use config::{
    LinkConfig, DEFAULT_ACCELEROMETER_DEVICE, DEFAULT_MOTORS_DEVICE, DEFAULT_RETRY_INTERVAL,
    DEFAULT_WRITE_TIMEOUT,
};
pub use error::{LinkError, Result};
pub use link::{Link, LinkName, LinkState};
pub use manager::{LinkManager, MessageHandler, READ_CHUNK_SIZE};
pub use reactor::Reactor;
pub use status::{LinkStatus, StatusReport};
