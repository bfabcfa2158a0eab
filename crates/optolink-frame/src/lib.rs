//! Byte-stuffed framing of optolink messages over a serial byte stream.
//!
//! Every message travels in one frame:
//! - a `START` marker (`0xF1`)
//! - the serialized message, with `0xF1`, `0xF2` and `0xF3` escaped
//! - an `END` marker (`0xF2`)
//!
//! The parser resynchronizes on the next `START` after any error, so a
//! corrupt or torn frame never blocks the frames that follow it.

pub mod codec;
pub mod error;
pub mod parser;
pub mod writer;

pub use codec::{encode_frame, encode_message, encoded_len, END, ESCAPE, FRAME_MAX_LENGTH, START};
pub use error::{FrameError, Result};
pub use parser::{FrameParser, ParserStats};
pub use writer::{write_frame, DEFAULT_WRITE_TIMEOUT};
