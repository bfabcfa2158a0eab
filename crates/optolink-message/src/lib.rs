//! TLV message codec for the optolink serial protocol.
//!
//! A message is an ordered list of at most [`MAX_FIELDS`] type-length-value
//! fields. On the wire every field is laid out as:
//! - a 1-byte type from the [`TlvType`] registry
//! - a 2-byte big-endian value length
//! - the value bytes
//!
//! A trailing [`TlvType::Checksum`] field carries the CRC32 of every value
//! that precedes it and is verified as soon as it is decoded.

pub mod checksum;
pub mod error;
pub mod message;
pub mod tlv;

pub use checksum::checksum;
pub use error::{MessageError, Result};
pub use message::{Message, Tlv, FIELD_HEADER_SIZE, MAX_FIELDS};
pub use tlv::{
    type_name, Command, CurrentReading, EncoderValue, ErrorReport, MotorPosition, Payload,
    PowerReading, Reply, SfpCalibration, TlvType, VibrationValue,
};
