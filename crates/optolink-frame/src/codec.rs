use bytes::{BufMut, Bytes, BytesMut};
use optolink_message::{Message, MessageError};

use crate::error::Result;

/// Start-of-frame marker.
pub const START: u8 = 0xF1;

/// End-of-frame marker.
pub const END: u8 = 0xF2;

/// Escape prefix for payload bytes that collide with a marker.
pub const ESCAPE: u8 = 0xF3;

/// Maximum frame size in bytes, markers and escapes included.
pub const FRAME_MAX_LENGTH: usize = 1024;

fn needs_escape(byte: u8) -> bool {
    matches!(byte, START | END | ESCAPE)
}

/// Wire size of `payload` once framed.
pub fn encoded_len(payload: &[u8]) -> usize {
    2 + payload.len() + payload.iter().filter(|b| needs_escape(**b)).count()
}

/// Wrap a serialized message into a frame.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────────────────┬──────────┐
/// │ START 0xF1 │ payload, 0xF1/0xF2/0xF3 sent │ END 0xF2 │
/// │            │ as 0xF3 followed by the byte │          │
/// └────────────┴──────────────────────────────┴──────────┘
/// ```
///
/// Fails with [`MessageError::BufferTooSmall`] if the frame would exceed
/// [`FRAME_MAX_LENGTH`]; `dst` is left untouched in that case.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let total = encoded_len(payload);
    if total > FRAME_MAX_LENGTH {
        return Err(MessageError::BufferTooSmall {
            expected: total,
            found: FRAME_MAX_LENGTH,
        }
        .into());
    }

    dst.reserve(total);
    dst.put_u8(START);
    for &byte in payload {
        if needs_escape(byte) {
            dst.put_u8(ESCAPE);
        }
        dst.put_u8(byte);
    }
    dst.put_u8(END);
    Ok(())
}

/// Serialize a message and frame it for the wire.
pub fn encode_message(message: &Message) -> Result<Bytes> {
    let mut payload = vec![0u8; message.serialized_size()];
    let size = message.serialize(&mut payload)?;

    let mut dst = BytesMut::with_capacity(encoded_len(&payload[..size]));
    encode_frame(&payload[..size], &mut dst)?;
    Ok(dst.freeze())
}
