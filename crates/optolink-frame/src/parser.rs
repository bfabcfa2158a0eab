use bytes::{BufMut, BytesMut};
use optolink_message::Message;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::codec::{END, ESCAPE, FRAME_MAX_LENGTH, START};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Discarding bytes until a START marker.
    WaitStart,
    /// Collecting payload bytes.
    InFrame,
    /// Previous byte was ESCAPE; the next byte is literal payload.
    Escape,
}

/// Running counters for one parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// Frames decoded into messages.
    pub frames: u64,
    /// Frames discarded as torn, malformed or failing the checksum.
    pub dropped: u64,
    /// Frames discarded for exceeding the length bound.
    pub overflows: u64,
    /// Bytes seen outside any frame.
    pub noise_bytes: u64,
}

/// Incremental frame parser for one serial link.
///
/// Bytes may arrive in chunks of any size; partial frames are kept across
/// calls to [`FrameParser::push_bytes`] until completed or discarded.
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    buf: BytesMut,
    max_length: usize,
    stats: ParserStats,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser bounded by [`FRAME_MAX_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(FRAME_MAX_LENGTH)
    }

    /// Create a parser with an explicit bound on unescaped payload size.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            state: ParseState::WaitStart,
            buf: BytesMut::with_capacity(max_length),
            max_length,
            stats: ParserStats::default(),
        }
    }

    /// Drop any partial frame and wait for the next START marker.
    ///
    /// Counters are kept.
    pub fn reset(&mut self) {
        self.state = ParseState::WaitStart;
        self.buf.clear();
    }

    /// True when no partial frame is held.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitStart && self.buf.is_empty()
    }

    /// Unescaped bytes of the frame in progress.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Feed a chunk of raw bytes, calling `on_message` for every frame that
    /// decodes into a valid message.
    ///
    /// Returns the number of messages delivered.
    pub fn push_bytes<F>(&mut self, chunk: &[u8], mut on_message: F) -> usize
    where
        F: FnMut(Message),
    {
        let mut delivered = 0;
        for &byte in chunk {
            match (self.state, byte) {
                (ParseState::WaitStart, START) => self.begin_frame(),
                (ParseState::WaitStart, _) => self.stats.noise_bytes += 1,
                (ParseState::InFrame, START) => {
                    debug!(discarded = self.buf.len(), "frame restarted before end marker");
                    self.stats.dropped += 1;
                    self.begin_frame();
                }
                (ParseState::InFrame, END) => {
                    self.state = ParseState::WaitStart;
                    if let Some(message) = self.finish_frame() {
                        delivered += 1;
                        on_message(message);
                    }
                }
                (ParseState::InFrame, ESCAPE) => self.state = ParseState::Escape,
                (ParseState::InFrame, _) | (ParseState::Escape, _) => self.push_payload(byte),
            }
        }
        delivered
    }

    /// Feed a chunk and collect the decoded messages.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Message> {
        let mut out = Vec::new();
        self.push_bytes(chunk, |message| out.push(message));
        out
    }

    fn begin_frame(&mut self) {
        self.buf.clear();
        self.state = ParseState::InFrame;
    }

    fn push_payload(&mut self, byte: u8) {
        if self.buf.len() >= self.max_length {
            warn!(
                max = self.max_length,
                "frame exceeds maximum length, resynchronizing"
            );
            self.stats.overflows += 1;
            self.reset();
            return;
        }
        self.buf.put_u8(byte);
        self.state = ParseState::InFrame;
    }

    fn finish_frame(&mut self) -> Option<Message> {
        let result = Message::parse(&self.buf);
        let size = self.buf.len();
        self.buf.clear();

        match result {
            Ok(message) => {
                self.stats.frames += 1;
                trace!(size, fields = message.len(), "decoded frame");
                Some(message)
            }
            Err(err) => {
                self.stats.dropped += 1;
                debug!(size, error = %err, "discarding malformed frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use optolink_message::{Command, MotorPosition, Reply};

    use super::*;
    use crate::codec::encode_message;

    fn status_message() -> Message {
        let mut msg = Message::new();
        msg.add_reply(Reply::StatusReport).unwrap();
        // Values chosen so the serialized form contains every marker byte.
        msg.add_motor_position(&MotorPosition {
            x: 0x00F1_F2F3,
            y: -3,
            z: 0x7F,
        })
        .unwrap();
        msg.add_checksum().unwrap();
        msg
    }

    fn frame_of(msg: &Message) -> Vec<u8> {
        encode_message(msg).unwrap().to_vec()
    }

    #[test]
    fn single_frame_single_chunk() {
        let msg = status_message();
        let mut parser = FrameParser::new();

        let decoded = parser.decode(&frame_of(&msg));
        assert_eq!(decoded, vec![msg]);
        assert!(parser.is_idle());
        assert_eq!(parser.stats().frames, 1);
    }

    #[test]
    fn fragmented_delivery_matches_whole() {
        let msg = status_message();
        let wire = frame_of(&msg);

        for split in 1..wire.len() {
            let mut parser = FrameParser::new();
            let mut decoded = parser.decode(&wire[..split]);
            assert!(decoded.is_empty(), "split {split} delivered early");
            decoded.extend(parser.decode(&wire[split..]));
            assert_eq!(decoded, vec![msg.clone()], "split {split}");
        }
    }

    #[test]
    fn byte_at_a_time() {
        let msg = status_message();
        let mut parser = FrameParser::new();
        let mut decoded = Vec::new();
        for byte in frame_of(&msg) {
            decoded.extend(parser.decode(&[byte]));
        }
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn back_to_back_frames_in_one_chunk() {
        let first = status_message();
        let mut second = Message::new();
        second.add_command(Command::GetStatus).unwrap();
        second.add_checksum().unwrap();

        let mut wire = frame_of(&first);
        wire.extend(frame_of(&second));

        let mut parser = FrameParser::new();
        let mut count = 0;
        let delivered = parser.push_bytes(&wire, |_| count += 1);
        assert_eq!(delivered, 2);
        assert_eq!(count, 2);
    }

    #[test]
    fn corrupt_frame_does_not_block_next() {
        let good = status_message();
        let mut corrupt = frame_of(&good);
        // Reply value byte: START, type, len, len, value.
        corrupt[4] ^= 0x01;

        let mut wire = corrupt;
        wire.extend(frame_of(&good));

        let mut parser = FrameParser::new();
        assert_eq!(parser.decode(&wire), vec![good]);
        assert_eq!(parser.stats().dropped, 1);
        assert_eq!(parser.stats().frames, 1);
    }

    #[test]
    fn garbage_frame_then_valid() {
        let good = status_message();
        let mut wire = vec![0x13, 0x37, START, 0x09, 0x00, 0x40, 0x01, 0x02, END];
        wire.extend(frame_of(&good));

        let mut parser = FrameParser::new();
        assert_eq!(parser.decode(&wire), vec![good]);
        assert_eq!(parser.stats().noise_bytes, 2);
        assert_eq!(parser.stats().dropped, 1);
    }

    #[test]
    fn torn_frame_resynchronizes_on_start() {
        let good = status_message();
        let whole = frame_of(&good);
        let mut wire = whole[..6].to_vec();
        wire.extend(&whole);

        let mut parser = FrameParser::new();
        assert_eq!(parser.decode(&wire), vec![good]);
        assert_eq!(parser.stats().dropped, 1);
    }

    #[test]
    fn oversized_frame_dropped_and_bounded() {
        let good = status_message();
        let mut parser = FrameParser::with_max_length(32);

        let mut wire = vec![START];
        wire.extend(std::iter::repeat(0x42).take(200));
        wire.push(END);
        wire.extend(frame_of(&good));

        let mut decoded = Vec::new();
        for chunk in wire.chunks(7) {
            decoded.extend(parser.decode(chunk));
            assert!(parser.buffered() <= 32);
        }
        assert_eq!(decoded, vec![good]);
        assert_eq!(parser.stats().overflows, 1);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let good = status_message();
        let wire = frame_of(&good);
        let mut parser = FrameParser::new();

        assert!(parser.decode(&wire[..5]).is_empty());
        assert!(!parser.is_idle());

        parser.reset();
        assert!(parser.is_idle());
        assert!(parser.decode(&wire[5..]).is_empty());
        assert_eq!(parser.decode(&wire), vec![good]);
    }

    #[test]
    fn message_without_checksum_still_decodes() {
        let mut msg = Message::new();
        msg.add_power_reading(99).unwrap();

        let mut parser = FrameParser::new();
        let decoded = parser.decode(&frame_of(&msg));
        assert_eq!(decoded[0].get_power_reading().unwrap(), 99);
    }
}
