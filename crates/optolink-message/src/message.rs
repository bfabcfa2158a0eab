use std::fmt;

use bytes::{Buf, BufMut};

use crate::checksum::checksum;
use crate::error::{MessageError, Result};
use crate::tlv::{
    Command, CurrentReading, EncoderValue, ErrorReport, MotorPosition, Payload, PowerReading,
    Reply, SfpCalibration, TlvType, VibrationValue,
};

/// Maximum number of fields in one message.
pub const MAX_FIELDS: usize = 25;

/// Field header: type (1) + length (2) = 3 bytes.
pub const FIELD_HEADER_SIZE: usize = 3;

/// One type-length-value field. The length is the length of `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tlv_type: u8,
    value: Vec<u8>,
}

impl Tlv {
    /// Raw wire type.
    pub fn tlv_type(&self) -> u8 {
        self.tlv_type
    }

    /// Declared value length.
    pub fn len(&self) -> u16 {
        self.value.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Bytes this field occupies when serialized.
    pub fn wire_size(&self) -> usize {
        FIELD_HEADER_SIZE + self.value.len()
    }
}

/// An ordered, append-only list of TLV fields.
///
/// Field order matters: a checksum field covers the values of every field
/// added before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    fields: Vec<Tlv>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[Tlv] {
        &self.fields
    }

    /// Append a raw field, copying `value` into the message.
    pub fn add_field(&mut self, tlv_type: impl Into<u8>, value: &[u8]) -> Result<()> {
        if self.fields.len() >= MAX_FIELDS {
            return Err(MessageError::TooManyFields { max: MAX_FIELDS });
        }
        if value.len() > u16::MAX as usize {
            return Err(MessageError::ValueTooLong {
                len: value.len(),
                max: u16::MAX as usize,
            });
        }

        let mut owned = Vec::new();
        owned
            .try_reserve_exact(value.len())
            .map_err(|_| MessageError::OutOfMemory { len: value.len() })?;
        owned.extend_from_slice(value);

        self.fields.push(Tlv {
            tlv_type: tlv_type.into(),
            value: owned,
        });
        Ok(())
    }

    /// Append a typed payload under its registered field type.
    pub fn add_payload<P: Payload>(&mut self, payload: &P) -> Result<()> {
        let mut value = Vec::with_capacity(P::SIZE);
        payload.write_to(&mut value);
        self.add_field(P::TLV_TYPE, &value)
    }

    pub fn add_command(&mut self, command: Command) -> Result<()> {
        self.add_payload(&command)
    }

    pub fn add_reply(&mut self, reply: Reply) -> Result<()> {
        self.add_payload(&reply)
    }

    pub fn add_motor_position(&mut self, position: &MotorPosition) -> Result<()> {
        self.add_payload(position)
    }

    pub fn add_current_reading(&mut self, current: u16) -> Result<()> {
        self.add_payload(&CurrentReading(current))
    }

    pub fn add_power_reading(&mut self, power: u16) -> Result<()> {
        self.add_payload(&PowerReading(power))
    }

    pub fn add_encoder_value(&mut self, value: &EncoderValue) -> Result<()> {
        self.add_payload(value)
    }

    pub fn add_vibration_value(&mut self, value: &VibrationValue) -> Result<()> {
        self.add_payload(value)
    }

    pub fn add_error_report(&mut self, report: &ErrorReport) -> Result<()> {
        self.add_payload(report)
    }

    pub fn add_sfp_calibration(&mut self, calibration: &SfpCalibration) -> Result<()> {
        self.add_payload(calibration)
    }

    /// Append a checksum field covering every field currently present.
    ///
    /// Must be the last field added before serialization.
    pub fn add_checksum(&mut self) -> Result<()> {
        let crc = self.checksum();
        self.add_field(TlvType::Checksum, &crc.to_be_bytes())
    }

    /// CRC32 over the values of all fields, in insertion order.
    pub fn checksum(&self) -> u32 {
        self.fields
            .iter()
            .fold(0, |crc, field| checksum(crc, &field.value))
    }

    /// Value of the first field with the given type.
    pub fn get_field(&self, tlv_type: impl Into<u8>) -> Result<&[u8]> {
        let tlv_type = tlv_type.into();
        self.fields
            .iter()
            .find(|field| field.tlv_type == tlv_type)
            .map(|field| field.value.as_slice())
            .ok_or(MessageError::NotFound(tlv_type))
    }

    /// Decode the first field of the payload's type.
    pub fn get_payload<P: Payload>(&self) -> Result<P> {
        P::read_from(self.get_field(P::TLV_TYPE)?)
    }

    pub fn get_command(&self) -> Result<Command> {
        self.get_payload()
    }

    pub fn get_reply(&self) -> Result<Reply> {
        self.get_payload()
    }

    pub fn get_motor_position(&self) -> Result<MotorPosition> {
        self.get_payload()
    }

    pub fn get_current_reading(&self) -> Result<u16> {
        self.get_payload::<CurrentReading>().map(|reading| reading.0)
    }

    pub fn get_power_reading(&self) -> Result<u16> {
        self.get_payload::<PowerReading>().map(|reading| reading.0)
    }

    pub fn get_encoder_value(&self) -> Result<EncoderValue> {
        self.get_payload()
    }

    pub fn get_vibration_value(&self) -> Result<VibrationValue> {
        self.get_payload()
    }

    pub fn get_error_report(&self) -> Result<ErrorReport> {
        self.get_payload()
    }

    pub fn get_sfp_calibration(&self) -> Result<SfpCalibration> {
        self.get_payload()
    }

    /// Size of the serialized form.
    pub fn serialized_size(&self) -> usize {
        self.fields.iter().map(Tlv::wire_size).sum()
    }

    /// Serialize into `buffer`, returning the number of bytes written.
    ///
    /// Wire format, repeated per field:
    /// ```text
    /// ┌───────────┬──────────────┬──────────────────┐
    /// │ Type (1B) │ Length (2B)  │ Value            │
    /// │           │ big-endian   │ (Length bytes)   │
    /// └───────────┴──────────────┴──────────────────┘
    /// ```
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize> {
        let size = self.serialized_size();
        if buffer.len() < size {
            return Err(MessageError::BufferTooSmall {
                expected: size,
                found: buffer.len(),
            });
        }

        let mut dst = &mut buffer[..size];
        for field in &self.fields {
            dst.put_u8(field.tlv_type);
            dst.put_u16(field.len());
            dst.put_slice(&field.value);
        }
        Ok(size)
    }

    /// Serialize into a freshly sized buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(self.serialized_size());
        for field in &self.fields {
            dst.put_u8(field.tlv_type);
            dst.put_u16(field.len());
            dst.put_slice(&field.value);
        }
        dst
    }

    /// Parse a serialized message, consuming all of `data`.
    ///
    /// A checksum field is verified against the fields decoded before it as
    /// soon as it is read.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut message = Self::new();
        let mut src = data;

        while src.has_remaining() {
            if message.fields.len() >= MAX_FIELDS {
                return Err(MessageError::TooManyFields { max: MAX_FIELDS });
            }

            let tlv_type = src.get_u8();
            if src.remaining() < 2 {
                return Err(MessageError::ParseError {
                    offset: data.len() - src.remaining(),
                });
            }
            let length = src.get_u16() as usize;
            if src.remaining() < length {
                return Err(MessageError::ParseError {
                    offset: data.len() - src.remaining(),
                });
            }
            let (value, rest) = src.split_at(length);
            src = rest;

            if tlv_type == u8::from(TlvType::Checksum) {
                let computed = message.checksum();
                if value != computed.to_be_bytes() {
                    return Err(MessageError::ChecksumMismatch {
                        computed,
                        found: value.to_vec(),
                    });
                }
            }

            message.add_field(tlv_type, value)?;
        }

        Ok(message)
    }

    /// Human-readable dump of every field, for diagnostics only.
    pub fn debug_render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Message tlvs({})=[", self.fields.len())?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{{{}, \"", field.tlv_type)?;
            for (j, byte) in field.value.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{byte:02X}")?;
            }
            f.write_str("\"}")?;
        }
        f.write_str("]>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_reply() -> Message {
        let mut msg = Message::new();
        msg.add_reply(Reply::StatusReport).unwrap();
        msg.add_motor_position(&MotorPosition {
            x: -1200,
            y: 350,
            z: 0,
        })
        .unwrap();
        msg.add_current_reading(812).unwrap();
        msg.add_power_reading(4021).unwrap();
        msg.add_encoder_value(&EncoderValue { x: 7, y: -7 }).unwrap();
        msg.add_sfp_calibration(&SfpCalibration {
            offset_x: 320,
            offset_y: 240,
        })
        .unwrap();
        msg.add_checksum().unwrap();
        msg
    }

    #[test]
    fn move_motor_wire_bytes() {
        let mut msg = Message::new();
        msg.add_command(Command::MoveMotor).unwrap();
        msg.add_checksum().unwrap();

        let crc = checksum(0, &[0x02]).to_be_bytes();
        let mut expected = vec![0x01, 0x00, 0x01, 0x02, 0x03, 0x00, 0x04];
        expected.extend_from_slice(&crc);

        let mut buf = [0u8; 64];
        let n = msg.serialize(&mut buf).unwrap();
        assert_eq!(&buf[..n], expected.as_slice());
        assert_eq!(msg.to_bytes(), expected);
    }

    #[test]
    fn roundtrip_preserves_field_order() {
        let msg = status_reply();
        let parsed = Message::parse(&msg.to_bytes()).unwrap();

        assert_eq!(parsed, msg);
        assert_eq!(parsed.get_reply().unwrap(), Reply::StatusReport);
        assert_eq!(
            parsed.get_motor_position().unwrap(),
            MotorPosition {
                x: -1200,
                y: 350,
                z: 0
            }
        );
        assert_eq!(parsed.get_current_reading().unwrap(), 812);
        assert_eq!(parsed.get_power_reading().unwrap(), 4021);
        assert_eq!(parsed.get_encoder_value().unwrap(), EncoderValue { x: 7, y: -7 });
    }

    #[test]
    fn roundtrip_full_message() {
        let mut msg = Message::new();
        for i in 0..(MAX_FIELDS - 1) {
            msg.add_field(200u8, &[i as u8; 5]).unwrap();
        }
        msg.add_checksum().unwrap();
        assert_eq!(msg.len(), MAX_FIELDS);

        let parsed = Message::parse(&msg.to_bytes()).unwrap();
        assert_eq!(parsed.fields(), msg.fields());
    }

    #[test]
    fn flipped_value_byte_fails_checksum() {
        let msg = status_reply();
        let wire = msg.to_bytes();
        let checksum_offset = wire.len() - (FIELD_HEADER_SIZE + 4);

        let mut offset = 0;
        for field in &msg.fields()[..msg.len() - 1] {
            for i in 0..field.value().len() {
                let mut corrupt = wire.clone();
                corrupt[offset + FIELD_HEADER_SIZE + i] ^= 0x01;
                let err = Message::parse(&corrupt).unwrap_err();
                assert!(
                    matches!(err, MessageError::ChecksumMismatch { .. }),
                    "byte {} of field {} gave {err:?}",
                    i,
                    field.tlv_type()
                );
            }
            offset += field.wire_size();
        }
        assert_eq!(offset, checksum_offset);
    }

    #[test]
    fn checksum_validated_mid_stream() {
        let mut msg = Message::new();
        msg.add_command(Command::Homing).unwrap();
        msg.add_checksum().unwrap();
        msg.add_current_reading(3).unwrap();

        let parsed = Message::parse(&msg.to_bytes()).unwrap();
        assert_eq!(parsed.len(), 3);

        let mut wire = msg.to_bytes();
        wire[3] = Command::Reboot as u8;
        assert!(matches!(
            Message::parse(&wire),
            Err(MessageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn short_checksum_field_rejected() {
        let wire = [0x01, 0x00, 0x01, 0x01, 0x03, 0x00, 0x02, 0xAA, 0xBB];
        assert!(matches!(
            Message::parse(&wire),
            Err(MessageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn twenty_sixth_field_rejected() {
        let mut msg = Message::new();
        for _ in 0..MAX_FIELDS {
            msg.add_current_reading(1).unwrap();
        }
        let err = msg.add_current_reading(1).unwrap_err();
        assert_eq!(err, MessageError::TooManyFields { max: MAX_FIELDS });
        assert_eq!(msg.len(), MAX_FIELDS);
    }

    #[test]
    fn parse_rejects_too_many_fields() {
        let wire: Vec<u8> = (0..=MAX_FIELDS).flat_map(|_| [0x05, 0x00, 0x00]).collect();
        assert_eq!(
            Message::parse(&wire).unwrap_err(),
            MessageError::TooManyFields { max: MAX_FIELDS }
        );
    }

    #[test]
    fn serialize_into_short_buffer() {
        let msg = status_reply();
        let size = msg.serialized_size();
        let mut buf = vec![0u8; size - 1];

        let err = msg.serialize(&mut buf).unwrap_err();
        assert_eq!(
            err,
            MessageError::BufferTooSmall {
                expected: size,
                found: size - 1
            }
        );
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn serialized_size_counts_headers() {
        let mut msg = Message::new();
        assert_eq!(msg.serialized_size(), 0);
        msg.add_command(Command::GetStatus).unwrap();
        msg.add_motor_position(&MotorPosition::default()).unwrap();
        assert_eq!(msg.serialized_size(), (3 + 1) + (3 + 12));
    }

    #[test]
    fn missing_field_not_found() {
        let mut msg = Message::new();
        msg.add_command(Command::GetStatus).unwrap();

        assert_eq!(
            msg.get_field(TlvType::Reply).unwrap_err(),
            MessageError::NotFound(2)
        );
        assert_eq!(
            msg.get_motor_position().unwrap_err(),
            MessageError::NotFound(4)
        );
        assert_eq!(
            msg.get_vibration_value().unwrap_err(),
            MessageError::NotFound(10)
        );
    }

    #[test]
    fn getters_see_first_field_only() {
        let mut msg = Message::new();
        msg.add_power_reading(10).unwrap();
        msg.add_power_reading(20).unwrap();
        assert_eq!(msg.get_power_reading().unwrap(), 10);
    }

    #[test]
    fn getter_rejects_wrong_length() {
        let mut msg = Message::new();
        msg.add_field(TlvType::ErrorReport, &[0x00, 0x01]).unwrap();
        assert_eq!(
            msg.get_error_report().unwrap_err(),
            MessageError::SizeMismatch {
                tlv_type: 7,
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn add_field_copies_value() {
        let mut value = vec![1, 2, 3];
        let mut msg = Message::new();
        msg.add_field(TlvType::NetHello, &value).unwrap();
        value[0] = 9;
        assert_eq!(msg.get_field(TlvType::NetHello).unwrap(), &[1, 2, 3]);
        assert_eq!(msg.fields()[0].len(), 3);
    }

    #[test]
    fn oversized_value_rejected() {
        let mut msg = Message::new();
        let value = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            msg.add_field(TlvType::NetSignature, &value),
            Err(MessageError::ValueTooLong { .. })
        ));
        assert!(msg.is_empty());
    }

    #[test]
    fn truncated_input_is_parse_error() {
        let wire = status_reply().to_bytes();
        assert!(matches!(
            Message::parse(&wire[..wire.len() - 1]),
            Err(MessageError::ParseError { .. })
        ));
        assert!(matches!(
            Message::parse(&[0x01, 0x00]),
            Err(MessageError::ParseError { offset: 1 })
        ));
        assert!(matches!(
            Message::parse(&[0x01]),
            Err(MessageError::ParseError { offset: 1 })
        ));
    }

    #[test]
    fn empty_input_is_empty_message() {
        assert!(Message::parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn debug_render_layout() {
        let mut msg = Message::new();
        msg.add_command(Command::MoveMotor).unwrap();
        msg.add_current_reading(0xBEEF).unwrap();
        assert_eq!(
            msg.debug_render(),
            "<Message tlvs(2)=[{1, \"02\"},{5, \"BE EF\"}]>"
        );
        assert_eq!(Message::new().debug_render(), "<Message tlvs(0)=[]>");
    }
}
