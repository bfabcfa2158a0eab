//! TLV type registry and typed payloads.
//!
//! Multi-byte integers are always big-endian on the wire.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{MessageError, Result};

/// Field types understood by the motor and accelerometer firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    Command = 1,
    Reply = 2,
    Checksum = 3,
    MotorPosition = 4,
    CurrentReading = 5,
    SfpCalibration = 6,
    ErrorReport = 7,
    PowerReading = 8,
    EncoderValue = 9,
    VibrationValue = 10,
    NetHello = 100,
    NetSignature = 101,
}

impl TlvType {
    /// Look up a registered type by its wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Command,
            2 => Self::Reply,
            3 => Self::Checksum,
            4 => Self::MotorPosition,
            5 => Self::CurrentReading,
            6 => Self::SfpCalibration,
            7 => Self::ErrorReport,
            8 => Self::PowerReading,
            9 => Self::EncoderValue,
            10 => Self::VibrationValue,
            100 => Self::NetHello,
            101 => Self::NetSignature,
            _ => return None,
        })
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Reply => "REPLY",
            Self::Checksum => "CHECKSUM",
            Self::MotorPosition => "MOTOR_POSITION",
            Self::CurrentReading => "CURRENT_READING",
            Self::SfpCalibration => "SFP_CALIBRATION",
            Self::ErrorReport => "ERROR_REPORT",
            Self::PowerReading => "POWER_READING",
            Self::EncoderValue => "ENCODER_VALUE",
            Self::VibrationValue => "VIBRATION_VALUE",
            Self::NetHello => "NET_HELLO",
            Self::NetSignature => "NET_SIGNATURE",
        }
    }
}

impl From<TlvType> for u8 {
    fn from(value: TlvType) -> Self {
        value as u8
    }
}

/// Returns a name for any wire type, including unregistered ones.
pub fn type_name(value: u8) -> &'static str {
    TlvType::from_u8(value).map_or("UNKNOWN", TlvType::name)
}

/// A fixed-layout value that can be stored in a single field.
pub trait Payload: Sized {
    /// Field type the payload is stored under.
    const TLV_TYPE: TlvType;
    /// Exact encoded size in bytes.
    const SIZE: usize;

    /// Append the big-endian encoding to `dst`.
    fn write_to(&self, dst: &mut Vec<u8>);

    /// Decode from exactly [`Self::SIZE`] bytes, rejecting any other length.
    fn read_from(src: &[u8]) -> Result<Self> {
        if src.len() != Self::SIZE {
            return Err(MessageError::SizeMismatch {
                tlv_type: Self::TLV_TYPE.into(),
                expected: Self::SIZE,
                found: src.len(),
            });
        }
        Self::decode(src)
    }

    /// Decode a value already checked to be [`Self::SIZE`] bytes long.
    fn decode(src: &[u8]) -> Result<Self>;
}

/// Commands carried by [`TlvType::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Command {
    GetStatus = 1,
    MoveMotor = 2,
    SendIr = 3,
    Reboot = 4,
    FirmwareUpgrade = 5,
    Homing = 6,
    RestoreMotor = 7,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::GetStatus,
            2 => Self::MoveMotor,
            3 => Self::SendIr,
            4 => Self::Reboot,
            5 => Self::FirmwareUpgrade,
            6 => Self::Homing,
            7 => Self::RestoreMotor,
            _ => return None,
        })
    }
}

impl Payload for Command {
    const TLV_TYPE: TlvType = TlvType::Command;
    const SIZE: usize = 1;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u8(*self as u8);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Self::from_u8(src[0]).ok_or(MessageError::UnknownValue {
            tlv_type: Self::TLV_TYPE.into(),
            value: src[0],
        })
    }
}

/// Replies carried by [`TlvType::Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Reply {
    StatusReport = 1,
    ErrorReport = 2,
}

impl Reply {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::StatusReport),
            2 => Some(Self::ErrorReport),
            _ => None,
        }
    }
}

impl Payload for Reply {
    const TLV_TYPE: TlvType = TlvType::Reply;
    const SIZE: usize = 1;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u8(*self as u8);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Self::from_u8(src[0]).ok_or(MessageError::UnknownValue {
            tlv_type: Self::TLV_TYPE.into(),
            value: src[0],
        })
    }
}

/// Absolute motor position in steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Payload for MotorPosition {
    const TLV_TYPE: TlvType = TlvType::MotorPosition;
    const SIZE: usize = 12;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_i32(self.x);
        dst.put_i32(self.y);
        dst.put_i32(self.z);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self {
            x: src.get_i32(),
            y: src.get_i32(),
            z: src.get_i32(),
        })
    }
}

/// Raw motor encoder counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderValue {
    pub x: i32,
    pub y: i32,
}

impl Payload for EncoderValue {
    const TLV_TYPE: TlvType = TlvType::EncoderValue;
    const SIZE: usize = 8;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_i32(self.x);
        dst.put_i32(self.y);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self {
            x: src.get_i32(),
            y: src.get_i32(),
        })
    }
}

/// Accelerometer averages and peaks, four samples per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationValue {
    pub avg_x: [i32; 4],
    pub avg_y: [i32; 4],
    pub avg_z: [i32; 4],
    pub max_x: [i32; 4],
    pub max_y: [i32; 4],
    pub max_z: [i32; 4],
}

impl VibrationValue {
    fn series(&self) -> [&[i32; 4]; 6] {
        [
            &self.avg_x,
            &self.avg_y,
            &self.avg_z,
            &self.max_x,
            &self.max_y,
            &self.max_z,
        ]
    }
}

impl Payload for VibrationValue {
    const TLV_TYPE: TlvType = TlvType::VibrationValue;
    const SIZE: usize = 6 * 4 * 4;

    fn write_to(&self, dst: &mut Vec<u8>) {
        for series in self.series() {
            for sample in series {
                dst.put_i32(*sample);
            }
        }
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        let mut out = Self::default();
        for series in [
            &mut out.avg_x,
            &mut out.avg_y,
            &mut out.avg_z,
            &mut out.max_x,
            &mut out.max_y,
            &mut out.max_z,
        ] {
            for sample in series.iter_mut() {
                *sample = src.get_i32();
            }
        }
        Ok(out)
    }
}

/// Firmware error code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: u32,
}

impl Payload for ErrorReport {
    const TLV_TYPE: TlvType = TlvType::ErrorReport;
    const SIZE: usize = 4;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u32(self.code);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self {
            code: src.get_u32(),
        })
    }
}

/// SFP module calibration offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfpCalibration {
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Payload for SfpCalibration {
    const TLV_TYPE: TlvType = TlvType::SfpCalibration;
    const SIZE: usize = 8;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u32(self.offset_x);
        dst.put_u32(self.offset_y);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self {
            offset_x: src.get_u32(),
            offset_y: src.get_u32(),
        })
    }
}

/// Motor driver current reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentReading(pub u16);

impl Payload for CurrentReading {
    const TLV_TYPE: TlvType = TlvType::CurrentReading;
    const SIZE: usize = 2;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u16(self.0);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self(src.get_u16()))
    }
}

/// Received optical power reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerReading(pub u16);

impl Payload for PowerReading {
    const TLV_TYPE: TlvType = TlvType::PowerReading;
    const SIZE: usize = 2;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.put_u16(self.0);
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        Ok(Self(src.get_u16()))
    }
}
