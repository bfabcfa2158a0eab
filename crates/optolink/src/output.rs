use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use optolink_link::{LinkName, StatusReport};
use optolink_message::{
    type_name, Command, CurrentReading, EncoderValue, ErrorReport, Message, MotorPosition,
    Payload, PowerReading, Reply, SfpCalibration, Tlv, TlvType, VibrationValue,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FieldOutput {
    tlv_type: u8,
    name: &'static str,
    len: u16,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<Value>,
}

#[derive(Serialize)]
struct MessageOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<LinkName>,
    field_count: usize,
    fields: Vec<FieldOutput>,
}

fn decode_as<P: Payload + Serialize>(value: &[u8]) -> Option<Value> {
    P::read_from(value)
        .ok()
        .and_then(|payload| serde_json::to_value(payload).ok())
}

/// Typed view of a field value, when its type is registered and its size
/// matches the registered layout.
fn decode_field(field: &Tlv) -> Option<Value> {
    let value = field.value();
    match TlvType::from_u8(field.tlv_type())? {
        TlvType::Command => decode_as::<Command>(value),
        TlvType::Reply => decode_as::<Reply>(value),
        TlvType::MotorPosition => decode_as::<MotorPosition>(value),
        TlvType::CurrentReading => decode_as::<CurrentReading>(value),
        TlvType::SfpCalibration => decode_as::<SfpCalibration>(value),
        TlvType::ErrorReport => decode_as::<ErrorReport>(value),
        TlvType::PowerReading => decode_as::<PowerReading>(value),
        TlvType::EncoderValue => decode_as::<EncoderValue>(value),
        TlvType::VibrationValue => decode_as::<VibrationValue>(value),
        TlvType::Checksum | TlvType::NetHello | TlvType::NetSignature => None,
    }
}

fn message_output(message: &Message, link: Option<LinkName>) -> MessageOutput {
    MessageOutput {
        link,
        field_count: message.len(),
        fields: message
            .fields()
            .iter()
            .map(|field| FieldOutput {
                tlv_type: field.tlv_type(),
                name: type_name(field.tlv_type()),
                len: field.len(),
                value: hex::encode(field.value()),
                decoded: decode_field(field),
            })
            .collect(),
    }
}

pub fn print_message(message: &Message, link: Option<LinkName>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = message_output(message, link);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "NAME", "LEN", "VALUE"]);
            for field in message.fields() {
                let value = match decode_field(field) {
                    Some(decoded) => decoded.to_string(),
                    None => hex::encode(field.value()),
                };
                table.add_row(vec![
                    field.tlv_type().to_string(),
                    type_name(field.tlv_type()).to_string(),
                    field.len().to_string(),
                    value,
                ]);
            }
            if let Some(link) = link {
                println!("link: {link}");
            }
            println!("{table}");
        }
        OutputFormat::Pretty => match link {
            Some(link) => println!("{link}: {message}"),
            None => println!("{message}"),
        },
    }
}

pub fn print_status(status: &StatusReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(status).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "LINK", "CONNECTED", "STATE", "DEVICE", "REINITS", "FRAMES", "DROPPED",
                ]);
            for link in &status.links {
                table.add_row(vec![
                    link.name.to_string(),
                    link.connected.to_string(),
                    link.state.to_string(),
                    link.device.display().to_string(),
                    link.reinit_count.to_string(),
                    link.parser.frames.to_string(),
                    (link.parser.dropped + link.parser.overflows).to_string(),
                ]);
            }
            println!("{table}");
            println!("motor position: {}", position_text(status.motor_position));
        }
        OutputFormat::Pretty => {
            println!(
                "connected={} motor_position={}",
                status.connected,
                position_text(status.motor_position)
            );
            for link in &status.links {
                println!(
                    "  {} state={} device={} reinits={} frames={} dropped={}",
                    link.name,
                    link.state,
                    link.device.display(),
                    link.reinit_count,
                    link.parser.frames,
                    link.parser.dropped + link.parser.overflows
                );
            }
        }
    }
}

fn position_text(position: Option<MotorPosition>) -> String {
    match position {
        Some(p) => format!("x={} y={} z={}", p.x, p.y, p.z),
        None => "unknown".to_string(),
    }
}
