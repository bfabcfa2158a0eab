use optolink_frame::FrameParser;
use optolink_message::Message;
use tracing::warn;

use crate::cmd::DecodeArgs;
use crate::exit::{message_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;

    if args.raw {
        let message = Message::parse(&bytes).map_err(|err| message_error("decode failed", err))?;
        print_message(&message, None, format);
        return Ok(SUCCESS);
    }

    let mut parser = FrameParser::new();
    let messages = parser.decode(&bytes);
    let stats = parser.stats();

    if messages.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "decode failed: no valid frame in input ({} malformed, {} oversized, {} stray bytes)",
                stats.dropped, stats.overflows, stats.noise_bytes
            ),
        ));
    }
    if stats.dropped + stats.overflows > 0 {
        warn!(
            dropped = stats.dropped,
            oversized = stats.overflows,
            "skipped invalid frames"
        );
    }
    if !parser.is_idle() {
        warn!(pending = parser.buffered(), "input ends inside a frame");
    }

    for message in &messages {
        print_message(message, None, format);
    }
    Ok(SUCCESS)
}

fn parse_hex(parts: &[String]) -> CliResult<Vec<u8>> {
    let digits: String = parts
        .iter()
        .flat_map(|part| part.chars())
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::new(USAGE, format!("input is not valid hex: {err}")))
}
