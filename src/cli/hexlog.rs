//! Text packet log reader.
//!
//! One packet per line:
//!
//! ```text
//! <in|out> <type> <sync> [<time-ms>] : <hex bytes>
//! ```
//!
//! `type` is decimal or `0x`-prefixed hex, `sync` is a number or `-` when the
//! packet has none. Hex bytes may be spaced or run together. Blank lines and
//! lines starting with `#` are skipped.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use pktlens_core::{Direction, IngestBatch, IngestedPacket, LogType};

use crate::error::{ArgError, LogError, Result};

/// Parse a packet type id such as `0x015` or `21`.
pub fn parse_packet_type(text: &str) -> std::result::Result<u16, ArgError> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    parsed.map_err(|_| ArgError::PacketType(text.to_string()))
}

/// Parse hex digit pairs, ignoring whitespace.
pub fn parse_hex_bytes(text: &str) -> std::result::Result<Vec<u8>, ArgError> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(ArgError::HexBytes(text.trim().to_string()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| ArgError::HexBytes(text.trim().to_string()))
        })
        .collect()
}

/// Parse a whole log. The first malformed line fails the log.
pub fn parse_log(text: &str) -> Result<Vec<IngestedPacket>> {
    let mut packets = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        packets.push(parse_line(index + 1, line)?);
    }
    debug!("Parsed {} packets", packets.len());
    Ok(packets)
}

/// Read a log file into an ingestion batch named after the path.
///
/// Unreadable or malformed files become a failed batch.
pub fn read_log(path: &Path) -> IngestBatch {
    let origin = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => return IngestBatch::failed(origin, err.to_string()),
    };
    match parse_log(&text) {
        Ok(packets) => IngestBatch::loaded(origin, packets),
        Err(err) => IngestBatch::failed(origin, err.to_string()),
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<IngestedPacket> {
    let (head, body) = line
        .split_once(':')
        .ok_or_else(|| LogError::malformed(line_no, "missing `:` before packet bytes"))?;

    let tokens: Vec<&str> = head.split_whitespace().collect();
    if !(3..=4).contains(&tokens.len()) {
        return Err(LogError::malformed(
            line_no,
            "expected `<in|out> <type> <sync> [<time-ms>]`",
        ));
    }

    let (direction, log_type) = match tokens[0].to_ascii_lowercase().as_str() {
        "in" => (Direction::Incoming, LogType::Incoming),
        "out" => (Direction::Outgoing, LogType::Outgoing),
        other => {
            return Err(LogError::malformed(
                line_no,
                format!("unknown direction `{other}`"),
            ))
        }
    };

    let packet_type =
        parse_packet_type(tokens[1]).map_err(|err| LogError::malformed(line_no, err.to_string()))?;

    let sync_id = match tokens[2] {
        "-" => None,
        sync => Some(
            sync.parse::<u16>()
                .map_err(|_| LogError::malformed(line_no, format!("invalid sync id `{sync}`")))?,
        ),
    };

    let captured_at = match tokens.get(3) {
        Some(millis) => Some(Duration::from_millis(millis.parse::<u64>().map_err(|_| {
            LogError::malformed(line_no, format!("invalid time `{millis}`"))
        })?)),
        None => None,
    };

    let raw = parse_hex_bytes(body).map_err(|err| LogError::malformed(line_no, err.to_string()))?;

    Ok(IngestedPacket {
        raw,
        direction,
        sync_id,
        packet_type,
        log_type,
        captured_at,
    })
}
