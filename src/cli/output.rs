//! Output formatting for packet lists and decoded packets.
//!
//! Tables go through `comfy_table`; JSON output is one object per line.

use std::io::{self, Write};

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::{json, Value};

use pktlens_core::{ByteFieldMap, DecodedPacket, FieldValue, PacketRecord, PacketStore};

/// Bytes per hex dump row.
pub const HEX_ROW: usize = 16;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    Table,
    /// JSON Lines (one JSON object per packet)
    Json,
}

/// Writes packet lists and decoded packets.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// List the store's active packets.
    pub fn write_packets<W: Write>(&self, store: &PacketStore, writer: &mut W) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_packet_table(store, writer),
            OutputFormat::Json => self.write_packet_json(store, writer),
        }
    }

    /// Decoded fields of one packet, plus a hex dump in table mode.
    pub fn write_decoded<W: Write>(
        &self,
        record: &PacketRecord,
        packet: &DecodedPacket,
        writer: &mut W,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_decoded_table(record, packet, writer),
            OutputFormat::Json => self.write_decoded_json(record, packet, writer),
        }
    }

    fn write_packet_table<W: Write>(&self, store: &PacketStore, writer: &mut W) -> io::Result<()> {
        let mut table = Table::new();
        table.set_header(vec!["#", "Dir", "Type", "Sync", "Time (ms)", "Len", "Bytes"]);

        for (index, record) in store.active().iter().enumerate() {
            table.add_row(vec![
                Cell::new(index),
                Cell::new(record.direction()),
                Cell::new(format!("0x{:03X}", record.packet_type())),
                Cell::new(sync_text(record)),
                Cell::new(time_ms(store, index)),
                Cell::new(record.len()),
                Cell::new(preview(record.raw())),
            ]);
        }

        writeln!(writer, "{table}")
    }

    fn write_packet_json<W: Write>(&self, store: &PacketStore, writer: &mut W) -> io::Result<()> {
        for (index, record) in store.active().iter().enumerate() {
            let obj = json!({
                "index": index,
                "direction": record.direction().as_str(),
                "packet_type": format!("0x{:03X}", record.packet_type()),
                "sync": record.sync_id(),
                "time_ms": time_ms(store, index),
                "length": record.len(),
                "raw": hex_string(record.raw()),
            });
            writeln!(writer, "{obj}")?;
        }
        Ok(())
    }

    fn write_decoded_table<W: Write>(
        &self,
        record: &PacketRecord,
        packet: &DecodedPacket,
        writer: &mut W,
    ) -> io::Result<()> {
        writeln!(
            writer,
            "Packet 0x{:03X} ({}), sync {}, {} bytes",
            record.packet_type(),
            record.direction(),
            sync_text(record),
            record.len()
        )?;
        if !packet.available_switch_blocks.is_empty() {
            let available: Vec<&str> = packet
                .available_switch_blocks
                .iter()
                .map(|b| b.as_str())
                .collect();
            writeln!(
                writer,
                "Block: {} (available: {})",
                packet.active_switch_block.as_deref().unwrap_or("-"),
                available.join(", ")
            )?;
        }

        let selected = record.selected_fields();
        let mut table = Table::new();
        table.set_header(vec!["", "#", "Field", "Offset", "Length", "Value"]);
        for field in &packet.fields {
            let mark = if selected.contains(&field.index) { "*" } else { "" };
            let value = if field.partial {
                format!("{} (partial)", field.value)
            } else {
                field.value.to_string()
            };
            table.add_row(vec![
                Cell::new(mark),
                Cell::new(field.index),
                Cell::new(&field.name),
                Cell::new(field.offset),
                Cell::new(field.length),
                Cell::new(value),
            ]);
        }
        writeln!(writer, "{table}")?;

        for line in hex_dump(record.raw(), &packet.byte_map) {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    fn write_decoded_json<W: Write>(
        &self,
        record: &PacketRecord,
        packet: &DecodedPacket,
        writer: &mut W,
    ) -> io::Result<()> {
        let selected = record.selected_fields();
        let fields: Vec<Value> = packet
            .fields
            .iter()
            .map(|field| {
                json!({
                    "index": field.index,
                    "name": field.name.as_str(),
                    "offset": field.offset,
                    "length": field.length,
                    "value": value_json(&field.value),
                    "partial": field.partial,
                    "selected": selected.contains(&field.index),
                })
            })
            .collect();

        let obj = json!({
            "direction": record.direction().as_str(),
            "packet_type": format!("0x{:03X}", record.packet_type()),
            "sync": record.sync_id(),
            "length": record.len(),
            "active_block": packet.active_switch_block.as_deref(),
            "available_blocks": packet
                .available_switch_blocks
                .iter()
                .map(|b| b.as_str())
                .collect::<Vec<_>>(),
            "fields": fields,
        });
        writeln!(writer, "{obj}")
    }
}

/// Hex dump rows annotated with the index of the field owning each byte.
///
/// Unowned bytes show `.` in the owner column.
pub fn hex_dump(data: &[u8], byte_map: &ByteFieldMap) -> Vec<String> {
    data.chunks(HEX_ROW)
        .enumerate()
        .map(|(row, bytes)| {
            let start = row * HEX_ROW;
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
            let owners: Vec<String> = (start..start + bytes.len())
                .map(|offset| match byte_map.owner(offset) {
                    Some(index) => format!("{index:>2}"),
                    None => " .".to_string(),
                })
                .collect();
            format!(
                "{:04X}  {:<width$}  | {}",
                start,
                hex.join(" "),
                owners.join(" "),
                width = HEX_ROW * 3 - 1
            )
        })
        .collect()
}

fn value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::UInt(v) => json!(v),
        FieldValue::Int(v) => json!(v),
        FieldValue::Float(v) => json!(v),
        FieldValue::Str(s) => json!(s.as_str()),
        FieldValue::Enum { value, name } => json!({
            "value": value,
            "name": name.as_deref(),
        }),
        FieldValue::Bytes(bytes) => json!(hex_string(bytes)),
    }
}

fn sync_text(record: &PacketRecord) -> String {
    record
        .sync_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn time_ms(store: &PacketStore, index: usize) -> u64 {
    let time = store.virtual_time(index).unwrap_or_default();
    u64::try_from(time.as_millis()).unwrap_or(u64::MAX)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(bytes: &[u8]) -> String {
    if bytes.len() > HEX_ROW {
        format!("{} ...", hex_string(&bytes[..HEX_ROW]))
    } else {
        hex_string(bytes)
    }
}
