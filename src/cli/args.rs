//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use pktlens_core::{ContentMatcher, DirectionFilter, FilterMode, PacketFilter, SearchCriteria};

use super::hexlog::{parse_hex_bytes, parse_packet_type};
use super::OutputFormat;
use crate::error::ArgError;

/// Which directions an option applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DirectionArg {
    /// Incoming and outgoing packets
    #[default]
    Both,
    /// Server to client packets only
    In,
    /// Client to server packets only
    Out,
}

/// Browse and decode client/server packet logs with rule files.
#[derive(Parser, Debug)]
#[command(name = "pktlens")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Packet log to open (one `<in|out> <type> <sync> [<ms>] : <hex>` per line)
    #[arg(value_name = "LOG")]
    pub file: Option<PathBuf>,

    /// Rules directory holding `in/`, `out/` and `unknown/` rule files
    #[arg(short = 'r', long = "rules", value_name = "DIR")]
    pub rules: Option<PathBuf>,

    /// Compile every rule file in the rules directory and report errors
    #[arg(long = "check-rules")]
    pub check_rules: bool,

    /// Only show packets of this direction
    #[arg(long = "direction", value_enum, default_value = "both")]
    pub direction: DirectionArg,

    /// Only show these incoming packet types (comma separated)
    #[arg(long = "show-in", value_name = "TYPES", value_delimiter = ',', value_parser = parse_packet_type)]
    pub show_in: Vec<u16>,

    /// Hide these incoming packet types (comma separated)
    #[arg(long = "hide-in", value_name = "TYPES", value_delimiter = ',', value_parser = parse_packet_type, conflicts_with = "show_in")]
    pub hide_in: Vec<u16>,

    /// Only show these outgoing packet types (comma separated)
    #[arg(long = "show-out", value_name = "TYPES", value_delimiter = ',', value_parser = parse_packet_type)]
    pub show_out: Vec<u16>,

    /// Hide these outgoing packet types (comma separated)
    #[arg(long = "hide-out", value_name = "TYPES", value_delimiter = ',', value_parser = parse_packet_type, conflicts_with = "show_out")]
    pub hide_out: Vec<u16>,

    /// Show the decoded fields and hex dump of the packet at this index
    #[arg(short = 's', long = "show", value_name = "INDEX")]
    pub show: Option<usize>,

    /// Decode the shown packet's switch under this block
    #[arg(long = "block", value_name = "NAME", requires = "show")]
    pub block: Option<String>,

    /// Highlight these field indices of the shown packet
    #[arg(long = "select", value_name = "FIELDS", value_delimiter = ',', requires = "show")]
    pub select: Vec<usize>,

    /// Search: packet type
    #[arg(long = "find-type", value_name = "TYPE", value_parser = parse_packet_type)]
    pub find_type: Option<u16>,

    /// Search: sync id
    #[arg(long = "find-sync", value_name = "SYNC")]
    pub find_sync: Option<u16>,

    /// Search: raw bytes, as hex
    #[arg(long = "find-bytes", value_name = "HEX")]
    pub find_bytes: Option<String>,

    /// Search: a byte value
    #[arg(long = "find-u8", value_name = "VALUE", conflicts_with = "find_bytes")]
    pub find_u8: Option<u8>,

    /// Search: a 16-bit little-endian value
    #[arg(long = "find-u16", value_name = "VALUE", conflicts_with_all = ["find_bytes", "find_u8"])]
    pub find_u16: Option<u16>,

    /// Search: a 32-bit little-endian value
    #[arg(long = "find-u32", value_name = "VALUE", conflicts_with_all = ["find_bytes", "find_u8", "find_u16"])]
    pub find_u32: Option<u32>,

    /// Search: a decoded field, as NAME=VALUE (empty NAME matches any field)
    #[arg(long = "find-field", value_name = "NAME=VALUE")]
    pub find_field: Option<String>,

    /// Search: directions to match
    #[arg(long = "find-direction", value_enum, default_value = "both")]
    pub find_direction: DirectionArg,

    /// Search: start after this index instead of at the first packet
    #[arg(long = "from", value_name = "INDEX")]
    pub from: Option<usize>,

    /// Search: list every match instead of the next one
    #[arg(long = "collect")]
    pub collect: bool,

    /// Output format for stdout
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write one CSV row per decoded field of every shown packet
    #[arg(long = "export-csv", value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// Decode every packet after loading
    #[arg(long = "pre-parse")]
    pub pre_parse: bool,

    /// Show a progress bar for long operations
    #[arg(long = "progress")]
    pub progress: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Filter built from `--direction` and the per-direction type lists.
    pub fn packet_filter(&self) -> PacketFilter {
        PacketFilter {
            incoming: direction_filter(
                self.direction == DirectionArg::Out,
                &self.show_in,
                &self.hide_in,
            ),
            outgoing: direction_filter(
                self.direction == DirectionArg::In,
                &self.show_out,
                &self.hide_out,
            ),
        }
    }

    /// Whether any `--find-*` option was given.
    pub fn is_search(&self) -> bool {
        self.find_type.is_some()
            || self.find_sync.is_some()
            || self.find_bytes.is_some()
            || self.find_u8.is_some()
            || self.find_u16.is_some()
            || self.find_u32.is_some()
            || self.find_field.is_some()
    }

    /// Search criteria from the `--find-*` options, if any were given.
    pub fn search_criteria(&self) -> Result<Option<SearchCriteria>, ArgError> {
        if !self.is_search() {
            return Ok(None);
        }

        let mut criteria = match self.find_direction {
            DirectionArg::Both => SearchCriteria::any_direction(),
            DirectionArg::In => SearchCriteria::incoming(),
            DirectionArg::Out => SearchCriteria::outgoing(),
        };
        if let Some(packet_type) = self.find_type {
            criteria = criteria.with_packet_type(packet_type);
        }
        if let Some(sync) = self.find_sync {
            criteria = criteria.with_sync(sync);
        }

        let content = if let Some(hex) = &self.find_bytes {
            Some(ContentMatcher::Bytes(parse_hex_bytes(hex)?))
        } else if let Some(value) = self.find_u8 {
            Some(ContentMatcher::Byte(value))
        } else if let Some(value) = self.find_u16 {
            Some(ContentMatcher::UInt16(value))
        } else {
            self.find_u32.map(ContentMatcher::UInt32)
        };
        if let Some(content) = content {
            criteria = criteria.with_content(content);
        }

        if let Some(field) = &self.find_field {
            let (name, value) = field
                .split_once('=')
                .ok_or_else(|| ArgError::FieldMatch(field.clone()))?;
            criteria = criteria.with_field(name.trim(), value.trim());
        }

        Ok(Some(criteria))
    }
}

fn direction_filter(hidden: bool, show: &[u16], hide: &[u16]) -> DirectionFilter {
    if hidden {
        DirectionFilter::new(FilterMode::HideAll, [])
    } else if !show.is_empty() {
        DirectionFilter::new(FilterMode::ShowOnly, show.iter().copied())
    } else if !hide.is_empty() {
        DirectionFilter::new(FilterMode::Hide, hide.iter().copied())
    } else {
        DirectionFilter::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pktlens").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_packet_filter() {
        let args = parse(&["log.txt", "--show-in", "0x0D,0x1A", "--hide-out", "21"]);
        let filter = args.packet_filter();
        assert_eq!(filter.incoming.mode, FilterMode::ShowOnly);
        assert!(filter.incoming.packet_types.contains(&0x1A));
        assert_eq!(filter.outgoing.mode, FilterMode::Hide);
        assert!(filter.outgoing.packet_types.contains(&0x15));

        let args = parse(&["log.txt", "--direction", "in"]);
        assert_eq!(args.packet_filter(), PacketFilter::incoming_only());
        assert!(parse(&["log.txt"]).packet_filter().is_off());
    }

    #[test]
    fn test_show_and_hide_conflict() {
        let result = Args::try_parse_from(["pktlens", "log.txt", "--show-in", "1", "--hide-in", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_criteria() {
        assert_eq!(parse(&["log.txt"]).search_criteria(), Ok(None));

        let criteria = parse(&[
            "log.txt",
            "--find-direction",
            "out",
            "--find-type",
            "0x015",
            "--find-u16",
            "15",
            "--find-field",
            "zone=0x0F",
        ])
        .search_criteria()
        .unwrap()
        .unwrap();
        assert!(!criteria.match_incoming);
        assert!(criteria.match_outgoing);
        assert_eq!(criteria.packet_type, Some(0x15));
        assert_eq!(criteria.content, Some(ContentMatcher::UInt16(15)));
        assert!(criteria.needs_decode());
    }

    #[test]
    fn test_bad_search_values() {
        assert_eq!(
            parse(&["log.txt", "--find-bytes", "0A0"]).search_criteria(),
            Err(ArgError::HexBytes("0A0".to_string()))
        );
        assert!(parse(&["log.txt", "--find-field", "zone"])
            .search_criteria()
            .is_err());
    }

    #[test]
    fn test_block_requires_show() {
        assert!(Args::try_parse_from(["pktlens", "log.txt", "--block", "Tell"]).is_err());
        let args = parse(&["log.txt", "--show", "2", "--block", "Tell", "--select", "0,3"]);
        assert_eq!(args.show, Some(2));
        assert_eq!(args.select, vec![0, 3]);
    }
}
