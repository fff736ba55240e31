//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Reading text packet logs
//! - Loading rule files from a rules directory
//! - Output formatting (table, JSON, hex dump)

mod args;
pub mod hexlog;
mod output;
mod rules_dir;

pub use args::{Args, DirectionArg};
pub use output::{hex_dump, OutputFormat, OutputFormatter, HEX_ROW};
pub use rules_dir::DirectoryRuleSource;
