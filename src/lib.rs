//! pktlens - Browse and decode client/server packet logs.
//!
//! The decoding engine lives in [`pktlens_core`]; this crate adds the pieces
//! a command-line front end needs: a text packet log reader, rule files read
//! from a directory, and table/JSON output.
//!
//! # Example
//!
//! ```no_run
//! use pktlens::cli::{hexlog, DirectoryRuleSource};
//! use pktlens_core::{PacketStore, RuleCache, StoreConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let cache = RuleCache::new(DirectoryRuleSource::new("rules"));
//!     let store = PacketStore::open(
//!         hexlog::read_log("session.log".as_ref()),
//!         StoreConfig::default(),
//!     )?;
//!     let packet = store.decode(0, &cache, None);
//!     // Render the fields...
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;

pub use error::{ArgError, LogError, Result};
