//! Convenient re-exports for common usage.
//!
//! This module provides a curated set of the most commonly used types
//! from pktlens-core, allowing you to import them with a single `use` statement.
//!
//! # Example
//!
//! ```rust
//! use pktlens_core::prelude::*;
//!
//! let rules = compile("field;opcode;u16\n", 0x015, LogType::Incoming).unwrap();
//! let packet = decode(&rules, &[0x0A, 0x00], None);
//! assert_eq!(packet.fields[0].value, FieldValue::UInt(10));
//! ```

// Rule types
pub use crate::rules::{
    compile, CompiledRuleSet, LogType, MemoryRuleSource, RuleCache, RuleKey, RuleSource,
};

// Decoding types
pub use crate::decode::{decode, DecodedPacket, FieldRecord, FieldValue};

// Store types
pub use crate::packet::{
    Direction, IngestBatch, IngestedPacket, PacketFilter, PacketRecord, PacketStore, StoreConfig,
};

// Search types
pub use crate::search::{collect_matches, find_next, SearchCriteria};

// Long-running operation helpers
pub use crate::task::{CancellationToken, NoProgress, Progress};

// Error types
pub use crate::error::{Error, Result};
