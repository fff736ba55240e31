//! # pktlens-core
//!
//! Rule-driven packet field decoding and an in-memory packet store.
//!
//! This crate holds the engine of pktlens, without any file format or UI
//! dependencies. Log readers hand packets over as [`IngestBatch`]es, rule text
//! comes from a [`RuleSource`], and everything else happens in memory.
//!
//! ## Features
//!
//! - **Rule Compiler**: `;`-delimited rule text compiled into an immutable
//!   rule tree, with switch blocks keyed on earlier fields and lookup tables
//! - **Field Decoder**: ordered field list plus an exact byte-to-field map;
//!   truncated packets decode to a partial last field instead of failing
//! - **Switch Re-selection**: decode a packet tail under any block the switch
//!   declares
//! - **Packet Store**: loaded records with a filtered, snapshot-published
//!   active view, virtual timestamps and CSV export
//! - **Search**: circular find-next and match collection over raw bytes,
//!   metadata or decoded field values
//!
//! ## Quick Start
//!
//! ```rust
//! use pktlens_core::prelude::*;
//!
//! let key = RuleKey::new(0x015, LogType::Incoming);
//! let rules = MemoryRuleSource::new().with(
//!     key,
//!     "field;opcode;u16\nswitch;opcode\ncase;0x0A\nfield;targetId;u32be\nendswitch;\n",
//! );
//! let cache = RuleCache::new(rules);
//!
//! let store = PacketStore::open(
//!     IngestBatch::loaded(
//!         "session.log",
//!         vec![IngestedPacket {
//!             raw: vec![0x0A, 0x00, 0x01, 0x02, 0x03, 0x04],
//!             direction: Direction::Incoming,
//!             sync_id: Some(1),
//!             packet_type: 0x015,
//!             log_type: LogType::Incoming,
//!             captured_at: None,
//!         }],
//!     ),
//!     StoreConfig::default(),
//! )
//! .unwrap();
//!
//! let packet = store.decode(0, &cache, None).unwrap();
//! assert_eq!(packet.fields[1].name, "targetId");
//! assert_eq!(packet.fields[1].value, FieldValue::UInt(0x0102_0304));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        pktlens-core                                 |
//! +---------------------------------------------------------------------+
//! |  schema/     - ValueKind, LookupTable                               |
//! |  rules/      - Rule tree, compiler, RuleCache, RuleSource           |
//! |  decode/     - FieldDecoder, FieldRecord, ByteFieldMap, FieldValue  |
//! |  packet/     - PacketRecord, PacketStore, filters, ingest, CSV      |
//! |  search/     - SearchCriteria, find_next, collect_matches           |
//! |  task        - CancellationToken, Progress                          |
//! |  error/      - Error types                                          |
//! +---------------------------------------------------------------------+
//! ```

pub mod decode;
pub mod error;
pub mod packet;
pub mod prelude;
pub mod rules;
pub mod schema;
pub mod search;
pub mod task;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at crate root for convenience
pub use decode::{decode, ByteFieldMap, DecodedPacket, FieldRecord, FieldValue, UNASSIGNED_FIELD};
pub use error::{Error, Result, RuleSyntaxError, StoreError};
pub use packet::{
    write_csv, AcceptAll, ActiveView, Direction, DirectionFilter, FilterMode, IngestBatch,
    IngestOutcome, IngestedPacket, PacketFilter, PacketRecord, PacketStore, RecordPredicate,
    StoreConfig,
};
pub use rules::{
    compile, CompiledRuleSet, LogType, MemoryRuleSource, Rule, RuleCache, RuleCacheStats, RuleId,
    RuleKey, RuleSource,
};
pub use schema::{Endian, LookupTable, ValueKind};
pub use search::{collect_matches, find_next, ContentMatcher, FieldMatcher, SearchCriteria};
pub use task::{CancellationToken, NoProgress, Progress};
