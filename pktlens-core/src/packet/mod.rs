//! Packet records and the in-memory packet store.
//!
//! - [`PacketRecord`] - raw bytes, metadata and a lazily filled decode cache
//! - [`PacketStore`] - loaded records plus a filtered active view
//! - [`PacketFilter`] - per-direction packet type filter
//! - [`IngestBatch`] - what a log reader hands over for one source
//! - [`write_csv`] - CSV export of a pre-parsed store

mod export;
mod filter;
mod ingest;
mod record;
mod store;

pub use export::write_csv;
pub use filter::{AcceptAll, DirectionFilter, FilterMode, PacketFilter, RecordPredicate};
pub use ingest::{IngestBatch, IngestOutcome, IngestedPacket};
pub use record::{Direction, PacketRecord};
pub use store::{ActiveView, PacketStore, StoreConfig};
