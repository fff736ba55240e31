//! Ingestion boundary: what log readers hand to the store.

use std::sync::Arc;
use std::time::Duration;

use super::{Direction, PacketRecord};
use crate::error::StoreError;
use crate::rules::LogType;

/// One packet as produced by a log reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedPacket {
    pub raw: Vec<u8>,
    pub direction: Direction,
    pub sync_id: Option<u16>,
    pub packet_type: u16,
    pub log_type: LogType,
    pub captured_at: Option<Duration>,
}

impl From<IngestedPacket> for PacketRecord {
    fn from(packet: IngestedPacket) -> Self {
        let mut record =
            PacketRecord::new(packet.packet_type, packet.log_type, packet.direction, packet.raw);
        if let Some(sync_id) = packet.sync_id {
            record = record.with_sync(sync_id);
        }
        if let Some(captured_at) = packet.captured_at {
            record = record.with_captured_at(captured_at);
        }
        record
    }
}

/// Result of reading one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Loaded(Vec<IngestedPacket>),
    Failed { reason: String },
}

/// Packets read from one named source (a file, a paste, a stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestBatch {
    pub origin: String,
    pub outcome: IngestOutcome,
}

impl IngestBatch {
    pub fn loaded(origin: impl Into<String>, packets: Vec<IngestedPacket>) -> Self {
        Self {
            origin: origin.into(),
            outcome: IngestOutcome::Loaded(packets),
        }
    }

    pub fn failed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            outcome: IngestOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    /// Records of a successful, non-empty batch.
    pub fn into_records(self) -> Result<Vec<Arc<PacketRecord>>, StoreError> {
        match self.outcome {
            IngestOutcome::Failed { reason } => Err(StoreError::IngestionFailure {
                origin: self.origin,
                reason,
            }),
            IngestOutcome::Loaded(packets) if packets.is_empty() => {
                Err(StoreError::NoUsefulData {
                    origin: self.origin,
                })
            }
            IngestOutcome::Loaded(packets) => Ok(packets
                .into_iter()
                .map(|packet| Arc::new(PacketRecord::from(packet)))
                .collect()),
        }
    }
}
