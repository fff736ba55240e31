//! Test utilities for building packet records.

use std::time::Duration;

use crate::packet::{Direction, IngestedPacket, PacketRecord};
use crate::rules::LogType;

/// Builder for test packets.
///
/// The log type follows the direction, and the raw bytes default to the
/// packet type as a little-endian u16.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    packet_type: u16,
    direction: Direction,
    sync_id: Option<u16>,
    raw: Vec<u8>,
    captured_at: Option<Duration>,
}

impl PacketBuilder {
    pub fn new(direction: Direction, packet_type: u16) -> Self {
        Self {
            packet_type,
            direction,
            sync_id: None,
            raw: packet_type.to_le_bytes().to_vec(),
            captured_at: None,
        }
    }

    pub fn incoming(packet_type: u16) -> Self {
        Self::new(Direction::Incoming, packet_type)
    }

    pub fn outgoing(packet_type: u16) -> Self {
        Self::new(Direction::Outgoing, packet_type)
    }

    pub fn sync(mut self, sync_id: u16) -> Self {
        self.sync_id = Some(sync_id);
        self
    }

    pub fn raw(mut self, raw: &[u8]) -> Self {
        self.raw = raw.to_vec();
        self
    }

    pub fn captured_ms(mut self, millis: u64) -> Self {
        self.captured_at = Some(Duration::from_millis(millis));
        self
    }

    pub fn ingested(self) -> IngestedPacket {
        let log_type = match self.direction {
            Direction::Incoming => LogType::Incoming,
            Direction::Outgoing => LogType::Outgoing,
        };
        IngestedPacket {
            raw: self.raw,
            direction: self.direction,
            sync_id: self.sync_id,
            packet_type: self.packet_type,
            log_type,
            captured_at: self.captured_at,
        }
    }

    pub fn build(self) -> PacketRecord {
        PacketRecord::from(self.ingested())
    }
}
