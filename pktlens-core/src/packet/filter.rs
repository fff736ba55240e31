//! Predicates deciding which loaded records appear in the active view.

use std::collections::BTreeSet;

use super::{Direction, PacketRecord};

/// Decides whether a record belongs to a store's active view.
///
/// Closures taking `&PacketRecord` implement this too.
pub trait RecordPredicate: Send + Sync {
    fn accepts(&self, record: &PacketRecord) -> bool;
}

impl<F> RecordPredicate for F
where
    F: Fn(&PacketRecord) -> bool + Send + Sync,
{
    fn accepts(&self, record: &PacketRecord) -> bool {
        self(record)
    }
}

/// Predicate that accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RecordPredicate for AcceptAll {
    fn accepts(&self, _record: &PacketRecord) -> bool {
        true
    }
}

/// How a packet-type list applies to one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Every packet of this direction passes
    #[default]
    Off,
    /// Only listed packet types pass
    ShowOnly,
    /// Listed packet types are dropped
    Hide,
    /// No packet of this direction passes
    HideAll,
}

/// Packet-type filter for one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionFilter {
    pub mode: FilterMode,
    pub packet_types: BTreeSet<u16>,
}

impl DirectionFilter {
    pub fn new(mode: FilterMode, packet_types: impl IntoIterator<Item = u16>) -> Self {
        Self {
            mode,
            packet_types: packet_types.into_iter().collect(),
        }
    }

    pub fn accepts(&self, packet_type: u16) -> bool {
        match self.mode {
            FilterMode::Off => true,
            FilterMode::ShowOnly => self.packet_types.contains(&packet_type),
            FilterMode::Hide => !self.packet_types.contains(&packet_type),
            FilterMode::HideAll => false,
        }
    }
}

/// Packet-type filter with separate settings per direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFilter {
    pub incoming: DirectionFilter,
    pub outgoing: DirectionFilter,
}

impl PacketFilter {
    /// Shows every incoming packet and no outgoing one.
    pub fn incoming_only() -> Self {
        Self {
            incoming: DirectionFilter::default(),
            outgoing: DirectionFilter::new(FilterMode::HideAll, []),
        }
    }

    /// Shows every outgoing packet and no incoming one.
    pub fn outgoing_only() -> Self {
        Self {
            incoming: DirectionFilter::new(FilterMode::HideAll, []),
            outgoing: DirectionFilter::default(),
        }
    }

    pub fn is_off(&self) -> bool {
        self.incoming.mode == FilterMode::Off && self.outgoing.mode == FilterMode::Off
    }

    fn for_direction(&self, direction: Direction) -> &DirectionFilter {
        match direction {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing => &self.outgoing,
        }
    }
}

impl RecordPredicate for PacketFilter {
    fn accepts(&self, record: &PacketRecord) -> bool {
        self.for_direction(record.direction())
            .accepts(record.packet_type())
    }
}
