//! A captured packet and its lazily decoded view.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use parking_lot::RwLock;

use crate::decode::{decode, DecodedPacket};
use crate::rules::{CompiledRuleSet, LogType, RuleKey};

/// Which way a packet travelled, seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "in",
            Direction::Outgoing => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct DecodeCache {
    rules: Arc<CompiledRuleSet>,
    /// Block requested when this decode was made
    requested: Option<CompactString>,
    packet: Arc<DecodedPacket>,
}

/// One packet: immutable bytes and metadata plus a decode cache.
///
/// Records are shared as `Arc<PacketRecord>` between the loaded set, active
/// views and search results. The decode cache and field selection sit behind
/// locks that are only held to read or swap a value; decoding itself runs
/// outside them.
#[derive(Debug)]
pub struct PacketRecord {
    packet_type: u16,
    log_type: LogType,
    direction: Direction,
    sync_id: Option<u16>,
    raw: Arc<[u8]>,
    captured_at: Option<Duration>,
    decoded: RwLock<Option<DecodeCache>>,
    selected: RwLock<BTreeSet<usize>>,
}

impl PacketRecord {
    pub fn new(
        packet_type: u16,
        log_type: LogType,
        direction: Direction,
        raw: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            packet_type,
            log_type,
            direction,
            sync_id: None,
            raw: raw.into(),
            captured_at: None,
            decoded: RwLock::new(None),
            selected: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn with_sync(mut self, sync_id: u16) -> Self {
        self.sync_id = Some(sync_id);
        self
    }

    /// Set the capture time, as an offset from any fixed epoch.
    pub fn with_captured_at(mut self, captured_at: Duration) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn packet_type(&self) -> u16 {
        self.packet_type
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn sync_id(&self) -> Option<u16> {
        self.sync_id
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn captured_at(&self) -> Option<Duration> {
        self.captured_at
    }

    /// Key of the rule set that decodes this packet.
    pub fn rule_key(&self) -> RuleKey {
        RuleKey::new(self.packet_type, self.log_type)
    }

    /// Whether the raw bytes contain `needle`. An empty needle always matches.
    pub fn contains_bytes(&self, needle: &[u8]) -> bool {
        needle.is_empty() || self.raw.windows(needle.len()).any(|w| w == needle)
    }

    /// Decoded view of this packet, decoding when the cache is stale.
    ///
    /// The cache is reused when it was made for the same requested block and,
    /// unless `pre_parsed` is set, by the same rule set instance. A new decode
    /// is built completely before it replaces the cached one, and the field
    /// selection is trimmed to the new field count.
    pub fn ensure_decoded(
        &self,
        rules: &Arc<CompiledRuleSet>,
        requested_block: Option<&str>,
        pre_parsed: bool,
    ) -> Arc<DecodedPacket> {
        if let Some(cached) = self.decoded.read().as_ref() {
            let same_block = cached.requested.as_deref() == requested_block;
            let same_rules = pre_parsed || Arc::ptr_eq(&cached.rules, rules);
            if same_block && same_rules {
                return Arc::clone(&cached.packet);
            }
        }

        self.redecode(rules, requested_block)
    }

    /// Decode unconditionally and replace the cache.
    ///
    /// The selection is trimmed while both locks are held, so no reader sees
    /// the new decode with indices it does not have.
    pub fn redecode(
        &self,
        rules: &Arc<CompiledRuleSet>,
        requested_block: Option<&str>,
    ) -> Arc<DecodedPacket> {
        let packet = Arc::new(decode(rules, &self.raw, requested_block));
        let field_count = packet.fields.len();

        let mut selected = self.selected.write();
        let mut decoded = self.decoded.write();
        selected.retain(|&index| index < field_count);
        *decoded = Some(DecodeCache {
            rules: Arc::clone(rules),
            requested: requested_block.map(CompactString::from),
            packet: Arc::clone(&packet),
        });
        packet
    }

    /// Cached decode, if any.
    pub fn decoded(&self) -> Option<Arc<DecodedPacket>> {
        self.decoded
            .read()
            .as_ref()
            .map(|cached| Arc::clone(&cached.packet))
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.read().is_some()
    }

    /// Block requested for the cached decode.
    pub fn requested_block(&self) -> Option<CompactString> {
        self.decoded
            .read()
            .as_ref()
            .and_then(|cached| cached.requested.clone())
    }

    pub fn clear_decoded(&self) {
        *self.decoded.write() = None;
    }

    /// Cached decode and the selection made on it, read together.
    pub fn decoded_with_selection(&self) -> (Option<Arc<DecodedPacket>>, Vec<usize>) {
        let selected = self.selected.read();
        let packet = self.decoded();
        (packet, selected.iter().copied().collect())
    }

    /// Selected field indices, ascending.
    pub fn selected_fields(&self) -> Vec<usize> {
        self.selected.read().iter().copied().collect()
    }

    /// Replace the field selection. Indices past the decoded field list are
    /// ignored.
    pub fn set_selected_fields(&self, indices: impl IntoIterator<Item = usize>) {
        let mut selected = self.selected.write();
        let limit = self.decoded().map(|packet| packet.fields.len());
        *selected = indices
            .into_iter()
            .filter(|&index| limit.map_or(true, |limit| index < limit))
            .collect();
    }

    /// Select the fields owning any byte of `range` in the cached decode.
    ///
    /// Returns the new selection; empty when the packet is not decoded.
    pub fn select_bytes(&self, range: Range<usize>) -> Vec<usize> {
        let mut selected = self.selected.write();
        let fields = self
            .decoded()
            .map(|packet| packet.fields_in_range(range))
            .unwrap_or_default();
        *selected = fields.iter().copied().collect();
        fields
    }

    pub fn clear_selection(&self) {
        self.selected.write().clear();
    }
}
