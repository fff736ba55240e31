//! Ordered packet collection with a filtered active view.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{AcceptAll, IngestBatch, IngestedPacket, PacketRecord, RecordPredicate};
use crate::decode::DecodedPacket;
use crate::error::StoreError;
use crate::rules::RuleCache;
use crate::task::{run_steps, CancellationToken, Progress};

/// Immutable snapshot of a store's active records.
pub type ActiveView = Arc<[Arc<PacketRecord>]>;

/// Configuration for a [`PacketStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Decode every record as soon as the store is loaded
    pub pre_parse: bool,
    /// Gap between virtual timestamps when capture times are unusable
    pub virtual_spacing: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pre_parse: false,
            virtual_spacing: Duration::from_millis(100),
        }
    }
}

/// Loaded records plus the subset currently shown.
///
/// `loaded` only grows through ingestion. `active` is the order-preserving
/// subsequence of `loaded` accepted by the current predicate; it is rebuilt in
/// full and then swapped in, so readers holding an [`ActiveView`] never see a
/// half-built list.
///
/// Virtual timestamps belong to the store, not to the records, since one
/// record can sit in several stores with different timelines.
pub struct PacketStore {
    config: StoreConfig,
    loaded: Vec<Arc<PacketRecord>>,
    /// Parallel to `loaded`
    virtual_times: Vec<Duration>,
    active: ActiveView,
    /// Position in `loaded` of each active record
    active_positions: Arc<[usize]>,
    filter: Arc<dyn RecordPredicate>,
    pre_parsed: AtomicBool,
}

impl PacketStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            loaded: Vec::new(),
            virtual_times: Vec::new(),
            active: Arc::from(Vec::new()),
            active_positions: Arc::from(Vec::new()),
            filter: Arc::new(AcceptAll),
            pre_parsed: AtomicBool::new(false),
        }
    }

    /// Store holding exactly `records`, all active.
    pub fn from_records(records: Vec<Arc<PacketRecord>>, config: StoreConfig) -> Self {
        let mut store = Self::with_config(config);
        store.ingest_append(records);
        store.refilter();
        store
    }

    /// Create a store from one ingested source.
    ///
    /// Fails when the source could not be read or held no packets; no empty
    /// store is returned in either case.
    pub fn open(batch: IngestBatch, config: StoreConfig) -> Result<Self, StoreError> {
        let origin = batch.origin.clone();
        let records = batch.into_records()?;

        let mut store = Self::with_config(config);
        store.ingest_append(records);
        store.build_virtual_timestamps();
        store.refilter();
        info!("Opened {}: {} packets", origin, store.loaded.len());
        Ok(store)
    }

    /// Append another source to this store.
    ///
    /// On failure the store is left unchanged.
    pub fn append_batch(&mut self, batch: IngestBatch) -> Result<usize, StoreError> {
        let origin = batch.origin.clone();
        let records = batch.into_records()?;
        let count = records.len();

        self.ingest_append(records);
        self.build_virtual_timestamps();
        self.refilter();
        info!("Appended {}: {} packets", origin, count);
        Ok(count)
    }

    /// Store holding `records` with the virtual timestamps they had
    /// elsewhere, all active.
    pub(crate) fn from_timed_records(
        records: Vec<(Arc<PacketRecord>, Duration)>,
        config: StoreConfig,
    ) -> Self {
        let mut store = Self::with_config(config);
        let (records, times): (Vec<_>, Vec<_>) = records.into_iter().unzip();
        store.ingest_append(records);
        store.virtual_times = times;
        store.refilter();
        store
    }

    /// Append records to `loaded`. The active view is left as it is.
    ///
    /// New records get a zero virtual timestamp until
    /// [`build_virtual_timestamps`](Self::build_virtual_timestamps) runs.
    pub fn ingest_append(&mut self, records: impl IntoIterator<Item = Arc<PacketRecord>>) {
        let before = self.loaded.len();
        self.loaded.extend(records);
        self.virtual_times.resize(self.loaded.len(), Duration::ZERO);
        if self.loaded.len() != before {
            self.set_pre_parsed(false);
        }
    }

    /// Convert and append ingested packets, stopping early when cancelled.
    ///
    /// Returns how many packets were appended. The active view is left as it
    /// is.
    pub fn ingest_packets(
        &mut self,
        packets: Vec<IngestedPacket>,
        cancel: &CancellationToken,
        progress: &dyn Progress,
    ) -> usize {
        let total = packets.len();
        let mut pending = packets.into_iter();
        let mut records = Vec::with_capacity(total);

        let done = run_steps(total, cancel, progress, |_| {
            if let Some(packet) = pending.next() {
                records.push(Arc::new(PacketRecord::from(packet)));
            }
        });

        self.ingest_append(records);
        if done < total {
            info!("Ingestion cancelled after {} of {} packets", done, total);
        }
        done
    }

    /// Set the predicate and rebuild the active view.
    pub fn apply_filter(&mut self, predicate: impl RecordPredicate + 'static) {
        self.filter = Arc::new(predicate);
        self.refilter();
    }

    /// Show every loaded record.
    pub fn clear_filter(&mut self) {
        self.apply_filter(AcceptAll);
    }

    /// Rebuild the active view with the current predicate.
    pub fn refilter(&mut self) {
        let (positions, active): (Vec<usize>, Vec<Arc<PacketRecord>>) = self
            .loaded
            .iter()
            .enumerate()
            .filter(|(_, record)| self.filter.accepts(record))
            .map(|(position, record)| (position, Arc::clone(record)))
            .unzip();
        debug!("Active view: {} of {} packets", active.len(), self.loaded.len());
        self.active = Arc::from(active);
        self.active_positions = Arc::from(positions);
    }

    /// Assign every loaded record a non-decreasing virtual timestamp.
    ///
    /// Capture times are used (as offsets from the first) when every record
    /// has one and they never go backwards; otherwise records are spaced
    /// evenly by `virtual_spacing`.
    pub fn build_virtual_timestamps(&mut self) {
        let captured: Option<Vec<Duration>> =
            self.loaded.iter().map(|record| record.captured_at()).collect();

        self.virtual_times = match captured {
            Some(times) if times.windows(2).all(|pair| pair[0] <= pair[1]) => {
                let first = times.first().copied().unwrap_or_default();
                times.into_iter().map(|time| time - first).collect()
            }
            _ => {
                let spacing = self.config.virtual_spacing;
                (0..self.loaded.len())
                    .map(|index| {
                        let factor = u32::try_from(index).unwrap_or(u32::MAX);
                        spacing.saturating_mul(factor)
                    })
                    .collect()
            }
        };
    }

    /// Virtual timestamps of the loaded records, in loaded order.
    pub fn virtual_times(&self) -> &[Duration] {
        &self.virtual_times
    }

    /// Virtual timestamp of the active record at `index`.
    pub fn virtual_time(&self, index: usize) -> Option<Duration> {
        let position = *self.active_positions.get(index)?;
        self.virtual_times.get(position).copied()
    }

    /// Replace `loaded` with the records of `other` and rebuild the active
    /// view with this store's predicate.
    pub fn copy_from(&mut self, other: &PacketStore) {
        self.loaded = other.loaded.clone();
        self.virtual_times = other.virtual_times.clone();
        self.set_pre_parsed(other.is_pre_parsed());
        self.refilter();
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.loaded.clear();
        self.virtual_times.clear();
        self.active = Arc::from(Vec::new());
        self.active_positions = Arc::from(Vec::new());
        self.set_pre_parsed(false);
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn loaded(&self) -> &[Arc<PacketRecord>] {
        &self.loaded
    }

    pub fn active(&self) -> ActiveView {
        Arc::clone(&self.active)
    }

    /// Number of active records.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active record at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<PacketRecord>> {
        self.active.get(index).cloned()
    }

    pub fn is_pre_parsed(&self) -> bool {
        self.pre_parsed.load(Ordering::Relaxed)
    }

    pub(crate) fn set_pre_parsed(&self, pre_parsed: bool) {
        self.pre_parsed.store(pre_parsed, Ordering::Relaxed);
    }

    /// Active index to select for a sync id after the view changed.
    ///
    /// Prefers the record with that sync id, then the first record after it
    /// with a larger one, then the last record carrying any sync id.
    pub fn index_of_sync(&self, sync_id: u16) -> Option<usize> {
        let mut later = None;
        let mut last = None;
        for (index, record) in self.active.iter().enumerate() {
            match record.sync_id() {
                Some(sync) if sync == sync_id => return Some(index),
                Some(sync) => {
                    if sync > sync_id && later.is_none() {
                        later = Some(index);
                    }
                    last = Some(index);
                }
                None => {}
            }
        }
        later.or(last)
    }

    /// Decode the active record at `index`.
    pub fn decode(
        &self,
        index: usize,
        cache: &RuleCache,
        requested_block: Option<&str>,
    ) -> Option<Arc<DecodedPacket>> {
        let record = self.get(index)?;
        let rules = cache.rules_for(record.rule_key());
        Some(record.ensure_decoded(&rules, requested_block, self.is_pre_parsed()))
    }

    /// Decode every loaded record.
    ///
    /// Works on a snapshot of `loaded`. Marks the store pre-parsed and returns
    /// true only when every record was decoded; cancelling leaves the
    /// decoded records cached and the flag unset.
    pub fn pre_parse(
        &self,
        cache: &RuleCache,
        cancel: &CancellationToken,
        progress: &dyn Progress,
    ) -> bool {
        let snapshot = self.loaded.clone();
        let total = snapshot.len();

        let done = run_steps(total, cancel, progress, |index| {
            let record = &snapshot[index];
            let rules = cache.rules_for(record.rule_key());
            let requested = record.requested_block();
            record.ensure_decoded(&rules, requested.as_deref(), false);
        });

        if done < total {
            info!("Pre-parse cancelled after {} of {} packets", done, total);
            return false;
        }
        self.set_pre_parsed(true);
        info!("Pre-parsed {} packets", total);
        true
    }
}

impl Default for PacketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PacketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketStore")
            .field("config", &self.config)
            .field("loaded", &self.loaded.len())
            .field("active", &self.active.len())
            .field("pre_parsed", &self.is_pre_parsed())
            .finish()
    }
}
