//! Search over a store's active view.
//!
//! [`find_next`] walks the active view circularly from a start index, the way
//! "find next" works in a packet list. [`collect_matches`] gathers every match
//! into a new store, for showing results in their own view.

mod criteria;

pub use criteria::{ContentMatcher, FieldMatcher, SearchCriteria};

use std::sync::Arc;

use tracing::info;

use crate::packet::{PacketRecord, PacketStore};
use crate::rules::RuleCache;
use crate::task::{run_steps, CancellationToken, Progress};

/// Index of the next active record matching `criteria`.
///
/// With a start index the scan begins just after it, wraps to 0 and tests
/// `len - 1` records, never the start record itself. Without one, or with a
/// start past the end of the view, it tests every record from 0.
pub fn find_next(
    store: &PacketStore,
    from: Option<usize>,
    criteria: &SearchCriteria,
    cache: &RuleCache,
) -> Option<usize> {
    if !criteria.has_direction() {
        return None;
    }
    let view = store.active();
    let len = view.len();
    if len == 0 {
        return None;
    }

    let (start, count) = match from {
        Some(index) if index < len => ((index + 1) % len, len - 1),
        _ => (0, len),
    };
    let pre_parsed = store.is_pre_parsed();

    (0..count)
        .map(|step| (start + step) % len)
        .find(|&index| record_matches(&view[index], criteria, cache, pre_parsed))
}

/// Store holding every active record that matches, in view order.
///
/// Works on a snapshot of the active view. A cancelled search returns the
/// matches found so far. The result inherits the pre-parsed flag and the
/// virtual timestamps the matches had in `store`.
pub fn collect_matches(
    store: &PacketStore,
    criteria: &SearchCriteria,
    cache: &RuleCache,
    cancel: &CancellationToken,
    progress: &dyn Progress,
) -> PacketStore {
    let view = store.active();
    let pre_parsed = store.is_pre_parsed();
    let mut matches = Vec::new();

    if criteria.has_direction() {
        run_steps(view.len(), cancel, progress, |index| {
            let record = &view[index];
            if record_matches(record, criteria, cache, pre_parsed) {
                let time = store.virtual_time(index).unwrap_or_default();
                matches.push((Arc::clone(record), time));
            }
        });
    }

    info!("Search matched {} of {} packets", matches.len(), view.len());
    let result = PacketStore::from_timed_records(matches, store.config().clone());
    result.set_pre_parsed(pre_parsed);
    result
}

fn record_matches(
    record: &PacketRecord,
    criteria: &SearchCriteria,
    cache: &RuleCache,
    pre_parsed: bool,
) -> bool {
    if !criteria.matches_raw(record) {
        return false;
    }
    if !criteria.needs_decode() {
        return true;
    }

    let rules = cache.rules_for(record.rule_key());
    let requested = record.requested_block();
    let packet = record.ensure_decoded(&rules, requested.as_deref(), pre_parsed);
    criteria.matches_decoded(&packet)
}
