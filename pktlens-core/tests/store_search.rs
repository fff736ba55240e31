//! Packet store and search integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pktlens_core::{
    collect_matches, find_next, write_csv, CancellationToken, ContentMatcher, Direction,
    DirectionFilter, FilterMode, IngestBatch, IngestedPacket, LogType, MemoryRuleSource,
    NoProgress, PacketFilter, PacketStore, RuleCache, RuleKey, SearchCriteria, StoreConfig,
};

const MOVE_RULES: &str = "\
field;x;f32
field;y;f32
field;zone;u16
";

fn ingested(direction: Direction, packet_type: u16, sync_id: u16, raw: Vec<u8>) -> IngestedPacket {
    IngestedPacket {
        raw,
        direction,
        sync_id: Some(sync_id),
        packet_type,
        log_type: match direction {
            Direction::Incoming => LogType::Incoming,
            Direction::Outgoing => LogType::Outgoing,
        },
        captured_at: Some(Duration::from_millis(u64::from(sync_id) * 10)),
    }
}

fn move_packet(sync_id: u16, zone: u16) -> IngestedPacket {
    let mut raw = Vec::new();
    raw.extend_from_slice(&1.0f32.to_le_bytes());
    raw.extend_from_slice(&2.5f32.to_le_bytes());
    raw.extend_from_slice(&zone.to_le_bytes());
    ingested(Direction::Outgoing, 0x015, sync_id, raw)
}

/// Store `[A in, B out, C in]` with sync ids 1, 2, 3.
fn three_packet_store() -> PacketStore {
    PacketStore::open(
        IngestBatch::loaded(
            "abc.log",
            vec![
                ingested(Direction::Incoming, 0x00D, 1, vec![0xA0]),
                ingested(Direction::Outgoing, 0x015, 2, vec![0xB0]),
                ingested(Direction::Incoming, 0x00D, 3, vec![0xC0]),
            ],
        ),
        StoreConfig::default(),
    )
    .unwrap()
}

fn move_cache() -> RuleCache {
    RuleCache::new(
        MemoryRuleSource::new().with(RuleKey::new(0x015, LogType::Outgoing), MOVE_RULES),
    )
}

#[test]
fn test_incoming_filter_and_find_next() {
    let mut store = three_packet_store();
    let cache = move_cache();

    store.apply_filter(PacketFilter::incoming_only());
    let active = store.active();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].raw(), &[0xA0]);
    assert_eq!(active[1].raw(), &[0xC0]);

    let next = find_next(&store, Some(0), &SearchCriteria::incoming(), &cache);
    assert_eq!(next, Some(1));
    assert_eq!(store.get(1).unwrap().raw(), &[0xC0]);
}

#[test]
fn test_selection_restored_after_refilter() {
    let mut store = three_packet_store();
    let selected_sync = store.get(1).unwrap().sync_id().unwrap();

    store.apply_filter(PacketFilter {
        incoming: DirectionFilter::new(FilterMode::Off, []),
        outgoing: DirectionFilter::new(FilterMode::Hide, [0x015]),
    });

    // Sync 2 was hidden: the next record after it is selected.
    let index = store.index_of_sync(selected_sync).unwrap();
    assert_eq!(store.get(index).unwrap().sync_id(), Some(3));
}

#[test]
fn test_virtual_time_follows_capture_time() {
    let store = three_packet_store();
    assert_eq!(
        store.virtual_times().to_vec(),
        vec![
            Duration::ZERO,
            Duration::from_millis(10),
            Duration::from_millis(20)
        ]
    );
}

#[test]
fn test_search_by_decoded_zone_and_export() {
    let cache = move_cache();
    let store = PacketStore::open(
        IngestBatch::loaded(
            "moves.log",
            vec![
                move_packet(1, 0x0F),
                move_packet(2, 0x66),
                move_packet(3, 0x0F),
                ingested(Direction::Incoming, 0x00D, 4, vec![0x0F, 0x00]),
            ],
        ),
        StoreConfig::default(),
    )
    .unwrap();

    let criteria = SearchCriteria::outgoing().with_field("zone", "0x0F");
    assert_eq!(find_next(&store, None, &criteria, &cache), Some(0));
    assert_eq!(find_next(&store, Some(0), &criteria, &cache), Some(2));

    let raw_criteria = SearchCriteria::any_direction().with_content(ContentMatcher::UInt16(0x0F));
    let raw_hits = collect_matches(
        &store,
        &raw_criteria,
        &cache,
        &CancellationToken::new(),
        &NoProgress,
    );
    assert_eq!(raw_hits.len(), 3);

    assert!(store.pre_parse(&cache, &CancellationToken::new(), &NoProgress));
    let found = collect_matches(
        &store,
        &criteria,
        &cache,
        &CancellationToken::new(),
        &NoProgress,
    );
    assert_eq!(found.len(), 2);
    assert!(found.is_pre_parsed());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matches.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    let rows = write_csv(&found, &mut file).unwrap();
    drop(file);
    assert_eq!(rows, 6);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("0,out,0x015,1,2,zone,8,2,15,false"));
    assert!(text.contains("1,out,0x015,3,0,x,0,4,1,false"));
}

#[test]
fn test_pre_parse_reports_progress() {
    let cache = move_cache();
    let packets: Vec<_> = (0..3000).map(|i| move_packet(i, 1)).collect();
    let store = PacketStore::open(IngestBatch::loaded("big.log", packets), StoreConfig::default())
        .unwrap();

    let reports = AtomicUsize::new(0);
    let progress = |_done: usize, _total: usize| {
        reports.fetch_add(1, Ordering::Relaxed);
    };
    assert!(store.pre_parse(&cache, &CancellationToken::new(), &progress));
    assert_eq!(reports.load(Ordering::Relaxed), 3);
}

#[test]
fn test_copy_from_shares_records() {
    let source = three_packet_store();
    let mut copy = PacketStore::new();
    copy.apply_filter(PacketFilter::outgoing_only());
    copy.copy_from(&source);

    assert_eq!(copy.loaded().len(), 3);
    assert_eq!(copy.len(), 1);
    assert!(Arc::ptr_eq(&copy.loaded()[0], &source.loaded()[0]));
}
