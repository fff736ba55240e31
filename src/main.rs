//! pktlens CLI entry point.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pktlens::cli::{hexlog, Args, DirectoryRuleSource, OutputFormatter};
use pktlens_core::{
    collect_matches, find_next, write_csv, CancellationToken, MemoryRuleSource, PacketStore,
    Progress, RuleCache, StoreConfig,
};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();

    if args.check_rules {
        let rules = args
            .rules
            .as_deref()
            .context("--check-rules needs a rules directory (--rules DIR)")?;
        return check_rules(rules);
    }

    let log_file = args
        .file
        .clone()
        .context("Packet log file required. Use --help for usage.")?;

    let cache = match &args.rules {
        Some(dir) => RuleCache::new(DirectoryRuleSource::new(dir)),
        None => RuleCache::new(MemoryRuleSource::new()),
    };

    let config = StoreConfig {
        pre_parse: args.pre_parse || args.export_csv.is_some(),
        ..StoreConfig::default()
    };
    let mut store = PacketStore::open(hexlog::read_log(&log_file), config)
        .with_context(|| format!("Failed to open packet log: {}", log_file.display()))?;
    store.apply_filter(args.packet_filter());

    let cancel = CancellationToken::new();
    if store.config().pre_parse {
        let progress = ProgressSink::new(args.progress, "Decoding");
        store.pre_parse(&cache, &cancel, &progress);
    }

    let formatter = OutputFormatter::new(args.format);
    let mut stdout = io::stdout().lock();

    if let Some(path) = &args.export_csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let rows = write_csv(&store, &mut writer)?;
        eprintln!("Exported {} rows to {}", rows, path.display());
        return Ok(());
    }

    if let Some(criteria) = args.search_criteria()? {
        if args.collect {
            let progress = ProgressSink::new(args.progress, "Searching");
            let found = collect_matches(&store, &criteria, &cache, &cancel, &progress);
            formatter.write_packets(&found, &mut stdout)?;
            return Ok(());
        }

        return match find_next(&store, args.from, &criteria, &cache) {
            Some(index) => {
                info!("Next match at index {}", index);
                writeln!(stdout, "Match at index {index}")?;
                show_packet(&store, &cache, index, &args, &formatter, &mut stdout)
            }
            None => {
                eprintln!("No matching packet");
                Ok(())
            }
        };
    }

    if let Some(index) = args.show {
        return show_packet(&store, &cache, index, &args, &formatter, &mut stdout);
    }

    formatter.write_packets(&store, &mut stdout)?;
    Ok(())
}

fn show_packet<W: Write>(
    store: &PacketStore,
    cache: &RuleCache,
    index: usize,
    args: &Args,
    formatter: &OutputFormatter,
    writer: &mut W,
) -> Result<()> {
    let record = store
        .get(index)
        .with_context(|| format!("No packet at index {} ({} shown)", index, store.len()))?;
    let packet = store
        .decode(index, cache, args.block.as_deref())
        .with_context(|| format!("No packet at index {index}"))?;

    if let Some(block) = &args.block {
        if !packet.available_switch_blocks.iter().any(|b| b.as_str() == block.as_str()) {
            eprintln!("Block `{block}` is not declared for this packet; decoded without it");
        }
    }
    if !args.select.is_empty() {
        record.set_selected_fields(args.select.iter().copied());
    }

    formatter.write_decoded(&record, &packet, writer)?;
    Ok(())
}

fn check_rules(dir: &Path) -> Result<()> {
    let source = DirectoryRuleSource::new(dir);
    let keys = source
        .keys()
        .with_context(|| format!("Failed to read rules directory: {}", dir.display()))?;
    let cache = RuleCache::new(source);

    for key in &keys {
        cache.rules_for(*key);
    }

    let errors = cache.errors();
    for (key, error) in &errors {
        println!("{key}: {error}");
    }
    println!("{} rule files, {} with errors", keys.len(), errors.len());
    Ok(())
}

/// Progress reporter drawing an indicatif bar, or nothing when disabled.
struct ProgressSink {
    bar: Option<ProgressBar>,
}

impl ProgressSink {
    fn new(enabled: bool, message: &'static str) -> Self {
        let bar = enabled.then(|| {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::with_template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb.set_message(message);
            pb
        });
        Self { bar }
    }
}

impl Progress for ProgressSink {
    fn report(&self, done: usize, total: usize) {
        if let Some(pb) = &self.bar {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }
    }

    fn finish(&self) {
        if let Some(pb) = &self.bar {
            pb.finish();
        }
    }
}
