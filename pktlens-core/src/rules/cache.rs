//! Compiled rule cache.
//!
//! Rule text is fetched from a [`RuleSource`] and compiled the first time a
//! `(packet type, log type)` key is seen. The result is kept for the lifetime
//! of the cache, including compile failures: a key whose rules fail to
//! compile falls back to a raw-only rule set and is reported once.
//!
//! The map is copy-on-write. Lookups take the read lock only long enough to
//! clone the current snapshot; inserts build a new map and swap it in.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{compile, CompiledRuleSet, RuleKey};
use crate::error::RuleSyntaxError;

/// Provides rule text for a rule key.
///
/// Implementations must be thread-safe; the cache may be shared across
/// decoding threads.
pub trait RuleSource: Send + Sync {
    /// Rule text for `key`, or None when no rules exist for it.
    fn rule_text(&self, key: RuleKey) -> Option<String>;
}

/// Rule source backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleSource {
    texts: HashMap<RuleKey, String>,
}

impl MemoryRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RuleKey, text: impl Into<String>) {
        self.texts.insert(key, text.into());
    }

    /// Builder form of [`MemoryRuleSource::insert`].
    pub fn with(mut self, key: RuleKey, text: impl Into<String>) -> Self {
        self.insert(key, text);
        self
    }
}

impl RuleSource for MemoryRuleSource {
    fn rule_text(&self, key: RuleKey) -> Option<String> {
        self.texts.get(&key).cloned()
    }
}

#[derive(Debug, Clone)]
struct CachedRules {
    rules: Arc<CompiledRuleSet>,
    error: Option<RuleSyntaxError>,
}

type Snapshot = Arc<HashMap<RuleKey, CachedRules>>;

/// Cache of compiled rule sets keyed by [`RuleKey`].
pub struct RuleCache {
    source: Box<dyn RuleSource>,
    entries: RwLock<Snapshot>,

    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl RuleCache {
    pub fn new(source: impl RuleSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entries: RwLock::new(Arc::new(HashMap::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Compiled rules for `key`, compiling on first use.
    ///
    /// Never fails: missing or broken rule text yields a raw-only rule set.
    /// Concurrent first lookups may both compile; only one result is kept.
    pub fn rules_for(&self, key: RuleKey) -> Arc<CompiledRuleSet> {
        if let Some(cached) = self.snapshot().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&cached.rules);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let entry = self.compile_entry(key);

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(&existing.rules);
        }
        if let Some(err) = &entry.error {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!("Rules for {} failed to compile, showing raw bytes: {}", key, err);
        }
        let rules = Arc::clone(&entry.rules);
        let mut next = (**entries).clone();
        next.insert(key, entry);
        *entries = Arc::new(next);
        rules
    }

    /// Compile error remembered for `key`, if its rules failed to compile.
    pub fn error_for(&self, key: RuleKey) -> Option<RuleSyntaxError> {
        self.snapshot().get(&key).and_then(|c| c.error.clone())
    }

    /// All remembered compile errors, ordered by key.
    pub fn errors(&self) -> Vec<(RuleKey, RuleSyntaxError)> {
        let mut errors: Vec<_> = self
            .snapshot()
            .iter()
            .filter_map(|(key, cached)| cached.error.clone().map(|err| (*key, err)))
            .collect();
        errors.sort_by_key(|(key, _)| *key);
        errors
    }

    /// Forget one key so its rules are fetched and compiled again.
    pub fn invalidate(&self, key: RuleKey) {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            let mut next = (**entries).clone();
            next.remove(&key);
            *entries = Arc::new(next);
        }
    }

    /// Forget every compiled rule set.
    pub fn clear(&self) {
        *self.entries.write() = Arc::new(HashMap::new());
    }

    pub fn stats(&self) -> RuleCacheStats {
        let snapshot = self.snapshot();
        RuleCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries: snapshot.len(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        self.entries.read().clone()
    }

    fn compile_entry(&self, key: RuleKey) -> CachedRules {
        let Some(text) = self.source.rule_text(key) else {
            debug!("No rules for {}", key);
            return CachedRules {
                rules: Arc::new(CompiledRuleSet::raw_only(key)),
                error: None,
            };
        };

        match compile(&text, key.packet_type, key.log_type) {
            Ok(rules) => CachedRules {
                rules: Arc::new(rules),
                error: None,
            },
            Err(err) => CachedRules {
                rules: Arc::new(CompiledRuleSet::raw_only(key)),
                error: Some(err),
            },
        }
    }
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rule cache counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to fetch and compile rule text.
    pub misses: u64,
    /// Keys whose rule text failed to compile.
    pub failures: u64,
    /// Keys currently cached.
    pub entries: usize,
}

impl RuleCacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
