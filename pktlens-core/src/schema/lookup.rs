//! Named value tables for enum-lookup fields.

use std::collections::BTreeMap;

use compact_str::CompactString;

/// Maps integer field values to display names.
///
/// Declared in rule text with `lookup;<table>;<value>;<name>` lines. A later
/// line for the same value replaces the earlier name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    name: CompactString,
    entries: BTreeMap<u64, CompactString>,
}

impl LookupTable {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry, returning the previous name.
    pub fn insert(&mut self, value: u64, name: impl Into<CompactString>) -> Option<CompactString> {
        self.entries.insert(value, name.into())
    }

    pub fn get(&self, value: u64) -> Option<&str> {
        self.entries.get(&value).map(|s| s.as_str())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_insert_and_get() {
        let mut table = LookupTable::new("zones");
        assert!(table.is_empty());

        assert_eq!(table.insert(0x0F, "Valkurm Dunes"), None);
        table.insert(0xE6, "Southern San d'Oria");

        assert_eq!(table.name(), "zones");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0x0F), Some("Valkurm Dunes"));
        assert_eq!(table.get(0x10), None);
    }

    #[test]
    fn test_lookup_replace() {
        let mut table = LookupTable::new("t");
        table.insert(1, "old");
        let previous = table.insert(1, "new");

        assert_eq!(previous.as_deref(), Some("old"));
        assert_eq!(table.get(1), Some("new"));
        assert_eq!(table.len(), 1);
    }
}
