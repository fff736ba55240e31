//! Decoded fields and byte ownership.

use std::ops::Range;

use compact_str::CompactString;
use smallvec::SmallVec;

use super::FieldValue;
use crate::rules::RuleId;

/// Name of the synthetic field holding bytes no rule claimed.
pub const UNASSIGNED_FIELD: &str = "(unassigned)";

/// One decoded field of a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    /// Position in the decoded field list
    pub index: usize,
    pub name: CompactString,
    /// Offset of the first byte in the packet
    pub offset: usize,
    /// Number of bytes consumed (may be less than declared when partial)
    pub length: usize,
    /// Copy of the consumed bytes; most fields fit inline
    pub raw: SmallVec<[u8; 8]>,
    pub value: FieldValue,
    /// Rule that produced the field; None for unassigned tails
    pub source_rule: Option<RuleId>,
    /// Declared length could not be satisfied by the remaining bytes
    pub partial: bool,
}

impl FieldRecord {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }

    pub fn is_unassigned(&self) -> bool {
        self.source_rule.is_none()
    }
}

/// Maps every byte of a packet to the index of the field that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteFieldMap(Vec<Option<u32>>);

impl ByteFieldMap {
    /// Map for a packet of `len` bytes with nothing assigned yet.
    pub fn new(len: usize) -> Self {
        Self(vec![None; len])
    }

    /// Mark `range` as owned by field `index`.
    pub(crate) fn stamp(&mut self, range: Range<usize>, index: usize) {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        for slot in &mut self.0[range] {
            *slot = Some(index);
        }
    }

    /// Field owning byte `offset`, if any.
    pub fn owner(&self, offset: usize) -> Option<usize> {
        self.0.get(offset).copied().flatten().map(|i| i as usize)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bytes not owned by any field.
    pub fn unassigned_count(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_none()).count()
    }

    /// Distinct field indices owning bytes in `range`, ascending.
    pub fn fields_in_range(&self, range: Range<usize>) -> Vec<usize> {
        let end = range.end.min(self.0.len());
        let start = range.start.min(end);
        let mut fields: Vec<usize> = self.0[start..end]
            .iter()
            .filter_map(|slot| slot.map(|i| i as usize))
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    pub fn as_slice(&self) -> &[Option<u32>] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_map_stamp_and_owner() {
        let mut map = ByteFieldMap::new(6);
        assert_eq!(map.unassigned_count(), 6);

        map.stamp(0..2, 0);
        map.stamp(2..5, 1);

        assert_eq!(map.len(), 6);
        assert_eq!(map.owner(0), Some(0));
        assert_eq!(map.owner(4), Some(1));
        assert_eq!(map.owner(5), None);
        assert_eq!(map.owner(6), None);
        assert_eq!(map.unassigned_count(), 1);
    }

    #[test]
    fn test_fields_in_range() {
        let mut map = ByteFieldMap::new(8);
        map.stamp(0..2, 0);
        map.stamp(2..4, 1);
        map.stamp(4..8, 2);

        assert_eq!(map.fields_in_range(1..5), vec![0, 1, 2]);
        assert_eq!(map.fields_in_range(2..4), vec![1]);
        assert_eq!(map.fields_in_range(6..100), vec![2]);
        assert!(map.fields_in_range(10..12).is_empty());
    }

    #[test]
    fn test_field_range() {
        let field = FieldRecord {
            index: 1,
            name: "targetId".into(),
            offset: 2,
            length: 4,
            raw: SmallVec::from_slice(&[1, 2, 3, 4]),
            value: FieldValue::UInt(0x0102_0304),
            source_rule: Some(1),
            partial: false,
        };
        assert_eq!(field.range(), 2..6);
        assert!(!field.is_unassigned());
    }
}
