//! Field decoder.
//!
//! Walks a [`CompiledRuleSet`] over a packet's bytes and produces the ordered
//! field list plus a byte-to-field ownership map. Decoding never fails:
//! truncated packets yield a partial last field, and bytes no rule claims end
//! up in one [`UNASSIGNED_FIELD`].
//!
//! Switch blocks are chosen by the value of their discriminant field unless
//! the caller requests a block by name, which lets an operator re-interpret
//! the packet tail under a different case.

mod field;
mod value;

pub use field::{ByteFieldMap, FieldRecord, UNASSIGNED_FIELD};
pub use value::FieldValue;

use std::collections::HashMap;
use std::ops::Range;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::rules::{
    CompiledRuleSet, FixedField, LengthPrefixedField, Rule, RuleId, SwitchBlock, SwitchField,
};
use crate::schema::ValueKind;

/// Result of decoding one packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedPacket {
    /// Fields in rule evaluation order
    pub fields: Vec<FieldRecord>,
    /// Owner of each packet byte
    pub byte_map: ByteFieldMap,
    /// Last switch block chosen during the walk
    pub active_switch_block: Option<CompactString>,
    /// Block names of every switch reached, in declaration order
    pub available_switch_blocks: Vec<CompactString>,
}

impl DecodedPacket {
    pub fn field(&self, index: usize) -> Option<&FieldRecord> {
        self.fields.get(index)
    }

    /// First field with the given name.
    pub fn field_named(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field owning byte `offset`.
    pub fn field_at(&self, offset: usize) -> Option<&FieldRecord> {
        self.byte_map.owner(offset).and_then(|i| self.fields.get(i))
    }

    /// Indices of the fields covering any byte of `range`.
    pub fn fields_in_range(&self, range: Range<usize>) -> Vec<usize> {
        self.byte_map.fields_in_range(range)
    }

    /// Whether any field was cut short by the end of the packet.
    pub fn is_truncated(&self) -> bool {
        self.fields.iter().any(|f| f.partial)
    }
}

/// Decode `data` with `rules`.
///
/// `requested_block` names a switch block to force; it only affects the
/// switch that declares a block of that name.
pub fn decode(
    rules: &CompiledRuleSet,
    data: &[u8],
    requested_block: Option<&str>,
) -> DecodedPacket {
    let mut walker = Walker {
        rules,
        data,
        requested: requested_block,
        cursor: 0,
        fields: Vec::new(),
        known: HashMap::new(),
        active: None,
        available: Vec::new(),
    };

    walker.walk(rules.rules());
    walker.tail();

    let mut byte_map = ByteFieldMap::new(data.len());
    for field in &walker.fields {
        byte_map.stamp(field.range(), field.index);
    }

    DecodedPacket {
        fields: walker.fields,
        byte_map,
        active_switch_block: walker.active,
        available_switch_blocks: walker.available,
    }
}

enum Flow {
    Continue,
    Halt,
}

struct Walker<'a> {
    rules: &'a CompiledRuleSet,
    data: &'a [u8],
    requested: Option<&'a str>,
    cursor: usize,
    fields: Vec<FieldRecord>,
    /// Field name -> index of its latest visible declaration
    known: HashMap<&'a str, usize>,
    active: Option<CompactString>,
    available: Vec<CompactString>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, rules: &'a [Rule]) -> Flow {
        for rule in rules {
            let flow = match rule {
                Rule::Fixed(field) => self.fixed(field),
                Rule::LengthPrefixed(field) => self.length_prefixed(field),
                Rule::Switch(switch) => self.switch(switch),
                Rule::RawTail => {
                    self.tail();
                    Flow::Halt
                }
            };
            if let Flow::Halt = flow {
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn fixed(&mut self, field: &'a FixedField) -> Flow {
        if self.remaining() == 0 {
            return Flow::Halt;
        }
        self.consume(
            field.id,
            &field.name,
            field.kind,
            field.lookup.as_deref(),
            field.length,
        )
    }

    fn length_prefixed(&mut self, field: &'a LengthPrefixedField) -> Flow {
        if self.remaining() == 0 {
            return Flow::Halt;
        }
        let Some(length) = self.numeric(&field.length_ref, FieldValue::as_u64) else {
            self.tail();
            return Flow::Halt;
        };
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        self.consume(field.id, &field.name, field.kind, None, length)
    }

    fn switch(&mut self, switch: &'a SwitchField) -> Flow {
        self.available
            .extend(switch.block_names().map(CompactString::from));

        let requested = self.requested.and_then(|name| switch.block_named(name));
        let block = match requested {
            Some(block) => Some(block),
            None => self
                .numeric(&switch.discriminant, FieldValue::as_match_value)
                .and_then(|value| switch.case_for(value)),
        };

        match block {
            Some(block) => self.enter(block),
            None => {
                self.tail();
                Flow::Halt
            }
        }
    }

    fn enter(&mut self, block: &'a SwitchBlock) -> Flow {
        self.active = Some(block.name.clone());
        let outer = self.known.clone();
        let flow = self.walk(&block.rules);
        self.known = outer;
        flow
    }

    /// Consume up to `declared` bytes as one field. Halts when clamped.
    fn consume(
        &mut self,
        id: RuleId,
        name: &'a str,
        kind: ValueKind,
        lookup: Option<&str>,
        declared: usize,
    ) -> Flow {
        let length = declared.min(self.remaining());
        let partial = length < declared;
        let bytes = &self.data[self.cursor..self.cursor + length];

        let value = if partial {
            FieldValue::Bytes(bytes.to_vec())
        } else {
            self.value(kind, lookup, bytes)
        };

        self.known.insert(name, self.fields.len());
        self.emit(name, Some(id), length, value, partial);

        if partial {
            Flow::Halt
        } else {
            Flow::Continue
        }
    }

    fn value(&self, kind: ValueKind, lookup: Option<&str>, bytes: &[u8]) -> FieldValue {
        let value = FieldValue::read(kind, bytes);
        match (lookup, value.as_match_value()) {
            (Some(table), Some(raw)) => FieldValue::Enum {
                value: raw,
                name: self
                    .rules
                    .lookup(table)
                    .and_then(|t| t.get(raw))
                    .map(CompactString::from),
            },
            _ => value,
        }
    }

    /// Numeric value of a visible field, via `extract`.
    fn numeric(&self, name: &str, extract: fn(&FieldValue) -> Option<u64>) -> Option<u64> {
        let index = *self.known.get(name)?;
        let field = &self.fields[index];
        if field.partial {
            return None;
        }
        extract(&field.value)
    }

    /// Claim every remaining byte as unassigned.
    fn tail(&mut self) {
        let length = self.remaining();
        if length > 0 {
            let bytes = self.data[self.cursor..].to_vec();
            self.emit(UNASSIGNED_FIELD, None, length, FieldValue::Bytes(bytes), false);
        }
    }

    fn emit(
        &mut self,
        name: &str,
        source_rule: Option<RuleId>,
        length: usize,
        value: FieldValue,
        partial: bool,
    ) {
        let offset = self.cursor;
        self.fields.push(FieldRecord {
            index: self.fields.len(),
            name: name.into(),
            offset,
            length,
            raw: SmallVec::from_slice(&self.data[offset..offset + length]),
            value,
            source_rule,
            partial,
        });
        self.cursor += length;
    }
}
