//! Declarative field rules and their compiler.
//!
//! A rule set describes how the bytes of one packet type map to named
//! fields. Rule text is compiled once per `(packet type, log type)` key into a
//! [`CompiledRuleSet`], which is immutable and shared across every packet of
//! that type through [`RuleCache`].
//!
//! ```rust
//! use pktlens_core::rules::{compile, LogType, Rule};
//!
//! let text = "\
//! field;opcode;u16
//! switch;opcode
//! case;0x0A
//! field;targetId;u32be
//! endswitch;
//! ";
//! let rules = compile(text, 0x015, LogType::Incoming).unwrap();
//! assert!(matches!(rules.rules()[1], Rule::Switch(_)));
//! ```

mod cache;
mod parser;

use std::collections::HashMap;
use std::fmt;

use compact_str::CompactString;

use crate::schema::{LookupTable, ValueKind};

pub use cache::{MemoryRuleSource, RuleCache, RuleCacheStats, RuleSource};
pub use parser::compile;
pub(crate) use parser::parse_number;

/// Stable identifier of a field rule within one compiled rule set.
///
/// Ids are assigned in declaration order starting at 0, so compiling the
/// same text twice yields the same ids.
pub type RuleId = u32;

/// Which side of the conversation a log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LogType {
    #[default]
    Unknown,
    Incoming,
    Outgoing,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Unknown => "unknown",
            LogType::Incoming => "in",
            LogType::Outgoing => "out",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key a rule set is compiled and cached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub packet_type: u16,
    pub log_type: LogType,
}

impl RuleKey {
    pub fn new(packet_type: u16, log_type: LogType) -> Self {
        Self {
            packet_type,
            log_type,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-0x{:03X}", self.log_type, self.packet_type)
    }
}

/// One decoding step.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Field with a length known at compile time
    Fixed(FixedField),
    /// Field whose length is the value of an earlier field
    LengthPrefixed(LengthPrefixedField),
    /// Data-dependent choice between named rule blocks
    Switch(SwitchField),
    /// Everything left, as one unassigned field
    RawTail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedField {
    pub id: RuleId,
    pub name: CompactString,
    pub length: usize,
    pub kind: ValueKind,
    /// Lookup table for integer fields typed `<int>:<table>`
    pub lookup: Option<CompactString>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LengthPrefixedField {
    pub id: RuleId,
    pub name: CompactString,
    pub length_ref: CompactString,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchField {
    pub discriminant: CompactString,
    pub cases: Vec<SwitchCase>,
    pub default: Option<SwitchBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: u64,
    pub block: SwitchBlock,
}

/// A named rule sequence inside a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchBlock {
    pub name: CompactString,
    pub rules: Vec<Rule>,
}

impl SwitchField {
    /// Block selected by a discriminant value, falling back to the default.
    pub fn case_for(&self, value: u64) -> Option<&SwitchBlock> {
        self.cases
            .iter()
            .find(|case| case.value == value)
            .map(|case| &case.block)
            .or(self.default.as_ref())
    }

    /// Block of this switch with the given name.
    pub fn block_named(&self, name: &str) -> Option<&SwitchBlock> {
        self.blocks().find(|block| block.name == name)
    }

    /// Block names in declaration order (cases first, then the default).
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks().map(|block| block.name.as_str())
    }

    fn blocks(&self) -> impl Iterator<Item = &SwitchBlock> {
        self.cases
            .iter()
            .map(|case| &case.block)
            .chain(self.default.as_ref())
    }
}

/// Immutable rule tree for one packet type and log type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRuleSet {
    key: RuleKey,
    type_name: Option<CompactString>,
    package: Option<CompactString>,
    rules: Vec<Rule>,
    lookups: HashMap<CompactString, LookupTable>,
    rule_count: u32,
}

impl CompiledRuleSet {
    /// Rule set that shows the whole packet as one unassigned field.
    ///
    /// Used when no rule text exists for a key or when it fails to compile.
    pub fn raw_only(key: RuleKey) -> Self {
        Self {
            key,
            type_name: None,
            package: None,
            rules: vec![Rule::RawTail],
            lookups: HashMap::new(),
            rule_count: 0,
        }
    }

    pub fn key(&self) -> RuleKey {
        self.key
    }

    /// Packet type name from the `file;` header line.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Package label from the `file;` header line.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn lookup(&self, table: &str) -> Option<&LookupTable> {
        self.lookups.get(table)
    }

    /// Number of field rules (fixed and length-prefixed) in the tree.
    pub fn field_rule_count(&self) -> u32 {
        self.rule_count
    }

    pub fn is_raw_only(&self) -> bool {
        self.rule_count == 0 && matches!(self.rules.as_slice(), [Rule::RawTail])
    }

    /// Resolve a [`RuleId`] back to its rule.
    pub fn find_rule(&self, id: RuleId) -> Option<&Rule> {
        fn walk(rules: &[Rule], id: RuleId) -> Option<&Rule> {
            for rule in rules {
                match rule {
                    Rule::Fixed(f) if f.id == id => return Some(rule),
                    Rule::LengthPrefixed(f) if f.id == id => return Some(rule),
                    Rule::Switch(switch) => {
                        let found = switch
                            .cases
                            .iter()
                            .map(|case| &case.block)
                            .chain(switch.default.as_ref())
                            .find_map(|block| walk(&block.rules, id));
                        if found.is_some() {
                            return found;
                        }
                    }
                    _ => {}
                }
            }
            None
        }

        walk(&self.rules, id)
    }
}

impl Rule {
    /// Field name for field rules.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Rule::Fixed(f) => Some(&f.name),
            Rule::LengthPrefixed(f) => Some(&f.name),
            Rule::Switch(_) | Rule::RawTail => None,
        }
    }
}
