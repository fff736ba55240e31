//! Rule text compiler.
//!
//! Grammar (one directive per line, columns separated by `;`):
//! ```text
//! file;<packetTypeName>;<packageLabel>
//! rem;<anything>
//! lookup;<table>;<value>;<name>
//! field;<name>;<type>[:<table>][;<length-or-lengthFieldRef>]
//! switch;<discriminantFieldName>
//! case;<value>[;<blockName>]
//! default;[<blockName>]
//! endswitch;                                   (alias: end;)
//! ```
//!
//! Numbers are decimal, `0x` hexadecimal, or negative decimal (stored as the
//! two's complement bit pattern so they compare equal to signed fields).

use std::collections::{HashMap, HashSet};

use compact_str::{format_compact, CompactString};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, hex_digit1},
    combinator::{all_consuming, map_res},
    sequence::preceded,
    IResult,
};
use tracing::debug;

use super::{
    CompiledRuleSet, FixedField, LengthPrefixedField, LogType, Rule, RuleId, RuleKey, SwitchBlock,
    SwitchCase, SwitchField,
};
use crate::error::RuleSyntaxError;
use crate::schema::{LookupTable, ValueKind};

/// Compile rule text for one packet type and log type.
///
/// Compilation is pure: it reads no packet bytes and keeps no state between
/// calls. Compiling the same text twice yields equal rule sets.
pub fn compile(
    text: &str,
    packet_type: u16,
    log_type: LogType,
) -> Result<CompiledRuleSet, RuleSyntaxError> {
    let mut compiler = Compiler::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        compiler.line(line_no, line)?;
    }

    let key = RuleKey::new(packet_type, log_type);
    let rules = compiler.finish(key)?;
    debug!(
        "Compiled {} rule set: {} field rules",
        key,
        rules.field_rule_count()
    );
    Ok(rules)
}

type Scope = Vec<(CompactString, ValueKind)>;

#[derive(Default)]
struct Compiler {
    header_seen: bool,
    type_name: Option<CompactString>,
    package: Option<CompactString>,
    root: Vec<Rule>,
    root_scope: Scope,
    switches: Vec<OpenSwitch>,
    block_names: HashSet<CompactString>,
    lookups: HashMap<CompactString, LookupTable>,
    /// Lookup tables referenced by fields, checked once all lines are read
    lookup_refs: Vec<(usize, CompactString)>,
    next_id: RuleId,
}

struct OpenSwitch {
    line: usize,
    discriminant: CompactString,
    cases: Vec<SwitchCase>,
    default: Option<SwitchBlock>,
    current: Option<OpenBlock>,
}

struct OpenBlock {
    name: CompactString,
    /// Case value, None for the default block
    value: Option<u64>,
    rules: Vec<Rule>,
    scope: Scope,
}

impl OpenSwitch {
    fn close_block(&mut self) {
        if let Some(block) = self.current.take() {
            let closed = SwitchBlock {
                name: block.name,
                rules: block.rules,
            };
            match block.value {
                Some(value) => self.cases.push(SwitchCase {
                    value,
                    block: closed,
                }),
                None => self.default = Some(closed),
            }
        }
    }

    fn has_value(&self, value: u64) -> bool {
        self.cases.iter().any(|case| case.value == value)
            || self
                .current
                .as_ref()
                .is_some_and(|block| block.value == Some(value))
    }

    fn has_default(&self) -> bool {
        self.default.is_some()
            || self
                .current
                .as_ref()
                .is_some_and(|block| block.value.is_none())
    }
}

/// Split a line into trimmed columns, dropping one trailing empty column.
fn columns(line: &str) -> Vec<&str> {
    let mut cols: Vec<&str> = line.split(';').map(str::trim).collect();
    if cols.len() > 1 && cols.last().is_some_and(|c| c.is_empty()) {
        cols.pop();
    }
    cols
}

/// Non-empty column at `index`.
fn column<'a>(cols: &[&'a str], index: usize) -> Option<&'a str> {
    cols.get(index).copied().filter(|c| !c.is_empty())
}

fn required<'a>(
    cols: &[&'a str],
    index: usize,
    line: usize,
    what: &str,
) -> Result<&'a str, RuleSyntaxError> {
    column(cols, index).ok_or_else(|| RuleSyntaxError::new(line, format!("missing {what}")))
}

impl Compiler {
    fn line(&mut self, line: usize, text: &str) -> Result<(), RuleSyntaxError> {
        let cols = columns(text);
        let directive = cols[0].to_ascii_lowercase();

        match directive.as_str() {
            "rem" => Ok(()),
            "file" => self.header(line, &cols),
            "lookup" => self.lookup(line, &cols),
            "field" => self.field(line, &cols),
            "switch" => self.switch(line, &cols),
            "case" => self.case(line, &cols),
            "default" => self.default_block(line, &cols),
            "endswitch" | "end" => self.end_switch(line),
            other => Err(RuleSyntaxError::new(
                line,
                format!("unknown directive `{other}`"),
            )),
        }
    }

    fn header(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        if self.header_seen {
            return Err(RuleSyntaxError::new(line, "duplicate file header"));
        }
        self.header_seen = true;
        self.type_name = Some(required(cols, 1, line, "packet type name")?.into());
        self.package = column(cols, 2).map(CompactString::from);
        Ok(())
    }

    fn lookup(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        let table = required(cols, 1, line, "lookup table name")?;
        let value = number_column(required(cols, 2, line, "lookup value")?, line)?;
        let name = required(cols, 3, line, "lookup entry name")?;

        self.lookups
            .entry(table.into())
            .or_insert_with(|| LookupTable::new(table))
            .insert(value, name);
        Ok(())
    }

    fn field(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        let name = required(cols, 1, line, "field name")?;
        let type_col = required(cols, 2, line, "field type")?;

        let (type_token, table) = match type_col.split_once(':') {
            Some((token, table)) => (token.trim(), Some(table.trim())),
            None => (type_col, None),
        };
        let kind = ValueKind::from_token(type_token).ok_or_else(|| {
            RuleSyntaxError::new(line, format!("unknown field type `{type_token}`"))
        })?;

        let lookup = match table {
            Some("") => {
                return Err(RuleSyntaxError::new(line, "missing lookup table name"));
            }
            Some(table) if !kind.is_integer() => {
                return Err(RuleSyntaxError::new(
                    line,
                    format!("lookup table `{table}` on non-integer field `{name}`"),
                ));
            }
            Some(table) => {
                self.lookup_refs.push((line, table.into()));
                Some(CompactString::from(table))
            }
            None => None,
        };

        let length_col = column(cols, 3);
        let id = self.next_id;
        let rule = match (kind.fixed_size(), length_col) {
            (Some(size), None) => Rule::Fixed(FixedField {
                id,
                name: name.into(),
                length: size,
                kind,
                lookup,
            }),
            (size, Some(col)) if looks_numeric(col) => {
                let length = usize::try_from(number_column(col, line)?)
                    .map_err(|_| RuleSyntaxError::new(line, format!("length `{col}` too large")))?;
                if length == 0 {
                    return Err(RuleSyntaxError::new(
                        line,
                        format!("field `{name}` has zero length"),
                    ));
                }
                if let Some(size) = size {
                    if size != length {
                        return Err(RuleSyntaxError::new(
                            line,
                            format!("length {length} does not match {kind} size {size}"),
                        ));
                    }
                }
                Rule::Fixed(FixedField {
                    id,
                    name: name.into(),
                    length,
                    kind,
                    lookup,
                })
            }
            (Some(_), Some(col)) => {
                return Err(RuleSyntaxError::new(
                    line,
                    format!("{kind} field `{name}` cannot take length reference `{col}`"),
                ));
            }
            (None, Some(col)) => {
                self.integer_ref(col, line, "length")?;
                Rule::LengthPrefixed(LengthPrefixedField {
                    id,
                    name: name.into(),
                    length_ref: col.into(),
                    kind,
                })
            }
            (None, None) => {
                return Err(RuleSyntaxError::new(
                    line,
                    format!("missing length for {kind} field `{name}`"),
                ));
            }
        };

        self.next_id += 1;
        self.push(line, rule, Some((name.into(), kind)))
    }

    fn switch(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        let discriminant = required(cols, 1, line, "discriminant field")?;
        self.integer_ref(discriminant, line, "discriminant")?;
        self.ensure_in_block(line, "switch")?;

        self.switches.push(OpenSwitch {
            line,
            discriminant: discriminant.into(),
            cases: Vec::new(),
            default: None,
            current: None,
        });
        Ok(())
    }

    fn case(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        let literal = required(cols, 1, line, "case value")?;
        let value = number_column(literal, line)?;

        let switch = self
            .switches
            .last()
            .ok_or_else(|| RuleSyntaxError::new(line, "`case` outside a switch"))?;
        if switch.has_value(value) {
            return Err(RuleSyntaxError::new(
                line,
                format!("duplicate case value `{literal}`"),
            ));
        }
        let name = match column(cols, 2) {
            Some(name) => CompactString::from(name),
            None => format_compact!("{}={}", switch.discriminant, literal),
        };

        self.open_block(line, name, Some(value))
    }

    fn default_block(&mut self, line: usize, cols: &[&str]) -> Result<(), RuleSyntaxError> {
        let switch = self
            .switches
            .last()
            .ok_or_else(|| RuleSyntaxError::new(line, "`default` outside a switch"))?;
        if switch.has_default() {
            return Err(RuleSyntaxError::new(line, "duplicate default block"));
        }
        let name = match column(cols, 1) {
            Some(name) => CompactString::from(name),
            None => format_compact!("{}=default", switch.discriminant),
        };

        self.open_block(line, name, None)
    }

    fn open_block(
        &mut self,
        line: usize,
        name: CompactString,
        value: Option<u64>,
    ) -> Result<(), RuleSyntaxError> {
        if !self.block_names.insert(name.clone()) {
            return Err(RuleSyntaxError::new(
                line,
                format!("duplicate block name `{name}`"),
            ));
        }
        // Caller checked that a switch is open.
        if let Some(switch) = self.switches.last_mut() {
            switch.close_block();
            switch.current = Some(OpenBlock {
                name,
                value,
                rules: Vec::new(),
                scope: Vec::new(),
            });
        }
        Ok(())
    }

    fn end_switch(&mut self, line: usize) -> Result<(), RuleSyntaxError> {
        let mut switch = self
            .switches
            .pop()
            .ok_or_else(|| RuleSyntaxError::new(line, "`endswitch` outside a switch"))?;
        switch.close_block();

        let rule = Rule::Switch(SwitchField {
            discriminant: switch.discriminant,
            cases: switch.cases,
            default: switch.default,
        });
        self.push(line, rule, None)
    }

    /// Append a rule to the innermost open sequence, declaring its name there.
    fn push(
        &mut self,
        line: usize,
        rule: Rule,
        declares: Option<(CompactString, ValueKind)>,
    ) -> Result<(), RuleSyntaxError> {
        let (rules, scope) = match self.switches.last_mut() {
            None => (&mut self.root, &mut self.root_scope),
            Some(switch) => match switch.current.as_mut() {
                Some(block) => (&mut block.rules, &mut block.scope),
                None => {
                    return Err(RuleSyntaxError::new(
                        line,
                        format!(
                            "rule before the first case of switch on `{}`",
                            switch.discriminant
                        ),
                    ));
                }
            },
        };
        rules.push(rule);
        scope.extend(declares);
        Ok(())
    }

    fn ensure_in_block(&self, line: usize, what: &str) -> Result<(), RuleSyntaxError> {
        match self.switches.last() {
            Some(switch) if switch.current.is_none() => Err(RuleSyntaxError::new(
                line,
                format!(
                    "{what} before the first case of switch on `{}`",
                    switch.discriminant
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Kind of a field visible at the current position, innermost first.
    fn resolve(&self, name: &str) -> Option<ValueKind> {
        let find = |scope: &Scope| {
            scope
                .iter()
                .rev()
                .find(|(declared, _)| declared == name)
                .map(|(_, kind)| *kind)
        };

        self.switches
            .iter()
            .rev()
            .filter_map(|switch| switch.current.as_ref())
            .find_map(|block| find(&block.scope))
            .or_else(|| find(&self.root_scope))
    }

    fn integer_ref(&self, name: &str, line: usize, role: &str) -> Result<(), RuleSyntaxError> {
        match self.resolve(name) {
            Some(kind) if kind.is_integer() => Ok(()),
            Some(kind) => Err(RuleSyntaxError::new(
                line,
                format!("{role} `{name}` is a {kind} field, not an integer"),
            )),
            None => Err(RuleSyntaxError::new(
                line,
                format!("undeclared {role} field `{name}`"),
            )),
        }
    }

    fn finish(self, key: RuleKey) -> Result<CompiledRuleSet, RuleSyntaxError> {
        if let Some(switch) = self.switches.last() {
            return Err(RuleSyntaxError::new(
                switch.line,
                format!("unterminated switch on `{}`", switch.discriminant),
            ));
        }
        if let Some((line, table)) = self
            .lookup_refs
            .iter()
            .find(|(_, table)| !self.lookups.contains_key(table))
        {
            return Err(RuleSyntaxError::new(
                *line,
                format!("unknown lookup table `{table}`"),
            ));
        }

        Ok(CompiledRuleSet {
            key,
            type_name: self.type_name,
            package: self.package,
            rules: self.root,
            lookups: self.lookups,
            rule_count: self.next_id,
        })
    }
}

/// Whether a length column is meant as a number rather than a field name.
fn looks_numeric(col: &str) -> bool {
    col.starts_with(|c: char| c.is_ascii_digit() || c == '-')
}

fn number_column(col: &str, line: usize) -> Result<u64, RuleSyntaxError> {
    parse_number(col).ok_or_else(|| RuleSyntaxError::new(line, format!("malformed number `{col}`")))
}

/// Parse a numeric literal: `0x` hex, decimal, or negative decimal.
pub(crate) fn parse_number(input: &str) -> Option<u64> {
    all_consuming(number)(input.trim()).ok().map(|(_, n)| n)
}

fn number(input: &str) -> IResult<&str, u64> {
    alt((hex_number, negative_number, decimal_number))(input)
}

fn hex_number(input: &str) -> IResult<&str, u64> {
    preceded(
        tag_no_case("0x"),
        map_res(hex_digit1, |digits: &str| u64::from_str_radix(digits, 16)),
    )(input)
}

fn negative_number(input: &str) -> IResult<&str, u64> {
    preceded(
        char('-'),
        map_res(digit1, |digits: &str| {
            digits.parse::<i64>().map(|n| n.wrapping_neg() as u64)
        }),
    )(input)
}

fn decimal_number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Endian;

    fn compile_in(text: &str) -> Result<CompiledRuleSet, RuleSyntaxError> {
        compile(text, 0x015, LogType::Incoming)
    }

    fn error_of(text: &str) -> RuleSyntaxError {
        compile_in(text).expect_err("rule text should not compile")
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("10"), Some(10));
        assert_eq!(parse_number("0x0A"), Some(10));
        assert_eq!(parse_number("0XfF"), Some(255));
        assert_eq!(parse_number("-1"), Some(u64::MAX));
        assert_eq!(parse_number("12x"), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_compile_fixed_fields() {
        let rules = compile_in(
            "\
file;ActionPacket;client
rem;header fields
field;opcode;u16
field;targetId;u32be;4
field;label;string;16
",
        )
        .unwrap();

        assert_eq!(rules.type_name(), Some("ActionPacket"));
        assert_eq!(rules.package(), Some("client"));
        assert_eq!(rules.rules().len(), 3);

        let Rule::Fixed(target) = &rules.rules()[1] else {
            panic!("expected fixed field");
        };
        assert_eq!(target.id, 1);
        assert_eq!(target.name, "targetId");
        assert_eq!(target.length, 4);
        assert_eq!(
            target.kind,
            ValueKind::UInt {
                width: 4,
                endian: Endian::Big
            }
        );

        let Rule::Fixed(label) = &rules.rules()[2] else {
            panic!("expected fixed field");
        };
        assert_eq!(label.kind, ValueKind::String);
        assert_eq!(label.length, 16);
    }

    #[test]
    fn test_compile_length_prefixed() {
        let rules = compile_in(
            "\
field;nameLen;u8
field;name;string;nameLen
",
        )
        .unwrap();

        let Rule::LengthPrefixed(name) = &rules.rules()[1] else {
            panic!("expected length-prefixed field");
        };
        assert_eq!(name.length_ref, "nameLen");
        assert_eq!(name.kind, ValueKind::String);
    }

    #[test]
    fn test_compile_switch_block_names() {
        let rules = compile_in(
            "\
field;opcode;u16
switch;opcode
case;0x0A
field;targetId;u32be
case;0x0B;Emote
field;emote;u8
default;
endswitch;
",
        )
        .unwrap();

        let Rule::Switch(switch) = &rules.rules()[1] else {
            panic!("expected switch");
        };
        assert_eq!(switch.discriminant, "opcode");
        assert_eq!(
            switch.block_names().collect::<Vec<_>>(),
            vec!["opcode=0x0A", "Emote", "opcode=default"]
        );
        assert_eq!(switch.cases[0].value, 0x0A);
        assert_eq!(switch.cases[1].block.rules.len(), 1);
        assert!(switch.default.as_ref().unwrap().rules.is_empty());
    }

    #[test]
    fn test_compile_nested_switch() {
        let rules = compile_in(
            "\
field;a;u8
switch;a
case;1
field;b;u8
switch;b
case;2
field;c;u8
end;
field;d;u8
endswitch;
",
        )
        .unwrap();

        let Rule::Switch(outer) = &rules.rules()[1] else {
            panic!("expected switch");
        };
        let block = &outer.cases[0].block;
        assert_eq!(block.rules.len(), 3);
        assert!(matches!(block.rules[1], Rule::Switch(_)));
        assert_eq!(rules.field_rule_count(), 4);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let text = "\
lookup;zones;0x0F;Valkurm Dunes
field;zone;u16:zones
switch;zone
case;0x0F
field;weather;u8
endswitch;
";
        assert_eq!(compile_in(text).unwrap(), compile_in(text).unwrap());
    }

    #[test]
    fn test_compile_lookup_tables() {
        let rules = compile_in(
            "\
field;zone;u16:zones
lookup;zones;0x0F;Valkurm Dunes
lookup;zones;15;Valkurm Dunes [S]
",
        )
        .unwrap();

        let table = rules.lookup("zones").unwrap();
        assert_eq!(table.get(15), Some("Valkurm Dunes [S]"));
        let Rule::Fixed(zone) = &rules.rules()[0] else {
            panic!("expected fixed field");
        };
        assert_eq!(zone.lookup.as_deref(), Some("zones"));
    }

    #[test]
    fn test_directives_case_insensitive_and_trimmed() {
        let rules = compile_in("  FIELD ; opcode ; U16 ;\n\n  Rem;  note\n").unwrap();
        assert_eq!(rules.rules()[0].field_name(), Some("opcode"));
    }

    #[test]
    fn test_error_undeclared_discriminant() {
        let err = error_of("field;a;u8\nswitch;b\ncase;1\nendswitch;\n");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("undeclared discriminant"));
    }

    #[test]
    fn test_error_undeclared_length_ref() {
        let err = error_of("field;name;string;nameLen\n");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("undeclared length"));
    }

    #[test]
    fn test_error_non_integer_reference() {
        let err = error_of("field;ratio;f32\nfield;blob;bytes;ratio\n");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("not an integer"));

        let err = error_of("field;tag;string;4\nswitch;tag\nendswitch;\n");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_error_duplicate_case_value() {
        let err = error_of("field;a;u8\nswitch;a\ncase;1\ncase;0x01\nendswitch;\n");
        assert_eq!(err.line, 4);
        assert!(err.message.contains("duplicate case value"));
    }

    #[test]
    fn test_error_duplicate_block_name() {
        let err = error_of(
            "field;a;u8\nswitch;a\ncase;1;Same\ncase;2;Same\nendswitch;\n",
        );
        assert_eq!(err.line, 4);
        assert!(err.message.contains("duplicate block name"));
    }

    #[test]
    fn test_error_unterminated_switch() {
        let err = error_of("field;a;u8\nswitch;a\ncase;1\nfield;b;u8\n");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated switch"));
    }

    #[test]
    fn test_error_unknown_type() {
        let err = error_of("field;a;u8\nfield;b;u24\n");
        assert_eq!(err, RuleSyntaxError::new(2, "unknown field type `u24`"));
    }

    #[test]
    fn test_error_unknown_lookup_table() {
        let err = error_of("field;zone;u16:zones\n");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unknown lookup table"));
    }

    #[test]
    fn test_error_lookup_on_non_integer() {
        let err = error_of("lookup;t;1;x\nfield;s;string:t;4\n");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_error_structure() {
        assert_eq!(error_of("case;1\n").line, 1);
        assert_eq!(error_of("default;\n").line, 1);
        assert_eq!(error_of("endswitch;\n").line, 1);
        assert_eq!(error_of("field;a;u8\nswitch;a\nfield;b;u8\n").line, 3);
        assert_eq!(
            error_of("field;a;u8\nswitch;a\ndefault;\ndefault;X\nendswitch;\n").line,
            4
        );
        assert_eq!(error_of("file;A;x\nfile;B;y\n").line, 2);
        assert_eq!(error_of("bogus;1\n").line, 1);
    }

    #[test]
    fn test_error_lengths() {
        assert!(error_of("field;a;u16;3\n").message.contains("does not match"));
        assert!(error_of("field;s;string\n").message.contains("missing length"));
        assert!(error_of("field;s;bytes;0x\n").message.contains("malformed"));
        assert!(error_of("field;s;bytes;0\n").message.contains("zero length"));
        assert!(error_of("field;n;u8\nfield;a;u16;n\n")
            .message
            .contains("cannot take length reference"));
        assert!(error_of("field;a\n").message.contains("missing field type"));
    }

    #[test]
    fn test_block_scope() {
        // `b` is declared inside the case block and is gone after endswitch.
        let err = error_of(
            "\
field;a;u8
switch;a
case;1
field;b;u8
endswitch;
field;tail;bytes;b
",
        );
        assert_eq!(err.line, 6);

        // Nested blocks see fields of their enclosing blocks.
        assert!(compile_in(
            "\
field;a;u8
switch;a
case;1
field;b;u8
switch;a
case;2
field;c;bytes;b
endswitch;
endswitch;
"
        )
        .is_ok());
    }
}
