//! Fuzz target for the field decoder.
//!
//! Decodes the fuzz data under a fixed rule set with a nested switch and
//! length-prefixed fields, then checks that every byte is owned by at most
//! one field and the fields tile the buffer.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use pktlens_core::{compile, decode, CompiledRuleSet, LogType};

const RULES: &str = "\
lookup;modes;0;say
lookup;modes;3;tell
field;mode;u8:modes
field;nameLen;u8
field;name;string;nameLen
switch;mode
case;3;Tell
field;targetLen;u16be
field;target;bytes;targetLen
switch;targetLen
case;0;NoTarget
default;HasTarget
field;flags;i32
endswitch;
default;Public
field;x;f32
field;y;f64
endswitch;
";

fn rules() -> &'static CompiledRuleSet {
    static RULES_SET: OnceLock<CompiledRuleSet> = OnceLock::new();
    RULES_SET.get_or_init(|| compile(RULES, 0x017, LogType::Incoming).unwrap())
}

fuzz_target!(|data: &[u8]| {
    let (block, data) = match data.split_first() {
        Some((&selector, rest)) if selector % 4 == 1 => (Some("Tell"), rest),
        Some((&selector, rest)) if selector % 4 == 2 => (Some("Public"), rest),
        _ => (None, data),
    };

    let packet = decode(rules(), data, block);

    assert_eq!(packet.byte_map.len(), data.len());
    let mut end = 0;
    for field in &packet.fields {
        assert_eq!(field.offset, end);
        end = field.range().end;
        for offset in field.range() {
            assert_eq!(packet.byte_map.owner(offset), Some(field.index));
        }
    }
    assert_eq!(end, data.len());
});
