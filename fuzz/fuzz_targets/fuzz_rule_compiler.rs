//! Fuzz target for the rule text compiler.
//!
//! Any text must either compile or return a line-numbered syntax error:
//! - Directive and column splitting
//! - Numeric literals (decimal, negative, `0x` hex)
//! - Switch/case/default nesting and block scoping
//! - Lookup table references resolved at the end

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktlens_core::{compile, LogType};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Err(err) = compile(text, 0x015, LogType::Incoming) {
        assert!(err.line >= 1);
    }
});
