//! Fuzz target for the text packet log reader.
//!
//! Malformed lines must produce an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktlens::cli::hexlog::parse_log;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_log(text);
    }
});
