#![no_main]

use jetdiff::ingest::{parse_jsonl, JsonlOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Malformed rows must come back as errors, never panics
        let _ = parse_jsonl("fuzz", text, &JsonlOptions::default());
        let _ = parse_jsonl("fuzz", text, &JsonlOptions::flatten_into("jet_idx"));
    }
});
