#![no_main]

use jetdiff::roc::Cut;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(cut) = input.parse::<Cut>() {
            // Whatever parses must survive a display round trip
            let again: Cut = cut.to_string().parse().unwrap();
            assert_eq!(again.field, cut.field);
            assert_eq!(again.op, cut.op);
        }
    }
});
