#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::suricata::parser::parse_rules;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Parsing may reject, but must never panic.
        let _ = parse_rules(text);
    }
});
