#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::icsrule::engine::IcsRuleStore;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let mut store = IcsRuleStore::new();
        // Loading may reject, but must never panic or corrupt the store.
        let _ = store.load_str(text);
        let _ = store.render();
    }
});
