#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::decode::entity::{DecodeOptions, LayerDepth, LayeredPacket};

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic or fail on arbitrary bytes, at any depth.
    let full = LayeredPacket::decode(data, &DecodeOptions::default());
    let _ = full.protocol_id();
    let _ = full.is_ics();

    for stop in [
        LayerDepth::Link,
        LayerDepth::Network,
        LayerDepth::Transport,
        LayerDepth::Application,
    ] {
        let limited = LayeredPacket::decode(data, &DecodeOptions { stop: Some(stop) });
        assert!(limited.level() <= full.level());
    }
});
