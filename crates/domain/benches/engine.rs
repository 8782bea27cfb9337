use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use domain::decode::entity::{DecodeOptions, LayeredPacket};
use domain::icsrule::engine::IcsRuleStore;
use domain::suricata::engine::SignatureStore;

fn modbus_frame() -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
    frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb8]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.extend_from_slice(&[0x45, 0x00, 0x00, 0x34]);
    frame.extend_from_slice(&[0xcd, 0x4b, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
    frame.extend_from_slice(&[192, 168, 3, 189]);
    frame.extend_from_slice(&[192, 168, 3, 190]);
    frame.extend_from_slice(&53211u16.to_be_bytes());
    frame.extend_from_slice(&502u16.to_be_bytes());
    frame.extend_from_slice(&[0; 8]);
    frame.extend_from_slice(&[0x50, 0x18, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(&[
        0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x02,
    ]);
    frame
}

fn ics_store_with(n: u32) -> IcsRuleStore {
    let rules: Vec<String> = (1..=n)
        .map(|rid| {
            format!(
                r#"{{"active":true,"rid":{rid},"action":"alert","src":null,"sport":null,"dire":"->","dst":null,"dport":503,"msg":"bench rule {rid}","proname":"Modbus","args":[]}}"#
            )
        })
        .collect();
    let mut store = IcsRuleStore::new();
    store.load_str(&format!("[{}]", rules.join(","))).unwrap();
    store
}

fn signature_store_with(n: u32) -> SignatureStore {
    let rules: String = (1..=n)
        .map(|sid| format!("alert tcp any any -> any 503 (content:\"nope\"; sid:{sid};)\n"))
        .collect();
    let mut store = SignatureStore::new();
    store.load_str(&rules).unwrap();
    store
}

fn bench_decode(c: &mut Criterion) {
    let frame = modbus_frame();
    let options = DecodeOptions::default();

    c.bench_function("decode_modbus_frame", |b| {
        b.iter(|| LayeredPacket::decode(black_box(&frame), &options));
    });
}

fn bench_ics_detect(c: &mut Criterion) {
    let frame = modbus_frame();
    let options = DecodeOptions::default();
    let packet = LayeredPacket::decode(&frame, &options);

    let mut group = c.benchmark_group("ics_detect_miss");
    for n in [10u32, 100, 1000] {
        let store = ics_store_with(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| store.detect(black_box(&packet)));
        });
    }
    group.finish();
}

fn bench_signature_detect(c: &mut Criterion) {
    let frame = modbus_frame();
    let options = DecodeOptions::default();
    let packet = LayeredPacket::decode(&frame, &options);

    let mut group = c.benchmark_group("suricata_detect_miss");
    for n in [10u32, 100, 1000] {
        let store = signature_store_with(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| store.detect(black_box(&packet)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_ics_detect, bench_signature_detect);
criterion_main!(benches);
