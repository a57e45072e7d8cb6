// ABOUTME: Benchmarks decoding binary plists into dynamic values and typed structs.
// ABOUTME: Fixtures come from the test-only writer shared with the integration tests.

#[path = "../tests/support/mod.rs"]
mod support;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde::Deserialize;
use serde_bplist::{plist, Date, Dictionary, Value};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Entry {
    id: u64,
    name: String,
    email: String,
    scores: Vec<i32>,
    rating: f64,
    created: String,
}

fn create_info_plist() -> Value {
    plist!({
        "CFBundleIdentifier": "com.example.viewer",
        "CFBundleShortVersionString": "2.4",
        "CFBundleVersion": "2041",
        "UIDeviceFamily": [1, 2],
        "UIRequiredDeviceCapabilities": ["arm64", "metal"],
        "LSRequiresIPhoneOS": true
    })
}

fn create_entries() -> Value {
    let created = Value::Date(Date::from_apple_offset(727_000_000.0).unwrap());
    (0..1000)
        .map(|i| {
            let mut dict = Dictionary::new();
            dict.insert("id", i as u64);
            dict.insert("name", format!("User {i}"));
            dict.insert("email", format!("user{i}@example.com"));
            dict.insert("scores", vec![i % 100; 10]);
            dict.insert("rating", f64::from(i) / 10.0);
            dict.insert("created", created.clone());
            Value::Dict(dict)
        })
        .collect()
}

fn bench_info_plist(c: &mut Criterion) {
    let data = support::encode(&create_info_plist());

    let mut group = c.benchmark_group("info_plist");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("decode_value", |b| {
        b.iter(|| serde_bplist::decode_value(black_box(&data)).unwrap())
    });

    group.finish();
}

fn bench_entries(c: &mut Criterion) {
    let data = support::encode(&create_entries());

    let mut group = c.benchmark_group("entries");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("decode_value", |b| {
        b.iter(|| serde_bplist::decode_value(black_box(&data)).unwrap())
    });

    group.bench_function("from_slice", |b| {
        b.iter(|| {
            let decoded: Vec<Entry> = serde_bplist::from_slice(black_box(&data)).unwrap();
            decoded
        })
    });

    println!("Entries document: {} bytes", data.len());

    group.finish();
}

criterion_group!(benches, bench_info_plist, bench_entries);
criterion_main!(benches);
