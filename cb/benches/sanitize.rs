//! Sanitizer throughput on typical and large model outputs

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use coderbuddy::sanitize::sanitize;

fn breakdown(entries: usize) -> String {
    let items: Vec<String> = (0..entries)
        .map(|i| format!(r#"{{"filename": "src/file_{i}.js", "task": "Implement module {i} with its tests"}}"#))
        .collect();
    format!(
        "Here is the breakdown:\n\n```json\n[{}]\n```\n\nLet me know if you need changes.",
        items.join(",\n")
    )
}

fn bench_sanitize(c: &mut Criterion) {
    let small = breakdown(5);
    let large = breakdown(500);
    let escaped = format!("{:?}", breakdown(20));

    c.bench_function("sanitize fenced 5 entries", |b| b.iter(|| sanitize(black_box(&small))));
    c.bench_function("sanitize fenced 500 entries", |b| b.iter(|| sanitize(black_box(&large))));
    c.bench_function("sanitize quoted and escaped", |b| b.iter(|| sanitize(black_box(&escaped))));
}

criterion_group!(benches, bench_sanitize);
criterion_main!(benches);
