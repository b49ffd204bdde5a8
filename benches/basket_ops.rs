//! Benchmarks for basket operations

use basket_rs::{
    BasketHeader, Sha256Hasher, Tag, Warehouse, WarehouseConfig, BASKET_MAX_FILES,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn mounted() -> Warehouse {
    let mut wh = Warehouse::new(WarehouseConfig::default()).unwrap();
    wh.mount().unwrap();
    wh
}

fn benchmark_add_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("basket_add_file");

    for size in [64usize, 1024, 16 * 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = vec![0xA5u8; size];
            b.iter(|| {
                let mut wh = mounted();
                let basket = wh.create_basket(0).unwrap();
                for i in 0..8 {
                    black_box(wh.add_file(&basket, &format!("{}.bin", i), &data).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_read_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("basket_read_file");

    for size in [64usize, 1024, 16 * 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut wh = mounted();
            let basket = wh.create_basket(0).unwrap();
            let file = wh.add_file(&basket, "bench.bin", &vec![1u8; size]).unwrap();
            let mut buf = vec![0u8; size];

            b.iter(|| {
                black_box(wh.read_file(&file, &mut buf).unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_delete_and_compact(c: &mut Criterion) {
    c.bench_function("basket_delete_then_compact", |b| {
        b.iter(|| {
            let mut wh = mounted();
            let basket = wh.create_basket(0).unwrap();
            let files: Vec<Tag> = (0..BASKET_MAX_FILES)
                .map(|i| wh.add_file(&basket, &format!("{}", i), &[i as u8; 512]).unwrap())
                .collect();
            for tag in files.iter().step_by(2) {
                wh.delete_file(tag).unwrap();
            }
            black_box(wh.compact_basket(&basket).unwrap());
        });
    });
}

fn benchmark_header_codec(c: &mut Criterion) {
    let mut header = BasketHeader::new(Tag::from_bytes([7; 16]), 0, 0, 0);
    header.seal(&Sha256Hasher);
    let bytes = header.to_bytes();

    c.bench_function("basket_header_encode", |b| {
        b.iter(|| black_box(header.to_bytes()));
    });
    c.bench_function("basket_header_decode_verify", |b| {
        b.iter(|| {
            let decoded = BasketHeader::from_bytes(black_box(&bytes)).unwrap();
            black_box(decoded.verify(&Sha256Hasher))
        });
    });
}

criterion_group!(
    benches,
    benchmark_add_file,
    benchmark_read_file,
    benchmark_delete_and_compact,
    benchmark_header_codec
);
criterion_main!(benches);
