//! Benchmarks for atlas packing and border extrusion

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kestrel_core::geometry::Size;
use kestrel_render::atlas::allocator::AtlasAllocator;
use kestrel_render::{Color, ImageData, extrude_rgba};

// Sprite-ish sizes, small enough that every count below fits in 4096.
const SIZES: [(u32, u32); 8] = [
    (8, 8),
    (12, 16),
    (16, 16),
    (24, 12),
    (10, 20),
    (20, 10),
    (14, 14),
    (18, 24),
];

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("atlas_allocate");

    for count in [100usize, 1000, 10000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut alloc = AtlasAllocator::new(4096);
                for i in 0..count {
                    let (width, height) = SIZES[i % SIZES.len()];
                    let pos = alloc.allocate(black_box(Size::new(width, height)));
                    debug_assert!(pos.is_some());
                }
                alloc
            });
        });
    }

    group.finish();
}

fn bench_extrude(c: &mut Criterion) {
    let mut group = c.benchmark_group("atlas_extrude");

    for size in [16, 64, 256] {
        group.throughput(Throughput::Bytes((size * size * 4) as u64));

        let image = ImageData::filled(size, size, Color::from_hex(0x87CEEB));
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| extrude_rgba(black_box(image), 2));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_allocate, bench_extrude);
criterion_main!(benches);
