//! Image Operations Benchmarks
//!
//! Benchmarks for pixel comparison and PNG encoding.
//!
//! Run with: `cargo bench --bench image_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use vigil::capture::encode_png;
use vigil::VisualComparator;

fn screenshot(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255])
    })
}

fn bench_compare_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_identical");
    let comparator = VisualComparator::default();

    for (w, h) in [(320, 240), (1280, 800), (1280, 4000)] {
        let a = DynamicImage::ImageRgba8(screenshot(w, h));
        let b = a.clone();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{w}x{h}")),
            &(a, b),
            |bench, (a, b)| {
                bench.iter(|| black_box(comparator.compare_images(black_box(a), black_box(b))));
            },
        );
    }

    group.finish();
}

fn bench_compare_early_mismatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_early_mismatch");
    let comparator = VisualComparator::default();

    let a = DynamicImage::ImageRgba8(screenshot(1280, 800));
    for row in [0, 400, 799] {
        let mut changed = screenshot(1280, 800);
        changed.put_pixel(640, row, Rgba([0, 0, 0, 0]));
        let b = DynamicImage::ImageRgba8(changed);
        group.bench_with_input(BenchmarkId::from_parameter(format!("row_{row}")), &b, |bench, b| {
            bench.iter(|| black_box(comparator.compare_images(&a, black_box(b))));
        });
    }

    group.finish();
}

fn bench_png_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encode");

    for (w, h) in [(320, 240), (1280, 800)] {
        let img = screenshot(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &img, |bench, img| {
            bench.iter(|| black_box(encode_png(black_box(img)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compare_identical,
    bench_compare_early_mismatch,
    bench_png_encode
);
criterion_main!(benches);
