// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the scan pipeline: background flattening, skew
// estimation, and a full default-profile scan of a synthetic page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use scanwerk_core::config::{BackgroundConfig, MedianDivisionOptions};
use scanwerk_core::presets::ScanMode;
use scanwerk_document::{PixelBuffer, ScanPipeline};
use scanwerk_document::scan::BackgroundNormalizer;
use scanwerk_document::scan::skew::estimate_skew;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 600x800 page with dark text bars tilted by `degrees`, lit unevenly from
/// the left.
fn synthetic_page(degrees: f32) -> GrayImage {
    let (width, height) = (600u32, 800u32);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let (s, c) = degrees.to_radians().sin_cos();
    GrayImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f32 - cx, y as f32 - cy);
        let u = dx * c + dy * s;
        let v = -dx * s + dy * c;
        let paper = 150.0 + 80.0 * x as f32 / width as f32;
        let on_bar = u.abs() < 220.0 && v.abs() < 320.0 && (v + 320.0).rem_euclid(32.0) < 10.0;
        Luma([if on_bar { 40 } else { paper as u8 }])
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_median_division(c: &mut Criterion) {
    let page = PixelBuffer::Gray(synthetic_page(0.0));
    let config = BackgroundConfig::MedianDivision(MedianDivisionOptions::default());
    let normalizer = BackgroundNormalizer::new();

    c.bench_function("median_division (600x800)", |b| {
        b.iter(|| black_box(normalizer.normalize(black_box(&page), &config)));
    });
}

fn bench_skew_estimate(c: &mut Criterion) {
    let page = synthetic_page(4.0);

    c.bench_function("estimate_skew (600x800, 4 deg)", |b| {
        b.iter(|| black_box(estimate_skew(black_box(&page))));
    });
}

fn bench_full_scan(c: &mut Criterion) {
    let page = PixelBuffer::Gray(synthetic_page(3.0));
    let pipeline = ScanPipeline::new();
    let profile = ScanMode::Standard.profile();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("scan standard (600x800)", |b| {
        b.iter(|| black_box(pipeline.scan(black_box(&page), &profile)));
    });
    group.finish();
}

criterion_group!(benches, bench_median_division, bench_skew_estimate, bench_full_scan);
criterion_main!(benches);
