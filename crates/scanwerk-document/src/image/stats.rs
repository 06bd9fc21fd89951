// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image statistics used by the quality analyzer, the binarization method
// selector and the automatic enhancer.

use image::GrayImage;

pub fn mean(gray: &GrayImage) -> f64 {
    let raw = gray.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    raw.iter().map(|&v| f64::from(v)).sum::<f64>() / raw.len() as f64
}

/// Population variance of the samples.
pub fn variance(gray: &GrayImage) -> f64 {
    variance_of(gray.as_raw().iter().map(|&v| f64::from(v)))
}

pub fn std_dev(gray: &GrayImage) -> f64 {
    variance(gray).sqrt()
}

/// Population variance of an arbitrary sequence, computed in one pass.
pub fn variance_of(values: impl IntoIterator<Item = f64>) -> f64 {
    let (mut n, mut sum, mut sum_sq) = (0u64, 0.0f64, 0.0f64);
    for v in values {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return 0.0;
    }
    let m = sum / n as f64;
    (sum_sq / n as f64 - m * m).max(0.0)
}

/// Mean of the samples whose `mask` entry is set; `None` when none are.
pub fn masked_mean(values: &[f32], mask: &[bool]) -> Option<f32> {
    let (mut n, mut sum) = (0usize, 0.0f64);
    for (&v, _) in values.iter().zip(mask).filter(|(_, m)| **m) {
        n += 1;
        sum += f64::from(v);
    }
    (n > 0).then(|| (sum / n as f64) as f32)
}

/// Percentile with linear interpolation between closest ranks; `p` in 0..=100.
pub fn percentile(values: &mut [f32], p: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Four-neighbour Laplacian with replicated borders.
pub fn laplacian(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = gray.dimensions();
    let mut out = Vec::with_capacity((w * h) as usize);
    if w == 0 || h == 0 {
        return out;
    }
    let at = |x: i64, y: i64| -> f32 {
        let xc = x.clamp(0, i64::from(w) - 1) as u32;
        let yc = y.clamp(0, i64::from(h) - 1) as u32;
        f32::from(gray.get_pixel(xc, yc).0[0])
    };
    for y in 0..i64::from(h) {
        for x in 0..i64::from(w) {
            out.push(at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y));
        }
    }
    out
}

/// Variance of the Laplacian: a standard focus / sharpness measure.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    variance_of(laplacian(gray).into_iter().map(f64::from))
}
