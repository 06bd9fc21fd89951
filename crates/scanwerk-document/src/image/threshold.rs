// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Threshold primitives: summed-area tables, global threshold selection (Otsu,
// Triangle) and local thresholding (adaptive mean / Gaussian, Sauvola).
//
// Every function here follows the same polarity: a pixel strictly above its
// threshold becomes 255, anything else 0.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Normalise a kernel or window size to an odd value no smaller than `min`.
///
/// Even sizes are bumped to the next odd value; the mapping is deterministic.
pub fn odd_kernel(size: u32, min: u32) -> u32 {
    let size = size.max(min);
    if size % 2 == 0 { size + 1 } else { size }
}

/// Gaussian sigma for a kernel of `size` pixels, matching the usual
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule.
pub fn sigma_for_kernel(size: u32) -> f32 {
    let k = size.max(1) as f32;
    (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
}

// -- Integral image -------------------------------------------------------------

/// Summed-area tables of pixel values and squared pixel values.
///
/// `sums[y * (width+1) + x]` is the sum over the rectangle [0, x) x [0, y); the
/// tables carry a zero-padded first row and column.
pub struct IntegralImage {
    sums: Vec<u64>,
    squares: Vec<u64>,
    width: u32,
    height: u32,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut sums = vec![0u64; stride * (h + 1) as usize];
        let mut squares = vec![0u64; stride * (h + 1) as usize];

        for y in 0..h {
            let mut row_sum: u64 = 0;
            let mut row_sq: u64 = 0;
            for x in 0..w {
                let v = u64::from(gray.get_pixel(x, y).0[0]);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                sums[idx] = row_sum + sums[above];
                squares[idx] = row_sq + squares[above];
            }
        }

        Self {
            sums,
            squares,
            width: w,
            height: h,
        }
    }

    /// Clamp a window centred on (cx, cy) to the image; returns the
    /// half-open corner coordinates.
    fn window(&self, cx: u32, cy: u32, radius: u32) -> (usize, usize, usize, usize) {
        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = (cx as usize + radius as usize + 1).min(self.width as usize);
        let y2 = (cy as usize + radius as usize + 1).min(self.height as usize);
        (x1, y1, x2, y2)
    }

    fn rect_sum(table: &[u64], stride: usize, x1: usize, y1: usize, x2: usize, y2: usize) -> f64 {
        table[y2 * stride + x2] as f64 - table[y1 * stride + x2] as f64
            - table[y2 * stride + x1] as f64
            + table[y1 * stride + x1] as f64
    }

    /// Mean of the square window of the given radius around (cx, cy).
    pub fn region_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        self.region_stats(cx, cy, radius).0
    }

    /// Mean and population variance of the window around (cx, cy).
    pub fn region_stats(&self, cx: u32, cy: u32, radius: u32) -> (f64, f64) {
        let stride = (self.width + 1) as usize;
        let (x1, y1, x2, y2) = self.window(cx, cy, radius);
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        if area == 0.0 {
            return (128.0, 0.0);
        }
        let mean = Self::rect_sum(&self.sums, stride, x1, y1, x2, y2) / area;
        let sq_mean = Self::rect_sum(&self.squares, stride, x1, y1, x2, y2) / area;
        (mean, (sq_mean - mean * mean).max(0.0))
    }
}

// -- Global thresholds -------------------------------------------------------------

pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the threshold value that maximises the between-class variance of the
/// dark and bright pixel groups. Pixels `<= t` form the dark class.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let histogram = histogram(gray);

    let total_pixels = u64::from(gray.width()) * u64::from(gray.height());
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Triangle threshold: the histogram bin farthest from the line joining the
/// histogram peak to the far end of the occupied range.
pub fn triangle_threshold(gray: &GrayImage) -> u8 {
    let mut hist = histogram(gray).map(|c| c as i64);

    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return 0;
    };
    let last = hist.iter().rposition(|&c| c > 0).unwrap_or(first);

    let mut left = first.saturating_sub(1);
    let right = (last + 1).min(255);

    let mut max_idx = 0usize;
    for (i, &c) in hist.iter().enumerate() {
        if c > hist[max_idx] {
            max_idx = i;
        }
    }

    // Work on the longer tail; mirror the histogram when it lies left of the peak.
    let flipped = max_idx - left.min(max_idx) < right.saturating_sub(max_idx);
    if flipped {
        hist.reverse();
        left = 255 - right;
        max_idx = 255 - max_idx;
    }

    let mut thresh = left;
    let a = hist[max_idx];
    let b = left as i64 - max_idx as i64;
    let mut dist = 0i64;
    for i in (left + 1)..=max_idx {
        let d = a * i as i64 + b * hist[i];
        if d > dist {
            dist = d;
            thresh = i;
        }
    }
    let thresh = thresh.saturating_sub(1);

    if flipped { (255 - thresh) as u8 } else { thresh as u8 }
}

/// Binarize with a fixed threshold. `invert` swaps the output polarity.
pub fn apply_threshold(gray: &GrayImage, threshold: u8, invert: bool) -> GrayImage {
    let (on, off) = if invert { (0u8, 255u8) } else { (255u8, 0u8) };
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > threshold {
            Luma([on])
        } else {
            Luma([off])
        }
    })
}

// -- Local thresholds --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveKind {
    Mean,
    Gaussian,
}

/// Local threshold `T(x, y) = local_mean(x, y) - c` over a `block_size`
/// neighbourhood. `block_size` is normalised to an odd value >= 3.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, c: f32, kind: AdaptiveKind) -> GrayImage {
    let block = odd_kernel(block_size, 3);
    let (width, height) = gray.dimensions();
    let c = f64::from(c);

    match kind {
        AdaptiveKind::Mean => {
            let integral = IntegralImage::new(gray);
            let radius = block / 2;
            ImageBuffer::from_fn(width, height, |x, y| {
                let threshold = integral.region_mean(x, y, radius) - c;
                let v = f64::from(gray.get_pixel(x, y).0[0]);
                Luma([if v > threshold { 255 } else { 0 }])
            })
        }
        AdaptiveKind::Gaussian => {
            let blurred = gaussian_blur_f32(gray, sigma_for_kernel(block));
            ImageBuffer::from_fn(width, height, |x, y| {
                let threshold = f64::from(blurred.get_pixel(x, y).0[0]) - c;
                let v = f64::from(gray.get_pixel(x, y).0[0]);
                Luma([if v > threshold { 255 } else { 0 }])
            })
        }
    }
}

/// Sauvola threshold `T = m * (1 + k * (s / r - 1))` with local mean `m` and
/// standard deviation `s`.
pub fn sauvola_threshold(gray: &GrayImage, window_size: u32, k: f32, r: f32) -> GrayImage {
    let window = odd_kernel(window_size, 3);
    let radius = window / 2;
    let integral = IntegralImage::new(gray);
    let (k, r) = (f64::from(k), f64::from(r).max(1e-6));

    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let (mean, variance) = integral.region_stats(x, y, radius);
        let threshold = mean * (1.0 + k * (variance.sqrt() / r - 1.0));
        let v = f64::from(gray.get_pixel(x, y).0[0]);
        Luma([if v > threshold { 255 } else { 0 }])
    })
}

// -- Tests -------------------------------------------------------------------------
