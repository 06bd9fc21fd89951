// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neighbourhood filters on 8-bit planes: blurs, 3x3 convolution, edge
// magnitude, edge-preserving denoisers (bilateral, non-local means) and
// histogram equalisation. Non-local means and CLAHE are implemented here;
// everything else wraps imageproc.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{bilateral_filter, filter3x3, gaussian_blur_f32, median_filter};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::threshold::{histogram, odd_kernel, sigma_for_kernel};

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// -- Blurs ------------------------------------------------------------------------

/// Gaussian blur with the sigma implied by an (odd-normalised) kernel size.
/// Sizes of 0 or 1 return a copy.
pub fn gaussian_blur(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return gray.clone();
    }
    gaussian_blur_f32(gray, sigma_for_kernel(odd_kernel(kernel_size, 3)))
}

/// Gaussian blur with an explicit sigma. Non-positive sigmas return a copy.
pub fn gaussian_blur_sigma(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return gray.clone();
    }
    gaussian_blur_f32(gray, sigma)
}

/// Median blur over a square window of (odd-normalised) `kernel_size`.
pub fn median_blur(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    let k = odd_kernel(kernel_size, 3);
    median_filter(gray, k / 2, k / 2)
}

// -- Convolution ------------------------------------------------------------------

/// 3x3 correlation with replicated borders, rounded and saturated to 8 bits.
pub fn convolve3x3(gray: &GrayImage, kernel: &[f32; 9]) -> GrayImage {
    let raw: ImageBuffer<Luma<f32>, Vec<f32>> = filter3x3::<Luma<u8>, f32, f32>(gray, kernel);
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| Luma([to_u8(raw.get_pixel(x, y).0[0])]))
}

/// Sobel gradient magnitude per pixel.
pub fn sobel_magnitude(gray: &GrayImage) -> Vec<f32> {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    gx.as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&a, &b)| (f32::from(a)).hypot(f32::from(b)))
        .collect()
}

// -- Edge-preserving denoise ---------------------------------------------------------

/// Bilateral filter on a single plane over a `diameter`-wide window
/// (odd-normalised). Borders are replicated.
pub fn bilateral(gray: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    bilateral_filter(gray, odd_kernel(diameter, 3), sigma_color.max(1e-3), sigma_space.max(1e-3))
}

/// Non-local means on a single plane.
///
/// For every offset in the search window the squared difference image is
/// integrated once, which makes the per-pixel patch distance O(1).
pub fn non_local_means(gray: &GrayImage, h: f32, template_window: u32, search_window: u32) -> GrayImage {
    let (w, ht) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || ht == 0 {
        return gray.clone();
    }
    let t = (odd_kernel(template_window, 3) / 2) as i64;
    let s = (odd_kernel(search_window, 3) / 2) as i64;
    let h2 = f64::from(h.max(1e-3)).powi(2);
    let src: Vec<f64> = gray.as_raw().iter().map(|&v| f64::from(v)).collect();

    let mut acc = vec![0.0f64; w * ht];
    let mut wsum = vec![0.0f64; w * ht];
    let stride = w + 1;
    let mut integral = vec![0.0f64; stride * (ht + 1)];

    for dy in -s..=s {
        for dx in -s..=s {
            // Integral of (I(p) - I(p + d))^2; out-of-range partners count as 0.
            for y in 0..ht {
                let mut row = 0.0f64;
                for x in 0..w {
                    let (px, py) = (x as i64 + dx, y as i64 + dy);
                    let d2 = if px >= 0 && py >= 0 && (px as usize) < w && (py as usize) < ht {
                        let diff = src[y * w + x] - src[py as usize * w + px as usize];
                        diff * diff
                    } else {
                        0.0
                    };
                    row += d2;
                    integral[(y + 1) * stride + x + 1] = row + integral[y * stride + x + 1];
                }
            }

            for y in 0..ht {
                for x in 0..w {
                    let (px, py) = (x as i64 + dx, y as i64 + dy);
                    if px < 0 || py < 0 || px as usize >= w || py as usize >= ht {
                        continue;
                    }
                    let x1 = (x as i64 - t).max(0) as usize;
                    let y1 = (y as i64 - t).max(0) as usize;
                    let x2 = ((x as i64 + t + 1) as usize).min(w);
                    let y2 = ((y as i64 + t + 1) as usize).min(ht);
                    let area = ((x2 - x1) * (y2 - y1)) as f64;
                    let ssd = integral[y2 * stride + x2] - integral[y1 * stride + x2]
                        - integral[y2 * stride + x1]
                        + integral[y1 * stride + x1];
                    let weight = (-(ssd / area) / h2).exp();
                    acc[y * w + x] += weight * src[py as usize * w + px as usize];
                    wsum[y * w + x] += weight;
                }
            }
        }
    }

    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let i = y as usize * w + x as usize;
        Luma([(acc[i] / wsum[i].max(f64::EPSILON)).round().clamp(0.0, 255.0) as u8])
    })
}

// -- Histogram equalisation ----------------------------------------------------------

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `grid x grid` tile layout; each tile gets its own
/// clipped equalisation LUT and pixels blend the four nearest tile LUTs
/// bilinearly. A `clip_limit` of zero or less disables clipping.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let grid_x = grid.clamp(1, w);
    let grid_y = grid.clamp(1, h);
    let tile_w = w.div_ceil(grid_x);
    let tile_h = h.div_ceil(grid_y);

    let mut luts = vec![[0u8; 256]; (grid_x * grid_y) as usize];
    for ty in 0..grid_y {
        for tx in 0..grid_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            let mut hist = [0u64; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = u64::from(x1.saturating_sub(x0)) * u64::from(y1.saturating_sub(y0));
            luts[(ty * grid_x + tx) as usize] = tile_lut(&mut hist, area, clip_limit);
        }
    }

    let lut_at = |tx: i64, ty: i64, v: u8| -> f32 {
        let tx = tx.clamp(0, i64::from(grid_x) - 1) as u32;
        let ty = ty.clamp(0, i64::from(grid_y) - 1) as u32;
        f32::from(luts[(ty * grid_x + tx) as usize][v as usize])
    };

    ImageBuffer::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let (tx, ty) = (fx.floor() as i64, fy.floor() as i64);
        let (ax, ay) = (fx - tx as f32, fy - ty as f32);

        let top = lut_at(tx, ty, v) * (1.0 - ax) + lut_at(tx + 1, ty, v) * ax;
        let bottom = lut_at(tx, ty + 1, v) * (1.0 - ax) + lut_at(tx + 1, ty + 1, v) * ax;
        Luma([to_u8(top * (1.0 - ay) + bottom * ay)])
    })
}

fn tile_lut(hist: &mut [u64; 256], area: u64, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u64).max(1);
        let mut excess = 0u64;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let batch = excess / 256;
        let residual = excess - batch * 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            let mut left = residual;
            let mut i = 0usize;
            while i < 256 && left > 0 {
                hist[i] += 1;
                left -= 1;
                i += step;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = to_u8(cumulative as f32 * scale);
    }
    lut
}

/// Global histogram equalisation. A single-level plane is returned as is.
pub fn equalize(gray: &GrayImage) -> GrayImage {
    let hist = histogram(gray);
    if hist.iter().filter(|&&c| c > 0).count() <= 1 {
        return gray.clone();
    }
    equalize_histogram(gray)
}

/// Power-law lookup table: `((i / 255) ^ (1 / gamma)) * 255`, truncated.
pub fn gamma_lut(gamma: f32) -> [u8; 256] {
    let inv = 1.0 / gamma.max(1e-3);
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = ((i as f32 / 255.0).powf(inv) * 255.0).clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Lookup table for the saturated affine map `|alpha * v + beta|`.
pub fn scale_abs_lut(alpha: f32, beta: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = to_u8((alpha * i as f32 + beta).abs());
    }
    lut
}

// -- Tests -------------------------------------------------------------------------
