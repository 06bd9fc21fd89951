// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binarization — reduce a page to black ink on white paper.
//
// Every run is preprocess (grayscale, optional blur, optional CLAHE) →
// threshold → postprocess (optional open / close). The output is always a
// single-channel image holding only 0 and 255.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::edges::canny;
use imageproc::region_labelling::{Connectivity, connected_components};
use scanwerk_core::config::{
    AdaptiveOptions, BinarizationConfig, BinarizationMethod, CombinedWeights, PostprocessOptions,
    PreprocessOptions, SauvolaOptions,
};
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::{BinarizationQuality, ImageFeatures};
use tracing::{debug, info, instrument};

use crate::image::PixelBuffer;
use crate::image::filters::{clahe, gaussian_blur};
use crate::image::morphology::{self, StructuringElement};
use crate::image::stats::{laplacian_variance, variance};
use crate::image::threshold::{
    AdaptiveKind, adaptive_threshold, apply_threshold, histogram, otsu_threshold, sauvola_threshold,
    triangle_threshold,
};

/// Illumination variance above which local thresholds are preferred.
const UNEVEN_ILLUMINATION: f64 = 2000.0;

/// Connected ink components smaller than this count as noise.
const SPECK_AREA: u32 = 50;

#[derive(Debug, Default, Clone, Copy)]
pub struct Binarizer;

impl Binarizer {
    pub fn new() -> Self {
        Self
    }

    /// Full binarization run. The result is single-channel.
    #[instrument(skip_all, fields(method = %config.method.kind()))]
    pub fn binarize(&self, image: &PixelBuffer, config: &BinarizationConfig) -> Result<PixelBuffer> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("empty image".into()));
        }
        let gray = self.preprocess(image, &config.preprocess);
        let binary = self.threshold(&gray, &config.method)?;
        let binary = self.postprocess(&binary, &config.postprocess);
        info!(width = binary.width(), height = binary.height(), "Binarization finished");
        Ok(PixelBuffer::Gray(binary))
    }

    /// Grayscale, then the optional blur and CLAHE.
    pub fn preprocess(&self, image: &PixelBuffer, opts: &PreprocessOptions) -> GrayImage {
        let mut gray = image.to_gray();
        if opts.denoise && opts.blur_kernel > 0 {
            gray = gaussian_blur(&gray, opts.blur_kernel);
        }
        if opts.enhance_contrast {
            gray = clahe(&gray, 2.0, 8);
        }
        gray
    }

    /// Apply one thresholding algorithm to an already preprocessed plane.
    pub fn threshold(&self, gray: &GrayImage, method: &BinarizationMethod) -> Result<GrayImage> {
        match method {
            BinarizationMethod::AdaptiveGaussian(opts) => Ok(adaptive(gray, opts, AdaptiveKind::Gaussian)),
            BinarizationMethod::AdaptiveMean(opts) => Ok(adaptive(gray, opts, AdaptiveKind::Mean)),
            BinarizationMethod::Otsu => {
                let t = otsu_threshold(gray);
                debug!(threshold = t, "Otsu threshold");
                Ok(apply_threshold(gray, t, false))
            }
            BinarizationMethod::Triangle => {
                let t = triangle_threshold(gray);
                debug!(threshold = t, "Triangle threshold");
                Ok(apply_threshold(gray, t, false))
            }
            BinarizationMethod::Sauvola(opts) => sauvola(gray, opts),
            BinarizationMethod::Combined(weights) => self.combined(gray, weights),
            BinarizationMethod::Auto => {
                let features = self.analyze_features(gray);
                let chosen = auto_select_method(&features);
                info!(method = %chosen.kind(), ?features, "Auto-selected binarization method");
                self.threshold(gray, &chosen)
            }
        }
    }

    /// Weighted vote of several methods, re-thresholded at the midpoint.
    /// Methods with zero weight are not run.
    pub fn combined(&self, gray: &GrayImage, weights: &CombinedWeights) -> Result<GrayImage> {
        let members = [
            (weights.adaptive_gaussian, BinarizationMethod::AdaptiveGaussian(AdaptiveOptions::default())),
            (weights.adaptive_mean, BinarizationMethod::AdaptiveMean(AdaptiveOptions::default())),
            (weights.otsu, BinarizationMethod::Otsu),
            (weights.triangle, BinarizationMethod::Triangle),
        ];
        if members.iter().any(|(w, _)| *w < 0.0) {
            return Err(ScanError::invalid("combined", "weights must not be negative"));
        }
        let total: f32 = members.iter().map(|(w, _)| w).sum();
        if total <= 0.0 {
            return Err(ScanError::invalid("combined", "at least one weight must be positive"));
        }

        let mut votes = vec![0.0f32; gray.as_raw().len()];
        for (weight, method) in members.iter().filter(|(w, _)| *w > 0.0) {
            let binary = self.threshold(gray, method)?;
            for (acc, &v) in votes.iter_mut().zip(binary.as_raw()) {
                *acc += f32::from(v) * weight;
            }
        }
        let width = gray.width() as usize;
        Ok(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            let v = votes[y as usize * width + x as usize] / total;
            Luma([if v >= 127.5 { 255 } else { 0 }])
        }))
    }

    /// Optional opening (drops isolated white specks) then closing (fills
    /// pin holes) with a square element.
    pub fn postprocess(&self, binary: &GrayImage, opts: &PostprocessOptions) -> GrayImage {
        let element = StructuringElement::square(opts.morphology_kernel_size.max(1));
        let mut out = binary.clone();
        if opts.remove_noise {
            out = morphology::open(&out, element, 1);
        }
        if opts.fill_holes {
            out = morphology::close(&out, element, 1);
        }
        out
    }

    /// The four statistics that drive [`auto_select_method`].
    pub fn analyze_features(&self, gray: &GrayImage) -> ImageFeatures {
        let illumination_variance = variance(&gaussian_blur(gray, 21));

        let hist = histogram(gray);
        let total = hist.iter().sum::<u64>().max(1) as f64;
        let (mut m1, mut m2) = (0.0f64, 0.0f64);
        for (i, &count) in hist.iter().enumerate() {
            let p = count as f64 / total;
            m1 += p * i as f64;
            m2 += p * (i * i) as f64;
        }
        let contrast = (m2 - m1 * m1) / 65536.0;

        let noise_level = laplacian_variance(gray) / 10_000.0;

        let edges = canny(gray, 50.0, 150.0);
        let edge_pixels = edges.as_raw().iter().filter(|&&v| v > 0).count();
        let edge_density = edge_pixels as f64 / edges.as_raw().len().max(1) as f64;

        ImageFeatures {
            illumination_variance,
            contrast,
            noise_level,
            edge_density,
        }
    }

    /// Score a binarization against the plane it was made from.
    ///
    /// Overall quality is `0.4 * edge_preservation + 0.4 * separation +
    /// 0.2 * (1 - noise_ratio)`.
    pub fn evaluate_quality(&self, original: &GrayImage, binary: &GrayImage) -> Result<BinarizationQuality> {
        if original.dimensions() != binary.dimensions() {
            return Err(ScanError::invalid(
                "evaluate_quality",
                format!("size mismatch: {:?} vs {:?}", original.dimensions(), binary.dimensions()),
            ));
        }

        let original_edges = canny(original, 50.0, 150.0);
        let binary_edges = canny(binary, 50.0, 150.0);
        let (mut shared, mut source) = (0u64, 0u64);
        for (&a, &b) in original_edges.as_raw().iter().zip(binary_edges.as_raw()) {
            if a > 0 {
                source += 1;
                if b > 0 {
                    shared += 1;
                }
            }
        }
        let edge_preservation = shared as f64 / source.max(1) as f64;

        let (mut fg, mut bg) = ((0u64, 0.0f64), (0u64, 0.0f64));
        for (&g, &b) in original.as_raw().iter().zip(binary.as_raw()) {
            match b {
                0 => {
                    fg.0 += 1;
                    fg.1 += f64::from(g);
                }
                255 => {
                    bg.0 += 1;
                    bg.1 += f64::from(g);
                }
                _ => {}
            }
        }
        let separation = if fg.0 > 0 && bg.0 > 0 {
            (bg.1 / bg.0 as f64 - fg.1 / fg.0 as f64).abs() / 255.0
        } else {
            0.0
        };

        let noise_ratio = speck_ratio(binary);
        let overall = edge_preservation * 0.4 + separation * 0.4 + (1.0 - noise_ratio) * 0.2;
        debug!(edge_preservation, separation, noise_ratio, overall, "Binarization quality");
        Ok(BinarizationQuality {
            edge_preservation,
            separation,
            noise_ratio,
            overall,
        })
    }
}

/// Choose a method from image statistics. Pure: equal features give equal
/// choices.
///
/// Uneven lighting wants an adaptive Gaussian threshold (wider block and
/// larger offset when the page is also noisy); flat low-contrast pages use
/// Sauvola; everything else Otsu.
pub fn auto_select_method(features: &ImageFeatures) -> BinarizationMethod {
    if features.illumination_variance > UNEVEN_ILLUMINATION {
        if features.noise_level > 0.3 {
            BinarizationMethod::AdaptiveGaussian(AdaptiveOptions {
                block_size: 15,
                c_constant: 3.0,
            })
        } else {
            BinarizationMethod::AdaptiveGaussian(AdaptiveOptions {
                block_size: 11,
                c_constant: 2.0,
            })
        }
    } else if features.contrast < 0.3 {
        BinarizationMethod::Sauvola(SauvolaOptions {
            window_size: 15,
            k: 0.3,
            ..SauvolaOptions::default()
        })
    } else {
        BinarizationMethod::Otsu
    }
}

fn adaptive(gray: &GrayImage, opts: &AdaptiveOptions, kind: AdaptiveKind) -> GrayImage {
    debug!(block = opts.block_size, c = opts.c_constant, ?kind, "Adaptive threshold");
    adaptive_threshold(gray, opts.block_size, opts.c_constant, kind)
}

fn sauvola(gray: &GrayImage, opts: &SauvolaOptions) -> Result<GrayImage> {
    if opts.r <= 0.0 {
        return Err(ScanError::invalid("sauvola", "dynamic range r must be positive"));
    }
    debug!(window = opts.window_size, k = opts.k, r = opts.r, "Sauvola threshold");
    Ok(sauvola_threshold(gray, opts.window_size, opts.k, opts.r))
}

/// Share of ink components (8-connected black regions) smaller than
/// [`SPECK_AREA`].
fn speck_ratio(binary: &GrayImage) -> f64 {
    let ink = apply_threshold(binary, 127, true);
    let labels = connected_components(&ink, Connectivity::Eight, Luma([0u8]));
    let components = labels.as_raw().iter().copied().max().unwrap_or(0) as usize;
    if components == 0 {
        return 0.0;
    }
    let mut areas = vec![0u32; components + 1];
    for &label in labels.as_raw() {
        areas[label as usize] += 1;
    }
    let small = areas[1..].iter().filter(|&&a| a < SPECK_AREA).count();
    small as f64 / components as f64
}
