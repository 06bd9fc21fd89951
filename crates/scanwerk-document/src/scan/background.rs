// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background normalisation — flatten uneven lighting and push the paper
// towards white. Five interchangeable strategies plus shadow removal,
// illumination normalisation and white-canvas document extraction.

use image::{GrayImage, ImageBuffer, Luma, Rgb};
use scanwerk_core::config::{
    AdaptiveRemovalOptions, BackgroundConfig, ColorSeparationOptions, MedianDivisionOptions,
    NaturalEnhancementOptions, UltraWhiteningOptions,
};
use scanwerk_core::error::{Result, ScanError};
use tracing::{debug, info, instrument};

use crate::image::color::{hsv_value, lab_to_rgb, rgb_to_lab};
use crate::image::filters::{gaussian_blur, gaussian_blur_sigma, median_blur, scale_abs_lut, sobel_magnitude};
use crate::image::morphology::{self, StructuringElement};
use crate::image::stats::{masked_mean, percentile};
use crate::image::threshold::{AdaptiveKind, adaptive_threshold, odd_kernel, otsu_threshold};
use crate::image::PixelBuffer;

/// Background brightness the whitening passes aim for.
const TARGET_WHITE: f32 = 250.0;

/// Share of the processed result in the median-division blend.
const DIVISION_BLEND: f32 = 0.85;

/// Applies one of the background strategies. Stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundNormalizer;

impl BackgroundNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch to the strategy selected by `config`.
    #[instrument(skip_all, fields(method = %config.method()))]
    pub fn normalize(&self, image: &PixelBuffer, config: &BackgroundConfig) -> Result<PixelBuffer> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("empty image".into()));
        }
        match config {
            BackgroundConfig::MedianDivision(opts) => self.median_division(image, opts),
            BackgroundConfig::UltraWhitening(opts) => self.ultra_whitening(image, opts),
            BackgroundConfig::NaturalEnhancement(opts) => self.natural_enhancement(image, opts),
            BackgroundConfig::AdaptiveThreshold(opts) => self.adaptive_removal(image, opts),
            BackgroundConfig::ColorSeparation(opts) => self.color_separation(image, opts),
        }
    }

    // -- Strategies -----------------------------------------------------------

    /// Flat-field each channel against its median background, lift the
    /// paper towards white and finish with a brightness/contrast map.
    pub fn median_division(&self, image: &PixelBuffer, opts: &MedianDivisionOptions) -> Result<PixelBuffer> {
        let kernel = odd_kernel(opts.kernel_size, 3);
        info!(kernel, "Median-division whitening");
        image.map_planes(|plane| {
            Ok(median_division_plane(
                plane,
                kernel,
                opts.brightness_adjustment,
                opts.contrast_adjustment,
            ))
        })
    }

    /// Aggressive whitening driven by three background signals: brightness
    /// percentile, local smoothness and Otsu.
    pub fn ultra_whitening(&self, image: &PixelBuffer, opts: &UltraWhiteningOptions) -> Result<PixelBuffer> {
        if !(1.0..=2.0).contains(&opts.whitening_strength) {
            return Err(ScanError::invalid(
                "ultra_whitening",
                format!("whitening_strength {} outside 1.0..=2.0", opts.whitening_strength),
            ));
        }
        if !(0.5..=0.9).contains(&opts.background_threshold) {
            return Err(ScanError::invalid(
                "ultra_whitening",
                format!("background_threshold {} outside 0.5..=0.9", opts.background_threshold),
            ));
        }
        info!(strength = opts.whitening_strength, "Ultra whitening");
        image.map_planes(|plane| Ok(ultra_whiten_plane(plane, opts.whitening_strength, opts.background_threshold)))
    }

    /// Gentle mean/spread remap blended with the original.
    pub fn natural_enhancement(&self, image: &PixelBuffer, opts: &NaturalEnhancementOptions) -> Result<PixelBuffer> {
        if !(0.0..=1.0).contains(&opts.preserve_ratio) {
            return Err(ScanError::invalid(
                "natural_enhancement",
                format!("preserve_ratio {} outside 0.0..=1.0", opts.preserve_ratio),
            ));
        }
        info!(
            brightness = opts.brightness_boost,
            contrast = opts.contrast_boost,
            "Natural background enhancement"
        );
        image.map_planes(|plane| {
            Ok(natural_plane(
                plane,
                opts.brightness_boost,
                opts.contrast_boost,
                opts.preserve_ratio,
            ))
        })
    }

    /// Local adaptive threshold with morphological cleanup. The output is
    /// black-and-white in the input's channel layout.
    pub fn adaptive_removal(&self, image: &PixelBuffer, opts: &AdaptiveRemovalOptions) -> Result<PixelBuffer> {
        info!(block = opts.block_size, c = opts.c_constant, "Adaptive background removal");
        let blurred = gaussian_blur(&image.to_gray(), 5);
        let binary = adaptive_threshold(&blurred, opts.block_size, opts.c_constant, AdaptiveKind::Gaussian);
        let element = StructuringElement::square(opts.morphology_kernel_size.max(1));
        let cleaned = morphology::open(&morphology::close(&binary, element, 1), element, 1);
        Ok(image.like(cleaned))
    }

    /// Keep pixels darker than `background_color_threshold` (HSV value) and
    /// paint everything else white. Needs a colour image.
    pub fn color_separation(&self, image: &PixelBuffer, opts: &ColorSeparationOptions) -> Result<PixelBuffer> {
        let PixelBuffer::Rgb(rgb) = image else {
            return Err(ScanError::UnsupportedChannels {
                stage: "color_separation",
                channels: image.channels(),
            });
        };
        info!(threshold = opts.background_color_threshold, "Colour-based separation");

        let value = hsv_value(rgb);
        let mask = ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
            Luma([if value.get_pixel(x, y).0[0] >= opts.background_color_threshold { 255u8 } else { 0 }])
        });
        let element = StructuringElement::Ellipse { size: 5 };
        let iterations = opts.morphology_iterations.max(1);
        let mask = morphology::open(&morphology::close(&mask, element, iterations), element, iterations);

        Ok(PixelBuffer::Rgb(ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] > 0 {
                Rgb([255, 255, 255])
            } else {
                *rgb.get_pixel(x, y)
            }
        })))
    }

    // -- Auxiliary operations -------------------------------------------------

    /// Replace pixels that differ strongly from a median background (and
    /// their dilated neighbourhood) with that background.
    #[instrument(skip(self, image))]
    pub fn remove_shadows(&self, image: &PixelBuffer, shadow_threshold: u8, dilate_iterations: u32) -> Result<PixelBuffer> {
        let gray = image.to_gray();
        let background = median_blur(&gray, 19);
        let diff = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            let d = gray.get_pixel(x, y).0[0].abs_diff(background.get_pixel(x, y).0[0]);
            Luma([if d > shadow_threshold { 255u8 } else { 0 }])
        });
        let mask = morphology::dilate_n(&diff, StructuringElement::Ellipse { size: 5 }, dilate_iterations);
        let replaced = mask.pixels().filter(|p| p.0[0] > 0).count();
        debug!(replaced, "Shadow pixels replaced");

        image.map_planes(|plane| {
            Ok(ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
                if mask.get_pixel(x, y).0[0] > 0 {
                    *background.get_pixel(x, y)
                } else {
                    *plane.get_pixel(x, y)
                }
            }))
        })
    }

    /// Subtract a heavily blurred lightness field and re-centre on 128.
    /// Colour images are processed on the Lab lightness channel.
    #[instrument(skip(self, image))]
    pub fn normalize_illumination(&self, image: &PixelBuffer, sigma: f32) -> Result<PixelBuffer> {
        if sigma <= 0.0 {
            return Err(ScanError::invalid("normalize_illumination", "sigma must be positive"));
        }
        Ok(match image {
            PixelBuffer::Gray(gray) => PixelBuffer::Gray(flatten_field(gray, sigma)),
            PixelBuffer::Rgb(rgb) => {
                let [l, a, b] = rgb_to_lab(rgb);
                PixelBuffer::Rgb(lab_to_rgb(&[flatten_field(&l, sigma), a, b]))
            }
        })
    }

    /// Saturated `|alpha * v + beta|` on every sample.
    pub fn enhance_background_contrast(&self, image: &PixelBuffer, alpha: f32, beta: f32) -> PixelBuffer {
        debug!(alpha, beta, "Background contrast");
        image.apply_lut(&scale_abs_lut(alpha, beta))
    }

    /// Copy detected content onto a pure white canvas.
    ///
    /// Content is the union of three signals: darker than `text_threshold`,
    /// below a local adaptive threshold, or in the top 15% of gradient
    /// magnitude. The union is closed and opened before use.
    #[instrument(skip(self, image))]
    pub fn create_white_background_document(&self, image: &PixelBuffer, text_threshold: u8) -> Result<PixelBuffer> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("empty image".into()));
        }
        let gray = image.to_gray();
        let adaptive = adaptive_threshold(&gray, 21, 10.0, AdaptiveKind::Gaussian);
        let gradient = sobel_magnitude(&gray);
        let edge_threshold = percentile(&mut gradient.clone(), 85.0);

        let width = gray.width() as usize;
        let mask = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            let dark = gray.get_pixel(x, y).0[0] < text_threshold;
            let local = adaptive.get_pixel(x, y).0[0] == 0;
            let edge = gradient[y as usize * width + x as usize] > edge_threshold;
            Luma([if dark || local || edge { 255u8 } else { 0 }])
        });
        let mask = morphology::close(&mask, StructuringElement::Ellipse { size: 3 }, 1);
        let mask = morphology::open(&mask, StructuringElement::square(2), 1);

        let content = mask.pixels().filter(|p| p.0[0] > 0).count();
        info!(content, "White-background document");
        image.map_planes(|plane| {
            Ok(ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
                if mask.get_pixel(x, y).0[0] > 0 {
                    *plane.get_pixel(x, y)
                } else {
                    Luma([255])
                }
            }))
        })
    }
}

// -- Per-plane kernels ------------------------------------------------------------

fn plane_values(plane: &GrayImage) -> Vec<f32> {
    plane.as_raw().iter().map(|&v| f32::from(v)).collect()
}

fn mean_of(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64) as f32
}

/// Saturating cast used for intermediate threshold images.
fn to_plane(values: &[f32], width: u32, height: u32) -> GrayImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Luma([values[(y * width + x) as usize].clamp(0.0, 255.0) as u8])
    })
}

/// Pixels strictly above the plane's Otsu threshold.
fn otsu_background(values: &[f32], width: u32, height: u32) -> Vec<bool> {
    let plane = to_plane(values, width, height);
    let t = otsu_threshold(&plane);
    plane.as_raw().iter().map(|&v| v > t).collect()
}

fn median_division_plane(plane: &GrayImage, kernel: u32, brightness: f32, contrast: f32) -> GrayImage {
    let (w, h) = plane.dimensions();
    let src = plane_values(plane);
    let background = median_blur(plane, kernel);

    let mut normalized: Vec<f32> = src
        .iter()
        .zip(background.as_raw())
        .map(|(&v, &b)| v / f32::from(b).max(1.0) * 255.0)
        .collect();

    let target_mean = (mean_of(&src) * 1.3).min(240.0);
    let current_mean = mean_of(&normalized);
    if current_mean > 0.0 {
        let scale = (target_mean / current_mean).clamp(1.0, 2.0);
        normalized.iter_mut().for_each(|v| *v *= scale);
    }

    let paper = otsu_background(&normalized, w, h);
    if let Some(bg_mean) = masked_mean(&normalized, &paper)
        && bg_mean < 240.0
    {
        let factor = if bg_mean > 0.0 { (TARGET_WHITE / bg_mean).min(1.5) } else { 1.2 };
        for (v, _) in normalized.iter_mut().zip(&paper).filter(|(_, m)| **m) {
            *v = (*v * factor).max(*v).min(255.0);
        }
    }

    let brightness_shift = (brightness - 1.0) * 45.0;
    let mut adjusted: Vec<f32> = normalized
        .iter()
        .zip(&src)
        .map(|(&n, &o)| {
            let blended = n.clamp(0.0, 255.0) * DIVISION_BLEND + o * (1.0 - DIVISION_BLEND);
            blended * contrast + brightness_shift
        })
        .collect();

    let residual = otsu_background(&adjusted, w, h);
    if let Some(bg_mean) = masked_mean(&adjusted, &residual)
        && bg_mean < 245.0
    {
        for (v, _) in adjusted.iter_mut().zip(&residual).filter(|(_, m)| **m) {
            *v = (*v * 1.05 + 10.0).max(*v).min(255.0);
        }
    }

    // Background pixels only ever get brighter.
    for (i, v) in adjusted.iter_mut().enumerate() {
        if paper[i] || residual[i] {
            *v = v.max(src[i]);
        }
    }
    to_plane(&adjusted, w, h)
}

fn ultra_whiten_plane(plane: &GrayImage, strength: f32, background_threshold: f32) -> GrayImage {
    let (w, h) = plane.dimensions();
    let src = plane_values(plane);
    let mask = ultra_background_mask(plane, &src, background_threshold);

    let mut result = src.clone();
    if let Some(bg_mean) = masked_mean(&src, &mask)
        && bg_mean < TARGET_WHITE
    {
        let factor = if bg_mean > 0.0 { (TARGET_WHITE / bg_mean).min(strength) } else { strength };
        let lift = (TARGET_WHITE - bg_mean * factor) * 0.3;
        for (v, _) in result.iter_mut().zip(&mask).filter(|(_, m)| **m) {
            *v = (*v * factor + lift).max(*v).min(255.0);
        }
    }

    let current_mean = mean_of(&result);
    if current_mean < 200.0 {
        let boost = if current_mean > 0.0 { (220.0 / current_mean).min(1.2) } else { 1.2 };
        result.iter_mut().for_each(|v| *v = (*v * boost).max(*v).min(255.0));
    }

    let residual = otsu_background(&result, w, h);
    if let Some(bg_mean) = masked_mean(&result, &residual)
        && bg_mean < 248.0
    {
        for (v, _) in result.iter_mut().zip(&residual).filter(|(_, m)| **m) {
            *v = (*v * 1.02 + 3.0).max(*v).min(255.0);
        }
    }
    debug!(mean_before = mean_of(&src), mean_after = mean_of(&result), "Plane whitened");
    to_plane(&result, w, h)
}

/// Paper candidates: bright or locally smooth, and above the Otsu threshold.
fn ultra_background_mask(plane: &GrayImage, src: &[f32], background_threshold: f32) -> Vec<bool> {
    let (w, h) = plane.dimensions();
    let bright_level = percentile(&mut src.to_vec(), f64::from(background_threshold) * 100.0);
    let variance = local_variance(src, w, h, 2);
    let smooth_level = percentile(&mut variance.clone(), 30.0);
    let otsu_t = f32::from(otsu_threshold(plane));
    src.iter()
        .zip(&variance)
        .map(|(&v, &var)| (v >= bright_level || var <= smooth_level) && v > otsu_t)
        .collect()
}

/// Variance over a `(2r+1)^2` window: the box mean of squared deviations
/// from the box mean.
fn local_variance(values: &[f32], width: u32, height: u32, radius: u32) -> Vec<f32> {
    let local_mean = box_mean(values, width, height, radius);
    let deviation: Vec<f32> = values.iter().zip(&local_mean).map(|(&v, &m)| (v - m).powi(2)).collect();
    box_mean(&deviation, width, height, radius)
}

fn natural_plane(plane: &GrayImage, brightness: f32, contrast: f32, preserve: f32) -> GrayImage {
    let (w, h) = plane.dimensions();
    let src = plane_values(plane);
    let mean = mean_of(&src);
    let std = (src.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / src.len().max(1) as f32).sqrt();
    let target_mean = (mean * brightness).min(240.0);
    let target_std = std * contrast;

    let out: Vec<f32> = src
        .iter()
        .map(|&v| {
            let enhanced = if std > 0.0 {
                (v - mean) * (target_std / std) + target_mean
            } else {
                v + (target_mean - mean)
            };
            enhanced.clamp(0.0, 255.0) * (1.0 - preserve) + v * preserve
        })
        .collect();
    to_plane(&out, w, h)
}

/// `L - blur(L) + 128`, saturated.
fn flatten_field(plane: &GrayImage, sigma: f32) -> GrayImage {
    let field = gaussian_blur_sigma(plane, sigma);
    ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
        let v = i16::from(plane.get_pixel(x, y).0[0]) - i16::from(field.get_pixel(x, y).0[0]) + 128;
        Luma([v.clamp(0, 255) as u8])
    })
}

/// Mean over a `(2r+1)^2` window, averaging only in-bounds samples.
fn box_mean(values: &[f32], width: u32, height: u32, radius: u32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let stride = w + 1;
    let mut table = vec![0.0f64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0.0f64;
        for x in 0..w {
            row += f64::from(values[y * w + x]);
            table[(y + 1) * stride + x + 1] = row + table[y * stride + x + 1];
        }
    }
    let r = radius as usize;
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let (y1, y2) = (y.saturating_sub(r), (y + r + 1).min(h));
        for x in 0..w {
            let (x1, x2) = (x.saturating_sub(r), (x + r + 1).min(w));
            let sum = table[y2 * stride + x2] - table[y1 * stride + x2] - table[y2 * stride + x1]
                + table[y1 * stride + x1];
            out.push((sum / ((x2 - x1) * (y2 - y1)) as f64) as f32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Paper lit from the left: 200 falling to 140, with dark text strokes.
    fn uneven_page() -> (GrayImage, Vec<bool>) {
        let (w, h) = (160u32, 120u32);
        let mut text = vec![false; (w * h) as usize];
        let img = GrayImage::from_fn(w, h, |x, y| {
            let paper = 200.0 - 60.0 * x as f32 / w as f32;
            let is_text = (y % 20) < 3 && (20..140).contains(&x);
            text[(y * w + x) as usize] = is_text;
            Luma([if is_text { 30 } else { paper as u8 }])
        });
        (img, text)
    }

    fn normalizer() -> BackgroundNormalizer {
        BackgroundNormalizer::new()
    }

    #[test]
    fn median_division_never_darkens_paper() {
        let (page, text) = uneven_page();
        let input = PixelBuffer::Gray(page.clone());
        let out = normalizer()
            .median_division(&input, &MedianDivisionOptions::default())
            .unwrap();
        let out = out.to_gray();
        for (i, (a, b)) in page.as_raw().iter().zip(out.as_raw()).enumerate() {
            if !text[i] {
                assert!(b >= a, "pixel {i}: {a} -> {b}");
            }
        }
    }

    #[test]
    fn median_division_flattens_lighting() {
        let (page, _) = uneven_page();
        let out = normalizer()
            .median_division(&PixelBuffer::Gray(page.clone()), &MedianDivisionOptions::default())
            .unwrap()
            .to_gray();
        let spread = |img: &GrayImage| i32::from(img.get_pixel(5, 10).0[0]) - i32::from(img.get_pixel(155, 10).0[0]);
        assert!(spread(&out).abs() < spread(&page).abs());
        assert!(out.get_pixel(155, 10).0[0] > 230);
        assert!(out.get_pixel(60, 1).0[0] < 128, "text survives");
    }

    #[test]
    fn ultra_whitening_never_darkens() {
        let (page, _) = uneven_page();
        let rgb = PixelBuffer::Gray(page.clone()).to_rgb();
        let input = PixelBuffer::Rgb(rgb.clone());
        let out = normalizer()
            .ultra_whitening(&input, &UltraWhiteningOptions::default())
            .unwrap();
        assert_eq!(out.channels(), 3);
        for (a, b) in rgb.as_raw().iter().zip(out.as_raw()) {
            assert!(b >= a);
        }
        assert!(out.mean() > input.mean());
    }

    /// Paper at 240 with a flat 160 patch, smaller than any median window,
    /// and a few dark strokes so Otsu splits ink from everything else.
    fn grey_patch_page() -> GrayImage {
        GrayImage::from_fn(80, 80, |x, y| {
            if y % 10 < 2 && (5..25).contains(&x) {
                Luma([20])
            } else if (30..42).contains(&x) && (30..42).contains(&y) {
                Luma([160])
            } else {
                Luma([240])
            }
        })
    }

    #[test]
    fn flat_grey_patch_counts_as_smooth_paper() {
        let page = grey_patch_page();
        let src = plane_values(&page);
        let centre = 36 * 80 + 36;
        assert_eq!(local_variance(&src, 80, 80, 2)[centre], 0.0);
        let mask = ultra_background_mask(&page, &src, 0.7);
        assert!(mask[centre], "patch interior is paper");
        assert!(!mask[80 + 10], "ink is not paper");
    }

    #[test]
    fn ultra_whitening_lifts_flat_grey_patch() {
        let page = grey_patch_page();
        let out = normalizer()
            .ultra_whitening(&PixelBuffer::Gray(page.clone()), &UltraWhiteningOptions::default())
            .unwrap()
            .into_gray();
        assert!(out.get_pixel(36, 36).0[0] > 160);
        for (a, b) in page.as_raw().iter().zip(out.as_raw()) {
            assert!(b >= a);
        }
    }

    #[test]
    fn ultra_whitening_rejects_out_of_range_strength() {
        let opts = UltraWhiteningOptions {
            whitening_strength: 3.0,
            ..Default::default()
        };
        let img = PixelBuffer::Gray(GrayImage::from_pixel(8, 8, Luma([100])));
        assert!(normalizer().ultra_whitening(&img, &opts).is_err());
    }

    #[test]
    fn natural_enhancement_brightens_dark_capture() {
        let dark = PixelBuffer::Gray(GrayImage::from_fn(40, 40, |x, _| Luma([60 + x as u8])));
        let out = normalizer()
            .natural_enhancement(&dark, &NaturalEnhancementOptions::default())
            .unwrap();
        assert!(out.mean() > dark.mean());
    }

    #[test]
    fn natural_enhancement_on_flat_plane_shifts_mean() {
        let flat = PixelBuffer::Gray(GrayImage::from_pixel(10, 10, Luma([100])));
        let opts = NaturalEnhancementOptions {
            brightness_boost: 1.2,
            contrast_boost: 1.0,
            preserve_ratio: 0.0,
        };
        let out = normalizer().natural_enhancement(&flat, &opts).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 120));
    }

    #[test]
    fn adaptive_removal_keeps_channel_layout() {
        let (page, _) = uneven_page();
        let input = PixelBuffer::Rgb(PixelBuffer::Gray(page).to_rgb());
        let out = normalizer()
            .adaptive_removal(&input, &AdaptiveRemovalOptions::default())
            .unwrap();
        assert_eq!(out.channels(), 3);
        assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn color_separation_needs_colour() {
        let gray = PixelBuffer::Gray(GrayImage::new(4, 4));
        let err = normalizer()
            .color_separation(&gray, &ColorSeparationOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedChannels { channels: 1, .. }));
    }

    #[test]
    fn color_separation_whitens_bright_paper_and_keeps_ink() {
        let rgb = RgbImage::from_fn(60, 60, |x, y| {
            if (20..40).contains(&x) && (20..40).contains(&y) {
                Rgb([20, 30, 120])
            } else {
                Rgb([235, 225, 210])
            }
        });
        let out = normalizer()
            .color_separation(&PixelBuffer::Rgb(rgb), &ColorSeparationOptions::default())
            .unwrap();
        let PixelBuffer::Rgb(out) = out else { panic!("channel count changed") };
        assert_eq!(out.get_pixel(2, 2).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(30, 30).0, [20, 30, 120]);
    }

    #[test]
    fn shadow_removal_replaces_outliers_with_background() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([200]));
        img.put_pixel(30, 30, Luma([10]));
        let out = normalizer()
            .remove_shadows(&PixelBuffer::Gray(img), 100, 3)
            .unwrap()
            .to_gray();
        assert_eq!(out.get_pixel(30, 30).0[0], 200);
    }

    #[test]
    fn illumination_normalization_recentres_flat_field() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(40, 40, Luma([90])));
        let out = normalizer().normalize_illumination(&img, 30.0).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 128));
        assert!(normalizer().normalize_illumination(&img, 0.0).is_err());
    }

    #[test]
    fn white_background_document_clears_paper() {
        let page = GrayImage::from_fn(160, 120, |x, y| {
            let is_text = (y % 20) < 3 && (20..140).contains(&x);
            Luma([if is_text { 30 } else { 200 }])
        });
        let out = normalizer()
            .create_white_background_document(&PixelBuffer::Gray(page), 130)
            .unwrap()
            .to_gray();
        assert_eq!(out.get_pixel(150, 10).0[0], 255);
        assert_eq!(out.get_pixel(60, 1).0[0], 30);
    }

    #[test]
    fn background_contrast_is_saturated_affine() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(2, 2, Luma([100])));
        let out = normalizer().enhance_background_contrast(&img, 1.5, 10.0);
        assert!(out.as_raw().iter().all(|&v| v == 160));
    }

    #[test]
    fn even_kernel_matches_next_odd() {
        let (page, _) = uneven_page();
        let img = PixelBuffer::Gray(page);
        let even = MedianDivisionOptions {
            kernel_size: 30,
            ..Default::default()
        };
        let odd = MedianDivisionOptions {
            kernel_size: 31,
            ..Default::default()
        };
        assert_eq!(
            normalizer().median_division(&img, &even).unwrap(),
            normalizer().median_division(&img, &odd).unwrap()
        );
    }

    #[test]
    fn empty_image_is_degenerate() {
        let empty = PixelBuffer::Gray(GrayImage::new(0, 0));
        let config = BackgroundConfig::MedianDivision(Default::default());
        assert!(matches!(
            normalizer().normalize(&empty, &config),
            Err(ScanError::DegenerateImage(_))
        ));
    }
}
