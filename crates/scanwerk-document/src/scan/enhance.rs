// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image enhancement: denoise → contrast → sharpen → gamma, each step
// switchable, plus an analyse-then-fix automatic mode.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use scanwerk_core::config::{ContrastMethod, DenoiseMethod, EnhancementConfig, SharpenMethod};
use scanwerk_core::error::{Result, ScanError};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::image::PixelBuffer;
use crate::image::color::{hsv_value, lab_to_rgb, rgb_to_gray, rgb_to_lab};
use crate::image::filters::{
    self, clahe, convolve3x3, equalize, gamma_lut, gaussian_blur, gaussian_blur_sigma, median_blur,
    non_local_means, scale_abs_lut,
};
use crate::image::stats::{laplacian_variance, mean, std_dev, variance_of};

const LAPLACIAN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Normalised measurements used by [`Enhancer::auto_enhance`]. All in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnhancementMetrics {
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub noise_level: f64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Enhancer;

impl Enhancer {
    pub fn new() -> Self {
        Self
    }

    /// Run the enabled steps in the fixed order denoise → contrast →
    /// sharpen → gamma.
    #[instrument(skip_all)]
    pub fn enhance(&self, image: &PixelBuffer, config: &EnhancementConfig) -> Result<PixelBuffer> {
        let mut out = image.clone();
        if config.reduce_noise {
            out = self.denoise(&out, &config.denoise)?;
        }
        if config.enhance_contrast {
            out = self.enhance_contrast(&out, &config.contrast)?;
        }
        if config.sharpen {
            out = self.sharpen(&out, &config.sharpening)?;
        }
        if config.gamma_correction {
            out = self.gamma_correction(&out, config.gamma)?;
        }
        Ok(out)
    }

    // -- Denoise ------------------------------------------------------------------

    pub fn denoise(&self, image: &PixelBuffer, method: &DenoiseMethod) -> Result<PixelBuffer> {
        debug!(?method, "Denoise");
        match *method {
            DenoiseMethod::Gaussian { kernel_size, sigma } => image.map_planes(|plane| {
                Ok(if sigma > 0.0 {
                    gaussian_blur_sigma(plane, sigma)
                } else {
                    gaussian_blur(plane, kernel_size)
                })
            }),
            DenoiseMethod::Bilateral {
                diameter,
                sigma_color,
                sigma_space,
            } => image.map_planes(|plane| Ok(filters::bilateral(plane, diameter, sigma_color, sigma_space))),
            DenoiseMethod::Median { kernel_size } => {
                image.map_planes(|plane| Ok(median_blur(plane, kernel_size)))
            }
            DenoiseMethod::NonLocalMeans {
                h,
                template_window_size,
                search_window_size,
            } => {
                if h <= 0.0 {
                    return Err(ScanError::invalid("non_local_means", "filter strength h must be positive"));
                }
                image.map_planes(|plane| {
                    Ok(non_local_means(plane, h, template_window_size, search_window_size))
                })
            }
        }
    }

    // -- Contrast -----------------------------------------------------------------

    pub fn enhance_contrast(&self, image: &PixelBuffer, method: &ContrastMethod) -> Result<PixelBuffer> {
        debug!(?method, "Contrast");
        match *method {
            ContrastMethod::Clahe {
                clip_limit,
                tile_grid_size,
            } => Ok(self.clahe(image, clip_limit, tile_grid_size)),
            ContrastMethod::HistogramEqualization => Ok(self.histogram_equalization(image)),
            ContrastMethod::AdaptiveEqualization { window_size } => {
                if window_size == 0 {
                    return Err(ScanError::invalid("adaptive_equalization", "window_size must be positive"));
                }
                Ok(self.adaptive_equalization(image, window_size))
            }
        }
    }

    /// CLAHE on gray planes, or on the Lab lightness of colour images.
    pub fn clahe(&self, image: &PixelBuffer, clip_limit: f32, grid: u32) -> PixelBuffer {
        match image {
            PixelBuffer::Gray(gray) => PixelBuffer::Gray(clahe(gray, clip_limit, grid)),
            PixelBuffer::Rgb(rgb) => {
                let [l, a, b] = rgb_to_lab(rgb);
                PixelBuffer::Rgb(lab_to_rgb(&[clahe(&l, clip_limit, grid), a, b]))
            }
        }
    }

    /// Global equalisation of luma. Chroma is kept, so every colour channel
    /// moves by the same amount as luma.
    pub fn histogram_equalization(&self, image: &PixelBuffer) -> PixelBuffer {
        match image {
            PixelBuffer::Gray(gray) => PixelBuffer::Gray(equalize(gray)),
            PixelBuffer::Rgb(rgb) => {
                let luma = rgb_to_gray(rgb);
                let equalized = equalize(&luma);
                PixelBuffer::Rgb(ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
                    let shift = i16::from(equalized.get_pixel(x, y).0[0]) - i16::from(luma.get_pixel(x, y).0[0]);
                    let Rgb(c) = *rgb.get_pixel(x, y);
                    Rgb(c.map(|v| (i16::from(v) + shift).clamp(0, 255) as u8))
                }))
            }
        }
    }

    /// Mild CLAHE (clip 1.0) over a `window_size` grid on the HSV value.
    /// Hue and saturation are kept, so colour channels scale together.
    pub fn adaptive_equalization(&self, image: &PixelBuffer, window_size: u32) -> PixelBuffer {
        match image {
            PixelBuffer::Gray(gray) => PixelBuffer::Gray(clahe(gray, 1.0, window_size)),
            PixelBuffer::Rgb(rgb) => PixelBuffer::Rgb(rescale_value(rgb, window_size)),
        }
    }

    // -- Sharpen ------------------------------------------------------------------

    pub fn sharpen(&self, image: &PixelBuffer, method: &SharpenMethod) -> Result<PixelBuffer> {
        debug!(?method, "Sharpen");
        match *method {
            SharpenMethod::UnsharpMask {
                sigma,
                strength,
                threshold,
            } => self.unsharp_mask(image, sigma, strength, threshold),
            SharpenMethod::Laplacian { strength } => kernel_blend(image, &LAPLACIAN_KERNEL, strength),
            SharpenMethod::CustomKernel { kernel, strength } => kernel_blend(image, &kernel, strength),
        }
    }

    /// `v + strength * (v - blur(v))`. Differences smaller than `threshold`
    /// are left alone.
    pub fn unsharp_mask(&self, image: &PixelBuffer, sigma: f32, strength: f32, threshold: u8) -> Result<PixelBuffer> {
        if sigma <= 0.0 {
            return Err(ScanError::invalid("unsharp_mask", "sigma must be positive"));
        }
        let threshold = f32::from(threshold);
        image.map_planes(|plane| {
            let blurred = gaussian_blur_sigma(plane, sigma);
            Ok(ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
                let v = f32::from(plane.get_pixel(x, y).0[0]);
                let diff = v - f32::from(blurred.get_pixel(x, y).0[0]);
                let diff = if threshold > 0.0 && diff.abs() < threshold { 0.0 } else { diff };
                Luma([(v + strength * diff).clamp(0.0, 255.0) as u8])
            }))
        })
    }

    // -- Tone ---------------------------------------------------------------------

    pub fn gamma_correction(&self, image: &PixelBuffer, gamma: f32) -> Result<PixelBuffer> {
        if gamma <= 0.0 || !gamma.is_finite() {
            return Err(ScanError::invalid("gamma", format!("gamma must be positive, got {gamma}")));
        }
        Ok(image.apply_lut(&gamma_lut(gamma)))
    }

    /// Saturated `|alpha * v + beta|`.
    pub fn adjust_brightness_contrast(&self, image: &PixelBuffer, alpha: f32, beta: f32) -> PixelBuffer {
        image.apply_lut(&scale_abs_lut(alpha, beta))
    }

    // -- Presets ------------------------------------------------------------------

    /// Gentle edge-preserving denoise, strong CLAHE and a fine unsharp mask,
    /// tuned for small print.
    pub fn enhance_text_clarity(&self, image: &PixelBuffer) -> Result<PixelBuffer> {
        let denoised = image.map_planes(|plane| Ok(filters::bilateral(plane, 5, 50.0, 50.0)))?;
        let contrasted = self.clahe(&denoised, 3.0, 8);
        self.unsharp_mask(&contrasted, 0.5, 1.2, 0)
    }

    /// Brightness, spread, focus and noise of the luma plane.
    pub fn analyze(&self, image: &PixelBuffer) -> EnhancementMetrics {
        let gray = image.to_gray();
        let blurred = gaussian_blur(&gray, 5);
        let residual = gray
            .as_raw()
            .iter()
            .zip(blurred.as_raw())
            .map(|(&a, &b)| f64::from(a) - f64::from(b));

        EnhancementMetrics {
            brightness: mean(&gray) / 255.0,
            contrast: (std_dev(&gray) / 128.0).min(1.0),
            sharpness: (laplacian_variance(&gray) / 10_000.0).min(1.0),
            noise_level: (variance_of(residual) / 1000.0).min(1.0),
        }
    }

    /// Fix only what the measurements say is wrong: noise, flat contrast,
    /// softness, and under- or over-exposure.
    #[instrument(skip_all)]
    pub fn auto_enhance(&self, image: &PixelBuffer) -> Result<PixelBuffer> {
        let metrics = self.analyze(image);
        info!(?metrics, "Auto-enhance measurements");

        let mut out = image.clone();
        if metrics.noise_level > 0.3 {
            out = self.denoise(&out, &DenoiseMethod::default())?;
        }
        if metrics.contrast < 0.4 {
            out = self.clahe(&out, 2.5, 8);
        }
        if metrics.sharpness < 0.5 {
            out = self.unsharp_mask(&out, 1.0, 1.3, 0)?;
        }
        if metrics.brightness < 0.3 {
            out = self.adjust_brightness_contrast(&out, 1.1, 15.0);
        } else if metrics.brightness > 0.8 {
            out = self.adjust_brightness_contrast(&out, 0.9, -10.0);
        }
        Ok(out)
    }
}

/// Filter with `kernel`, then blend `(1 - strength) * v + strength * filtered`.
fn kernel_blend(image: &PixelBuffer, kernel: &[f32; 9], strength: f32) -> Result<PixelBuffer> {
    if !strength.is_finite() {
        return Err(ScanError::invalid("sharpen", "strength must be finite"));
    }
    image.map_planes(|plane| {
        let filtered = convolve3x3(plane, kernel);
        Ok(ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
            let v = f32::from(plane.get_pixel(x, y).0[0]);
            let f = f32::from(filtered.get_pixel(x, y).0[0]);
            Luma([((1.0 - strength) * v + strength * f).round().clamp(0.0, 255.0) as u8])
        }))
    })
}

fn rescale_value(rgb: &RgbImage, window_size: u32) -> RgbImage {
    let value: GrayImage = hsv_value(rgb);
    let equalized = clahe(&value, 1.0, window_size);
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let old = f32::from(value.get_pixel(x, y).0[0]);
        let new = equalized.get_pixel(x, y).0[0];
        if old == 0.0 {
            return Rgb([new, new, new]);
        }
        let ratio = f32::from(new) / old;
        let Rgb(c) = *rgb.get_pixel(x, y);
        Rgb(c.map(|v| (f32::from(v) * ratio).round().clamp(0.0, 255.0) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_edge() -> GrayImage {
        GrayImage::from_fn(30, 30, |x, _| Luma([if x < 15 { 80 } else { 170 }]))
    }

    fn all_off() -> EnhancementConfig {
        EnhancementConfig {
            enhance_contrast: false,
            reduce_noise: false,
            sharpen: false,
            gamma_correction: false,
            denoise: DenoiseMethod::default(),
            contrast: ContrastMethod::default(),
            sharpening: SharpenMethod::default(),
            gamma: 1.2,
        }
    }

    #[test]
    fn nothing_enabled_is_identity() {
        let img = PixelBuffer::Gray(step_edge());
        assert_eq!(Enhancer::new().enhance(&img, &all_off()).unwrap(), img);
    }

    #[test]
    fn unsharp_mask_steepens_edges() {
        let img = PixelBuffer::Gray(step_edge());
        let out = Enhancer::new().unsharp_mask(&img, 1.0, 1.5, 0).unwrap().into_gray();
        assert!(out.get_pixel(14, 10).0[0] < 80);
        assert!(out.get_pixel(15, 10).0[0] > 170);
        assert_eq!(out.get_pixel(2, 10).0[0], 80);
    }

    #[test]
    fn unsharp_threshold_ignores_small_ripples() {
        let ripple = GrayImage::from_fn(20, 20, |x, _| Luma([100 + (x % 2) as u8 * 2]));
        let img = PixelBuffer::Gray(ripple);
        let out = Enhancer::new().unsharp_mask(&img, 1.0, 1.5, 10).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn laplacian_keeps_flat_regions() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(10, 10, Luma([120])));
        let out = Enhancer::new()
            .sharpen(&img, &SharpenMethod::Laplacian { strength: 0.5 })
            .unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn median_denoise_removes_salt() {
        let mut gray = GrayImage::from_pixel(9, 9, Luma([60]));
        gray.put_pixel(4, 4, Luma([255]));
        let out = Enhancer::new()
            .denoise(&PixelBuffer::Gray(gray), &DenoiseMethod::Median { kernel_size: 3 })
            .unwrap()
            .into_gray();
        assert_eq!(out.get_pixel(4, 4).0[0], 60);
    }

    #[test]
    fn bilateral_denoise_filters_each_channel() {
        let rgb = RgbImage::from_fn(24, 24, |x, y| {
            let ripple = ((x * 7 + y * 13) % 9) as u8;
            if x < 12 { Rgb([40 + ripple, 90, 200]) } else { Rgb([210, 90 + ripple, 20]) }
        });
        let method = DenoiseMethod::Bilateral {
            diameter: 7,
            sigma_color: 25.0,
            sigma_space: 50.0,
        };
        let PixelBuffer::Rgb(out) = Enhancer::new().denoise(&PixelBuffer::Rgb(rgb), &method).unwrap() else {
            panic!("channel count changed")
        };
        assert!(out.get_pixel(3, 12).0[0] < 60);
        assert!(out.get_pixel(20, 12).0[0] > 190);
        assert_eq!(out.get_pixel(3, 12).0[1], 90);
        assert!(out.get_pixel(20, 12).0[2] < 40);
    }

    #[test]
    fn gamma_above_one_lifts_midtones() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(4, 4, Luma([100])));
        let out = Enhancer::new().gamma_correction(&img, 1.5).unwrap();
        assert!(out.as_raw()[0] > 100);
        assert!(Enhancer::new().gamma_correction(&img, 0.0).is_err());
    }

    #[test]
    fn luma_equalization_keeps_gray_pixels_gray() {
        let rgb = PixelBuffer::Rgb(PixelBuffer::Gray(step_edge()).to_rgb());
        let PixelBuffer::Rgb(out) = Enhancer::new().histogram_equalization(&rgb) else {
            panic!("channel count changed")
        };
        for p in out.pixels() {
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
        }
        assert_eq!(out.get_pixel(29, 0).0[0], 255);
    }

    #[test]
    fn value_equalization_keeps_hue_ratio() {
        let rgb = RgbImage::from_fn(32, 32, |x, _| Rgb([(x * 4) as u8 + 40, (x * 2) as u8 + 20, 10]));
        let out = rescale_value(&rgb, 4);
        let p = out.get_pixel(16, 16).0;
        let src = rgb.get_pixel(16, 16).0;
        let before = f32::from(src[1]) / f32::from(src[0]);
        let after = f32::from(p[1]) / f32::from(p[0]);
        assert!((before - after).abs() < 0.05, "{before} vs {after}");
    }

    #[test]
    fn flat_image_metrics() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(20, 20, Luma([51])));
        let m = Enhancer::new().analyze(&img);
        assert!((m.brightness - 0.2).abs() < 1e-9);
        assert_eq!(m.contrast, 0.0);
        assert_eq!(m.sharpness, 0.0);
        assert!(m.noise_level < 1e-9);
    }

    #[test]
    fn auto_enhance_corrects_exposure() {
        let enhancer = Enhancer::new();
        let dark = PixelBuffer::Gray(GrayImage::from_pixel(32, 32, Luma([40])));
        assert!(enhancer.auto_enhance(&dark).unwrap().mean() > dark.mean());

        let bright = PixelBuffer::Gray(GrayImage::from_pixel(32, 32, Luma([230])));
        assert!(enhancer.auto_enhance(&bright).unwrap().mean() < bright.mean());
    }

    #[test]
    fn text_clarity_keeps_layout() {
        let rgb = PixelBuffer::Rgb(PixelBuffer::Gray(step_edge()).to_rgb());
        let out = Enhancer::new().enhance_text_clarity(&rgb).unwrap();
        assert_eq!(out.size(), rgb.size());
        assert_eq!(out.channels(), 3);
    }

    #[test]
    fn brightness_contrast_is_saturated() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(2, 2, Luma([240])));
        let out = Enhancer::new().adjust_brightness_contrast(&img, 1.2, 10.0);
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }
}
