// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan pipeline — resolves a profile and runs every stage in a fixed order:
//
//   resize → geometry → background → enhance → white background →
//   binarize → restore scale → border crop
//
// Stages degrade individually (see `stage`). Anything that still escapes,
// including a panic inside an algorithm, makes the whole run fall back to
// the untouched input with `error` set. A decoded image never produces a
// hard failure.

use std::panic::{AssertUnwindSafe, catch_unwind};

use scanwerk_core::config::{ProfileOverrides, ScanProfile};
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::presets::{Preset, ScanMode};
use scanwerk_core::types::{QualityReport, ScanMetadata, Size, StageReport};
use tracing::{error, info, instrument};

use super::background::BackgroundNormalizer;
use super::binarize::Binarizer;
use super::enhance::Enhancer;
use super::geometry::{GeometricCorrector, WHITE_BORDER_THRESHOLD};
use super::quality::QualityAnalyzer;
use super::stage::{StageLog, StageOutcome};
use crate::image::{ImageProcessor, PixelBuffer};

/// Gray level below which a pixel counts as content when building a white
/// background document.
const WHITE_BACKGROUND_TEXT_THRESHOLD: u8 = 130;

/// One finished scan: the output image and what happened on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub image: PixelBuffer,
    pub metadata: ScanMetadata,
    /// `(stage, output)` for every applied stage, in pipeline order. Only
    /// filled by [`ScanPipeline::scan_with_intermediates`].
    pub intermediates: Vec<(String, PixelBuffer)>,
}

impl ScanResult {
    /// True when the run fell back to returning the input.
    pub fn is_fallback(&self) -> bool {
        self.metadata.error.is_some()
    }
}

/// Orchestrates the stage components. Holds no per-run state, so a single
/// pipeline can be shared freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanPipeline {
    geometry: GeometricCorrector,
    background: BackgroundNormalizer,
    binarizer: Binarizer,
    enhancer: Enhancer,
    quality: QualityAnalyzer,
}

struct Processed {
    image: PixelBuffer,
    scale_factor: f64,
    stages: Vec<StageReport>,
    intermediates: Vec<(String, PixelBuffer)>,
}

impl ScanPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// All named presets with owned copies of their profiles.
    pub fn presets() -> Vec<(Preset, ScanProfile)> {
        Preset::ALL.into_iter().map(|p| (p, p.profile())).collect()
    }

    /// The profile for `mode` with optional caller overrides merged in.
    pub fn resolve_profile(mode: ScanMode, overrides: Option<&ProfileOverrides>) -> Result<ScanProfile> {
        let base = mode.profile();
        match overrides {
            Some(o) => base.merged(o),
            None => Ok(base),
        }
    }

    /// Resolve the profile for `mode` and `overrides`, then scan.
    ///
    /// Only an invalid override is reported as an error; once the profile is
    /// known the scan itself always yields a result.
    pub fn scan_with(
        &self,
        image: &PixelBuffer,
        mode: ScanMode,
        overrides: Option<&ProfileOverrides>,
    ) -> Result<ScanResult> {
        let profile = Self::resolve_profile(mode, overrides)?;
        Ok(self.scan(image, &profile))
    }

    /// Run the full pipeline under `profile`.
    pub fn scan(&self, image: &PixelBuffer, profile: &ScanProfile) -> ScanResult {
        self.run(image, profile, false)
    }

    /// Like [`ScanPipeline::scan`], but also returns the image produced by
    /// each applied stage.
    pub fn scan_with_intermediates(&self, image: &PixelBuffer, profile: &ScanProfile) -> ScanResult {
        self.run(image, profile, true)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), channels = image.channels()))]
    fn run(&self, image: &PixelBuffer, profile: &ScanProfile, keep_intermediates: bool) -> ScanResult {
        let original_size = image.size();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.process(image, profile, keep_intermediates)))
            .unwrap_or_else(|panic| Err(ScanError::DegenerateImage(panic_message(panic.as_ref()))));

        match outcome {
            Ok(done) => {
                info!(
                    original = %original_size,
                    final_size = %done.image.size(),
                    scale = done.scale_factor,
                    "Scan finished"
                );
                ScanResult {
                    metadata: ScanMetadata {
                        original_size,
                        final_size: done.image.size(),
                        scale_factor: done.scale_factor,
                        config_used: *profile,
                        error: None,
                        stages: done.stages,
                    },
                    image: done.image,
                    intermediates: done.intermediates,
                }
            }
            Err(err) => {
                error!(%err, "Scan failed; returning the original image");
                ScanResult {
                    image: image.clone(),
                    metadata: ScanMetadata {
                        original_size,
                        final_size: original_size,
                        scale_factor: 1.0,
                        config_used: *profile,
                        error: Some(err.to_string()),
                        stages: Vec::new(),
                    },
                    intermediates: Vec::new(),
                }
            }
        }
    }

    fn process(&self, image: &PixelBuffer, profile: &ScanProfile, keep_intermediates: bool) -> Result<Processed> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("input image has no pixels".into()));
        }
        let original = image.size();
        let mut log = if keep_intermediates {
            StageLog::with_snapshots()
        } else {
            StageLog::new()
        };

        let (working, scale) =
            ImageProcessor::from_buffer(image.clone()).resize_to_fit(profile.output.max_width, profile.output.max_height);
        let working = working.into_buffer();
        let resized = working.size();
        let working = if scale < 1.0 {
            log.record("resize", StageOutcome::Applied(working))
        } else {
            log.record("resize", StageOutcome::Skipped(working))
        };

        let working = self.geometry.correct(working, &profile.geometric, &mut log);

        let working = log.run("background", true, working, |img| {
            self.background.normalize(img, &profile.background)
        });

        let working = log.run("enhance", profile.enhancement.any_enabled(), working, |img| {
            self.enhancer.enhance(img, &profile.enhancement)
        });

        let working = log.run("white_background", profile.output.white_background, working, |img| {
            self.background
                .create_white_background_document(img, WHITE_BACKGROUND_TEXT_THRESHOLD)
        });

        let working = log.run("binarize", profile.binarization.enable, working, |img| {
            self.binarizer.binarize(img, &profile.binarization)
        });

        let working = log.run("restore_scale", scale < 1.0, working, |img| {
            Ok(restore_scale(img, original, resized, scale))
        });

        let working = log.run("border_crop", true, working, |img| {
            Ok(self.geometry.auto_crop_white_borders(img, WHITE_BORDER_THRESHOLD))
        });

        let (stages, intermediates) = log.into_parts();
        Ok(Processed {
            image: working,
            scale_factor: scale,
            stages,
            intermediates,
        })
    }

    /// Default profile, image only.
    pub fn quick_scan(&self, image: &PixelBuffer) -> PixelBuffer {
        self.scan(image, &ScanMode::Standard.profile()).image
    }

    /// Binarized, white-background output for an OCR engine.
    pub fn scan_for_ocr(&self, image: &PixelBuffer) -> PixelBuffer {
        self.scan(image, &ScanMode::Ocr.profile()).image
    }

    /// Full-colour, high-resolution output for printing.
    pub fn scan_for_printing(&self, image: &PixelBuffer) -> PixelBuffer {
        self.scan(image, &ScanMode::Printing.profile()).image
    }

    /// Scan `images` one after another. `progress` receives `(done, total)`
    /// after every image; a failing image is recorded in its own result and
    /// the batch continues.
    #[instrument(skip_all, fields(total = images.len()))]
    pub fn batch_scan<F>(&self, images: &[PixelBuffer], profile: &ScanProfile, mut progress: F) -> Vec<ScanResult>
    where
        F: FnMut(usize, usize),
    {
        let total = images.len();
        let mut results = Vec::with_capacity(total);
        for (i, image) in images.iter().enumerate() {
            info!(index = i + 1, total, "Scanning batch item");
            results.push(self.scan(image, profile));
            progress(i + 1, total);
        }
        let failed = results.iter().filter(|r| r.is_fallback()).count();
        info!(total, failed, "Batch finished");
        results
    }

    /// Read-only capture quality report.
    pub fn detect_quality(&self, image: &PixelBuffer) -> Result<QualityReport> {
        self.quality.analyze(image)
    }
}

/// Map the working image back to full resolution. If no stage changed the
/// working size the exact original size is used; otherwise the current size
/// is divided by the scale factor.
fn restore_scale(image: &PixelBuffer, original: Size, resized: Size, scale: f64) -> PixelBuffer {
    let target = if image.size() == resized {
        original
    } else {
        Size::new(
            ((f64::from(image.width()) / scale).round() as u32).max(1),
            ((f64::from(image.height()) / scale).round() as u32).max(1),
        )
    };
    ImageProcessor::from_buffer(image.clone())
        .resize_exact(target.width, target.height)
        .into_buffer()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("processing panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("processing panicked: {s}")
    } else {
        "processing panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::skew::estimate_skew;
    use crate::scan::skew::tests::tilted_lines;
    use image::{GrayImage, Luma};
    use scanwerk_core::config::{BackgroundConfig, ColorSeparationOptions, NaturalEnhancementOptions};
    use scanwerk_core::types::StageStatus;

    fn gentle_profile() -> ScanProfile {
        let mut profile = ScanMode::Natural.profile();
        profile.geometric.enable_deskew = false;
        profile.geometric.enable_crop = false;
        profile.background = BackgroundConfig::NaturalEnhancement(NaturalEnhancementOptions::default());
        profile
    }

    fn stage<'a>(result: &'a ScanResult, name: &str) -> &'a StageReport {
        result
            .metadata
            .stages
            .iter()
            .find(|s| s.stage == name)
            .unwrap_or_else(|| panic!("no stage {name}"))
    }

    #[test]
    fn tilted_page_comes_out_level() {
        let page = PixelBuffer::Rgb(PixelBuffer::Gray(tilted_lines(1000, 1400, 7.0)).to_rgb());
        let result = ScanPipeline::new().scan(&page, &ScanMode::Standard.profile());

        assert!(result.metadata.error.is_none());
        assert_eq!(stage(&result, "deskew").status, StageStatus::Applied);
        let residual = estimate_skew(&result.image.to_gray()).angle;
        assert!(residual.abs() <= 1.0, "residual skew {residual}");

        // Cropped to the bar block plus margins, never rescaled.
        let size = result.image.size();
        assert!((560..=680).contains(&size.width), "{size}");
        assert!((740..=840).contains(&size.height), "{size}");
        assert_eq!(result.metadata.scale_factor, 1.0);
        assert_eq!(result.image.channels(), 3);
    }

    #[test]
    fn passive_profile_returns_input() {
        let page = PixelBuffer::Gray(GrayImage::from_fn(80, 60, |x, y| Luma([50 + ((x * 2 + y) % 150) as u8])));
        let mut profile = gentle_profile();
        profile.background = BackgroundConfig::NaturalEnhancement(NaturalEnhancementOptions {
            preserve_ratio: 1.0,
            ..Default::default()
        });

        let result = ScanPipeline::new().scan(&page, &profile);
        assert_eq!(result.image, page);
        assert!(result.metadata.stages.iter().all(|s| !s.is_degraded()));
    }

    #[test]
    fn oversized_input_is_restored_to_original_size() {
        let page = PixelBuffer::Gray(GrayImage::from_fn(300, 200, |x, y| Luma([100 + ((x + y) % 40) as u8])));
        let mut profile = gentle_profile();
        profile.output.max_width = 100;
        profile.output.max_height = 100;

        let result = ScanPipeline::new().scan(&page, &profile);
        assert!((result.metadata.scale_factor - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.metadata.final_size, Size::new(300, 200));
        assert_eq!(result.image.size(), Size::new(300, 200));
        assert_eq!(stage(&result, "restore_scale").status, StageStatus::Applied);
    }

    #[test]
    fn geometry_change_restores_by_scale_factor() {
        let page = PixelBuffer::Gray(GrayImage::from_fn(400, 400, |x, y| {
            let inside = (150..250).contains(&x) && (150..250).contains(&y);
            Luma([if inside { 30 } else { 255 }])
        }));
        let mut profile = gentle_profile();
        profile.geometric.enable_crop = true;
        profile.output.max_width = 200;
        profile.output.max_height = 200;

        let result = ScanPipeline::new().scan(&page, &profile);
        assert_eq!(result.metadata.scale_factor, 0.5);
        let size = result.image.size();
        assert!((90..=150).contains(&size.width), "{size}");
        assert!((90..=150).contains(&size.height), "{size}");
    }

    #[test]
    fn failing_stage_degrades_without_failing_scan() {
        let page = PixelBuffer::Gray(GrayImage::from_pixel(40, 40, Luma([120])));
        let mut profile = gentle_profile();
        profile.background = BackgroundConfig::ColorSeparation(ColorSeparationOptions::default());

        let result = ScanPipeline::new().scan(&page, &profile);
        assert!(result.metadata.error.is_none());
        assert!(stage(&result, "background").is_degraded());
        assert_eq!(result.image, page);
    }

    #[test]
    fn intermediates_follow_applied_stages() {
        let page = PixelBuffer::Gray(GrayImage::from_fn(300, 200, |x, y| Luma([100 + ((x + y) % 40) as u8])));
        let mut profile = gentle_profile();
        profile.geometric.enable_perspective = false;
        profile.output.max_width = 150;
        profile.output.max_height = 150;

        let result = ScanPipeline::new().scan_with_intermediates(&page, &profile);
        let names: Vec<_> = result.intermediates.iter().map(|(name, _)| name.as_str()).collect();
        let applied: Vec<_> = result
            .metadata
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Applied)
            .map(|s| s.stage.as_str())
            .collect();
        assert_eq!(names, applied);
        assert_eq!(&names[..2], ["resize", "background"]);

        let size_of = |name: &str| {
            let (_, img) = result.intermediates.iter().find(|(n, _)| n == name).unwrap();
            img.size()
        };
        assert_eq!(size_of("resize"), Size::new(150, 100));
        assert_eq!(size_of("background"), Size::new(150, 100));
        assert_eq!(size_of("restore_scale"), Size::new(300, 200));
        assert_eq!(result.intermediates.last().map(|(_, img)| img), Some(&result.image));
    }

    #[test]
    fn plain_scan_keeps_no_intermediates() {
        let page = PixelBuffer::Gray(GrayImage::from_pixel(30, 30, Luma([128])));
        assert!(ScanPipeline::new().scan(&page, &gentle_profile()).intermediates.is_empty());
        let empty = PixelBuffer::Gray(GrayImage::new(0, 0));
        let fallback = ScanPipeline::new().scan_with_intermediates(&empty, &gentle_profile());
        assert!(fallback.is_fallback());
        assert!(fallback.intermediates.is_empty());
    }

    #[test]
    fn empty_input_falls_back_with_error() {
        let empty = PixelBuffer::Gray(GrayImage::new(0, 0));
        let result = ScanPipeline::new().scan(&empty, &ScanProfile::default());
        assert!(result.is_fallback());
        assert_eq!(result.image, empty);
        assert!(result.metadata.stages.is_empty());
    }

    #[test]
    fn white_page_survives_untouched() {
        let page = PixelBuffer::Gray(GrayImage::from_pixel(50, 50, Luma([255])));
        let result = ScanPipeline::new().scan(&page, &ScanProfile::default());
        assert!(result.metadata.error.is_none());
        assert_eq!(result.image.size(), Size::new(50, 50));
    }

    #[test]
    fn batch_isolates_failures_and_reports_progress() {
        let good = PixelBuffer::Gray(GrayImage::from_pixel(30, 30, Luma([128])));
        let bad = PixelBuffer::Gray(GrayImage::new(0, 0));
        let mut calls = Vec::new();

        let results = ScanPipeline::new().batch_scan(
            &[good.clone(), bad, good],
            &gentle_profile(),
            |done, total| calls.push((done, total)),
        );
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(results.len(), 3);
        assert!(!results[0].is_fallback());
        assert!(results[1].is_fallback());
        assert!(!results[2].is_fallback());
    }

    #[test]
    fn ocr_scan_is_single_channel() {
        let page = PixelBuffer::Rgb(PixelBuffer::Gray(tilted_lines(200, 240, 0.0)).to_rgb());
        let out = ScanPipeline::new().scan_for_ocr(&page);
        assert_eq!(out.channels(), 1);
        assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn invalid_override_is_reported() {
        let overrides = ProfileOverrides::from_json(r#"{ "output": { "quality": 0 } }"#).unwrap();
        let page = PixelBuffer::Gray(GrayImage::from_pixel(10, 10, Luma([128])));
        let result = ScanPipeline::new().scan_with(&page, ScanMode::Standard, Some(&overrides));
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn config_used_reflects_overrides() {
        let overrides = ProfileOverrides::from_json(r#"{ "output": { "quality": 80 } }"#).unwrap();
        let page = PixelBuffer::Gray(GrayImage::from_pixel(10, 10, Luma([128])));
        let result = ScanPipeline::new()
            .scan_with(&page, ScanMode::Balanced, Some(&overrides))
            .unwrap();
        assert_eq!(result.metadata.config_used.output.quality, 80);
    }

    #[test]
    fn presets_are_listed() {
        let names: Vec<_> = ScanPipeline::presets().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, ["default", "balanced", "natural", "ultra_white"]);
    }
}
