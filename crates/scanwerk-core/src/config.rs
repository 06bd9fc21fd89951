// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan profile configuration.
//
// A profile has five sections (geometric, background, binarization,
// enhancement, output). Every algorithm choice is a tagged enum carrying only
// its own options, and caller overrides are partial mirrors of the sections
// that reject unknown keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Complete, resolved configuration for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanProfile {
    pub geometric: GeometricConfig,
    pub background: BackgroundConfig,
    pub binarization: BinarizationConfig,
    pub enhancement: EnhancementConfig,
    pub output: OutputConfig,
}

impl Default for ScanProfile {
    fn default() -> Self {
        crate::presets::DEFAULT_PROFILE
    }
}

impl ScanProfile {
    /// Return a copy of this profile with `overrides` applied.
    ///
    /// The merge is shallow per section: keys supplied by the caller replace
    /// the profile's values, everything else is kept.
    pub fn merged(&self, overrides: &ProfileOverrides) -> Result<Self> {
        let mut merged = *self;
        if let Some(geometric) = &overrides.geometric {
            merged.geometric = merged.geometric.with_overrides(geometric);
        }
        if let Some(background) = &overrides.background {
            merged.background = merged.background.with_overrides(background)?;
        }
        if let Some(binarization) = &overrides.binarization {
            merged.binarization = merged.binarization.with_overrides(binarization)?;
        }
        if let Some(enhancement) = &overrides.enhancement {
            merged.enhancement = merged.enhancement.with_overrides(enhancement);
        }
        if let Some(output) = &overrides.output {
            merged.output = merged.output.with_overrides(output)?;
        }
        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// Geometric
// ---------------------------------------------------------------------------

/// Geometric correction toggles. Stages run perspective → deskew → crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometricConfig {
    pub enable_perspective: bool,
    pub enable_deskew: bool,
    pub enable_crop: bool,
}

impl GeometricConfig {
    /// Whether any geometric stage is switched on.
    pub fn any_enabled(&self) -> bool {
        self.enable_perspective || self.enable_deskew || self.enable_crop
    }

    fn with_overrides(mut self, o: &GeometricOverrides) -> Self {
        if let Some(v) = o.enable_perspective {
            self.enable_perspective = v;
        }
        if let Some(v) = o.enable_deskew {
            self.enable_deskew = v;
        }
        if let Some(v) = o.enable_crop {
            self.enable_crop = v;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

/// Background normalisation strategy, one variant per algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BackgroundConfig {
    MedianDivision(MedianDivisionOptions),
    UltraWhitening(UltraWhiteningOptions),
    NaturalEnhancement(NaturalEnhancementOptions),
    AdaptiveThreshold(AdaptiveRemovalOptions),
    ColorSeparation(ColorSeparationOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedianDivisionOptions {
    /// Median filter size used to estimate the illumination field.
    pub kernel_size: u32,
    pub brightness_adjustment: f32,
    pub contrast_adjustment: f32,
}

impl Default for MedianDivisionOptions {
    fn default() -> Self {
        Self {
            kernel_size: 31,
            brightness_adjustment: 1.25,
            contrast_adjustment: 1.12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UltraWhiteningOptions {
    /// Carried in presets and overrides only. Smoothness is always measured
    /// over a fixed 5x5 window.
    pub kernel_size: u32,
    /// Upper bound on the background whitening factor (1.0..=2.0).
    pub whitening_strength: f32,
    /// Brightness percentile (as a fraction) above which a pixel may be
    /// background (0.5..=0.9).
    pub background_threshold: f32,
}

impl Default for UltraWhiteningOptions {
    fn default() -> Self {
        Self {
            kernel_size: 25,
            whitening_strength: 1.3,
            background_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalEnhancementOptions {
    pub brightness_boost: f32,
    pub contrast_boost: f32,
    /// Share of the original image kept in the blend (0.0..=1.0).
    pub preserve_ratio: f32,
}

impl Default for NaturalEnhancementOptions {
    fn default() -> Self {
        Self {
            brightness_boost: 1.08,
            contrast_boost: 1.03,
            preserve_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveRemovalOptions {
    pub block_size: u32,
    pub c_constant: f32,
    pub morphology_kernel_size: u32,
}

impl Default for AdaptiveRemovalOptions {
    fn default() -> Self {
        Self {
            block_size: 15,
            c_constant: 5.0,
            morphology_kernel_size: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSeparationOptions {
    /// Minimum HSV value for a pixel to count as background.
    pub background_color_threshold: u8,
    pub morphology_iterations: u32,
}

impl Default for ColorSeparationOptions {
    fn default() -> Self {
        Self {
            background_color_threshold: 200,
            morphology_iterations: 2,
        }
    }
}

/// Name-only tag for a background strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMethod {
    MedianDivision,
    UltraWhitening,
    NaturalEnhancement,
    AdaptiveThreshold,
    ColorSeparation,
}

impl BackgroundMethod {
    pub const ALL: [BackgroundMethod; 5] = [
        Self::MedianDivision,
        Self::UltraWhitening,
        Self::NaturalEnhancement,
        Self::AdaptiveThreshold,
        Self::ColorSeparation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedianDivision => "median_division",
            Self::UltraWhitening => "ultra_whitening",
            Self::NaturalEnhancement => "natural_enhancement",
            Self::AdaptiveThreshold => "adaptive_threshold",
            Self::ColorSeparation => "color_separation",
        }
    }

    /// The strategy with its built-in default options.
    pub fn default_config(&self) -> BackgroundConfig {
        match self {
            Self::MedianDivision => BackgroundConfig::MedianDivision(Default::default()),
            Self::UltraWhitening => BackgroundConfig::UltraWhitening(Default::default()),
            Self::NaturalEnhancement => {
                BackgroundConfig::NaturalEnhancement(Default::default())
            }
            Self::AdaptiveThreshold => BackgroundConfig::AdaptiveThreshold(Default::default()),
            Self::ColorSeparation => BackgroundConfig::ColorSeparation(Default::default()),
        }
    }

    /// Override keys that belong to this strategy.
    fn accepted_keys(&self) -> &'static [&'static str] {
        match self {
            Self::MedianDivision => &["kernel_size", "brightness_adjustment", "contrast_adjustment"],
            Self::UltraWhitening => &["kernel_size", "whitening_strength", "background_threshold"],
            Self::NaturalEnhancement => &["brightness_boost", "contrast_boost", "preserve_ratio"],
            Self::AdaptiveThreshold => &["block_size", "c_constant", "morphology_kernel_size"],
            Self::ColorSeparation => &["background_color_threshold", "morphology_iterations"],
        }
    }
}

impl fmt::Display for BackgroundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundMethod {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScanError::Config(format!("unknown background method `{s}`")))
    }
}

impl BackgroundConfig {
    pub fn method(&self) -> BackgroundMethod {
        match self {
            Self::MedianDivision(_) => BackgroundMethod::MedianDivision,
            Self::UltraWhitening(_) => BackgroundMethod::UltraWhitening,
            Self::NaturalEnhancement(_) => BackgroundMethod::NaturalEnhancement,
            Self::AdaptiveThreshold(_) => BackgroundMethod::AdaptiveThreshold,
            Self::ColorSeparation(_) => BackgroundMethod::ColorSeparation,
        }
    }

    fn with_overrides(self, o: &BackgroundOverrides) -> Result<Self> {
        let method = o.method.unwrap_or(self.method());
        let base = if method == self.method() {
            self
        } else {
            method.default_config()
        };

        let accepted = method.accepted_keys();
        if let Some(key) = o.present_keys().into_iter().find(|k| !accepted.contains(k)) {
            return Err(ScanError::Config(format!(
                "background key `{key}` is not valid for method `{method}`"
            )));
        }

        Ok(match base {
            Self::MedianDivision(mut opts) => {
                set(&mut opts.kernel_size, o.kernel_size);
                set(&mut opts.brightness_adjustment, o.brightness_adjustment);
                set(&mut opts.contrast_adjustment, o.contrast_adjustment);
                Self::MedianDivision(opts)
            }
            Self::UltraWhitening(mut opts) => {
                set(&mut opts.kernel_size, o.kernel_size);
                set(&mut opts.whitening_strength, o.whitening_strength);
                set(&mut opts.background_threshold, o.background_threshold);
                Self::UltraWhitening(opts)
            }
            Self::NaturalEnhancement(mut opts) => {
                set(&mut opts.brightness_boost, o.brightness_boost);
                set(&mut opts.contrast_boost, o.contrast_boost);
                set(&mut opts.preserve_ratio, o.preserve_ratio);
                Self::NaturalEnhancement(opts)
            }
            Self::AdaptiveThreshold(mut opts) => {
                set(&mut opts.block_size, o.block_size);
                set(&mut opts.c_constant, o.c_constant);
                set(&mut opts.morphology_kernel_size, o.morphology_kernel_size);
                Self::AdaptiveThreshold(opts)
            }
            Self::ColorSeparation(mut opts) => {
                set(&mut opts.background_color_threshold, o.background_color_threshold);
                set(&mut opts.morphology_iterations, o.morphology_iterations);
                Self::ColorSeparation(opts)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Binarization
// ---------------------------------------------------------------------------

/// Binarization section: on/off switch, algorithm, and the shared pre/post
/// processing options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinarizationConfig {
    pub enable: bool,
    #[serde(flatten)]
    pub method: BinarizationMethod,
    #[serde(flatten)]
    pub preprocess: PreprocessOptions,
    #[serde(flatten)]
    pub postprocess: PostprocessOptions,
}

/// Thresholding algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BinarizationMethod {
    AdaptiveGaussian(AdaptiveOptions),
    AdaptiveMean(AdaptiveOptions),
    Otsu,
    Triangle,
    Sauvola(SauvolaOptions),
    Combined(CombinedWeights),
    /// Pick a method from image statistics at run time.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveOptions {
    pub block_size: u32,
    pub c_constant: f32,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            block_size: 11,
            c_constant: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SauvolaOptions {
    pub window_size: u32,
    pub k: f32,
    /// Dynamic range of the standard deviation.
    pub r: f32,
}

impl Default for SauvolaOptions {
    fn default() -> Self {
        Self {
            window_size: 15,
            k: 0.2,
            r: 128.0,
        }
    }
}

/// Per-method weights for the combined threshold. A zero weight skips the
/// method entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedWeights {
    pub adaptive_gaussian: f32,
    pub adaptive_mean: f32,
    pub otsu: f32,
    pub triangle: f32,
}

impl Default for CombinedWeights {
    fn default() -> Self {
        Self {
            adaptive_gaussian: 0.4,
            adaptive_mean: 0.3,
            otsu: 0.3,
            triangle: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub denoise: bool,
    /// Gaussian blur size applied when `denoise` is set; 0 disables the blur.
    pub blur_kernel: u32,
    /// CLAHE before thresholding.
    pub enhance_contrast: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            denoise: true,
            blur_kernel: 3,
            enhance_contrast: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostprocessOptions {
    /// Morphological opening to drop isolated speckles.
    pub remove_noise: bool,
    /// Morphological closing to fill pin holes.
    pub fill_holes: bool,
    pub morphology_kernel_size: u32,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            remove_noise: true,
            fill_holes: true,
            morphology_kernel_size: 2,
        }
    }
}

/// Name-only tag for a binarization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarizationKind {
    AdaptiveGaussian,
    AdaptiveMean,
    Otsu,
    Triangle,
    Sauvola,
    Combined,
    Auto,
}

impl BinarizationKind {
    pub const ALL: [BinarizationKind; 7] = [
        Self::AdaptiveGaussian,
        Self::AdaptiveMean,
        Self::Otsu,
        Self::Triangle,
        Self::Sauvola,
        Self::Combined,
        Self::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdaptiveGaussian => "adaptive_gaussian",
            Self::AdaptiveMean => "adaptive_mean",
            Self::Otsu => "otsu",
            Self::Triangle => "triangle",
            Self::Sauvola => "sauvola",
            Self::Combined => "combined",
            Self::Auto => "auto",
        }
    }

    pub fn default_method(&self) -> BinarizationMethod {
        match self {
            Self::AdaptiveGaussian => BinarizationMethod::AdaptiveGaussian(Default::default()),
            Self::AdaptiveMean => BinarizationMethod::AdaptiveMean(Default::default()),
            Self::Otsu => BinarizationMethod::Otsu,
            Self::Triangle => BinarizationMethod::Triangle,
            Self::Sauvola => BinarizationMethod::Sauvola(Default::default()),
            Self::Combined => BinarizationMethod::Combined(Default::default()),
            Self::Auto => BinarizationMethod::Auto,
        }
    }

    fn accepted_keys(&self) -> &'static [&'static str] {
        match self {
            Self::AdaptiveGaussian | Self::AdaptiveMean => &["block_size", "c_constant"],
            Self::Sauvola => &["window_size", "k", "r"],
            Self::Combined => &["weights"],
            Self::Otsu | Self::Triangle | Self::Auto => &[],
        }
    }
}

impl fmt::Display for BinarizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinarizationKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScanError::Config(format!("unknown binarization method `{s}`")))
    }
}

impl BinarizationMethod {
    pub fn kind(&self) -> BinarizationKind {
        match self {
            Self::AdaptiveGaussian(_) => BinarizationKind::AdaptiveGaussian,
            Self::AdaptiveMean(_) => BinarizationKind::AdaptiveMean,
            Self::Otsu => BinarizationKind::Otsu,
            Self::Triangle => BinarizationKind::Triangle,
            Self::Sauvola(_) => BinarizationKind::Sauvola,
            Self::Combined(_) => BinarizationKind::Combined,
            Self::Auto => BinarizationKind::Auto,
        }
    }
}

impl BinarizationConfig {
    fn with_overrides(mut self, o: &BinarizationOverrides) -> Result<Self> {
        let kind = o.method.unwrap_or(self.method.kind());
        let accepted = kind.accepted_keys();
        if let Some(key) = o
            .method_keys()
            .into_iter()
            .find(|k| !accepted.contains(k))
        {
            return Err(ScanError::Config(format!(
                "binarization key `{key}` is not valid for method `{kind}`"
            )));
        }

        let base = if kind == self.method.kind() {
            self.method
        } else {
            kind.default_method()
        };

        self.method = match base {
            BinarizationMethod::AdaptiveGaussian(mut opts) => {
                set(&mut opts.block_size, o.block_size);
                set(&mut opts.c_constant, o.c_constant);
                BinarizationMethod::AdaptiveGaussian(opts)
            }
            BinarizationMethod::AdaptiveMean(mut opts) => {
                set(&mut opts.block_size, o.block_size);
                set(&mut opts.c_constant, o.c_constant);
                BinarizationMethod::AdaptiveMean(opts)
            }
            BinarizationMethod::Sauvola(mut opts) => {
                set(&mut opts.window_size, o.window_size);
                set(&mut opts.k, o.k);
                set(&mut opts.r, o.r);
                BinarizationMethod::Sauvola(opts)
            }
            BinarizationMethod::Combined(mut weights) => {
                set(&mut weights, o.weights);
                BinarizationMethod::Combined(weights)
            }
            other => other,
        };

        set(&mut self.enable, o.enable);
        set(&mut self.preprocess.denoise, o.denoise);
        set(&mut self.preprocess.blur_kernel, o.blur_kernel);
        set(&mut self.preprocess.enhance_contrast, o.enhance_contrast);
        set(&mut self.postprocess.remove_noise, o.remove_noise);
        set(&mut self.postprocess.fill_holes, o.fill_holes);
        set(&mut self.postprocess.morphology_kernel_size, o.morphology_kernel_size);
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Enhancement
// ---------------------------------------------------------------------------

/// Enhancement section. Applied in the fixed order denoise → contrast →
/// sharpen → gamma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancementConfig {
    pub enhance_contrast: bool,
    pub reduce_noise: bool,
    pub sharpen: bool,
    pub gamma_correction: bool,
    pub denoise: DenoiseMethod,
    pub contrast: ContrastMethod,
    pub sharpening: SharpenMethod,
    /// Power-law exponent; values above 1.0 brighten mid-tones.
    pub gamma: f32,
}

impl EnhancementConfig {
    pub fn any_enabled(&self) -> bool {
        self.enhance_contrast || self.reduce_noise || self.sharpen || self.gamma_correction
    }

    fn with_overrides(mut self, o: &EnhancementOverrides) -> Self {
        set(&mut self.enhance_contrast, o.enhance_contrast);
        set(&mut self.reduce_noise, o.reduce_noise);
        set(&mut self.sharpen, o.sharpen);
        set(&mut self.gamma_correction, o.gamma_correction);
        set(&mut self.denoise, o.denoise);
        set(&mut self.contrast, o.contrast);
        set(&mut self.sharpening, o.sharpening);
        set(&mut self.gamma, o.gamma);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DenoiseMethod {
    Gaussian { kernel_size: u32, sigma: f32 },
    Bilateral { diameter: u32, sigma_color: f32, sigma_space: f32 },
    Median { kernel_size: u32 },
    NonLocalMeans { h: f32, template_window_size: u32, search_window_size: u32 },
}

impl Default for DenoiseMethod {
    fn default() -> Self {
        Self::Bilateral {
            diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ContrastMethod {
    Clahe { clip_limit: f32, tile_grid_size: u32 },
    HistogramEqualization,
    AdaptiveEqualization { window_size: u32 },
}

impl Default for ContrastMethod {
    fn default() -> Self {
        Self::Clahe {
            clip_limit: 2.0,
            tile_grid_size: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SharpenMethod {
    UnsharpMask { sigma: f32, strength: f32, threshold: u8 },
    Laplacian { strength: f32 },
    CustomKernel { kernel: [f32; 9], strength: f32 },
}

impl Default for SharpenMethod {
    fn default() -> Self {
        Self::UnsharpMask {
            sigma: 1.0,
            strength: 1.5,
            threshold: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Copy detected content onto a pure white canvas.
    pub white_background: bool,
    /// Working-resolution bounds; larger inputs are downscaled, never upscaled.
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder hint for the adapter (JPEG quality 1-100).
    pub quality: u8,
}

impl OutputConfig {
    fn with_overrides(mut self, o: &OutputOverrides) -> Result<Self> {
        set(&mut self.white_background, o.white_background);
        set(&mut self.max_width, o.max_width);
        set(&mut self.max_height, o.max_height);
        set(&mut self.quality, o.quality);
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ScanError::Config(
                "output max_width and max_height must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ScanError::Config(format!(
                "output quality must be within 1..=100, got {}",
                self.quality
            )));
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// A caller-supplied subset of a profile. Any section and any key may be
/// omitted; unknown keys are rejected at parse time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    pub geometric: Option<GeometricOverrides>,
    pub background: Option<BackgroundOverrides>,
    pub binarization: Option<BinarizationOverrides>,
    pub enhancement: Option<EnhancementOverrides>,
    pub output: Option<OutputOverrides>,
}

impl ProfileOverrides {
    /// Parse overrides from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometricOverrides {
    pub enable_perspective: Option<bool>,
    pub enable_deskew: Option<bool>,
    pub enable_crop: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundOverrides {
    pub method: Option<BackgroundMethod>,
    pub kernel_size: Option<u32>,
    pub brightness_adjustment: Option<f32>,
    pub contrast_adjustment: Option<f32>,
    pub whitening_strength: Option<f32>,
    pub background_threshold: Option<f32>,
    pub brightness_boost: Option<f32>,
    pub contrast_boost: Option<f32>,
    pub preserve_ratio: Option<f32>,
    pub block_size: Option<u32>,
    pub c_constant: Option<f32>,
    pub morphology_kernel_size: Option<u32>,
    pub background_color_threshold: Option<u8>,
    pub morphology_iterations: Option<u32>,
}

impl BackgroundOverrides {
    fn present_keys(&self) -> Vec<&'static str> {
        let flags = [
            ("kernel_size", self.kernel_size.is_some()),
            ("brightness_adjustment", self.brightness_adjustment.is_some()),
            ("contrast_adjustment", self.contrast_adjustment.is_some()),
            ("whitening_strength", self.whitening_strength.is_some()),
            ("background_threshold", self.background_threshold.is_some()),
            ("brightness_boost", self.brightness_boost.is_some()),
            ("contrast_boost", self.contrast_boost.is_some()),
            ("preserve_ratio", self.preserve_ratio.is_some()),
            ("block_size", self.block_size.is_some()),
            ("c_constant", self.c_constant.is_some()),
            ("morphology_kernel_size", self.morphology_kernel_size.is_some()),
            ("background_color_threshold", self.background_color_threshold.is_some()),
            ("morphology_iterations", self.morphology_iterations.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(key, present)| present.then_some(key))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinarizationOverrides {
    pub enable: Option<bool>,
    pub method: Option<BinarizationKind>,
    pub block_size: Option<u32>,
    pub c_constant: Option<f32>,
    pub window_size: Option<u32>,
    pub k: Option<f32>,
    pub r: Option<f32>,
    pub weights: Option<CombinedWeights>,
    pub denoise: Option<bool>,
    pub blur_kernel: Option<u32>,
    pub enhance_contrast: Option<bool>,
    pub remove_noise: Option<bool>,
    pub fill_holes: Option<bool>,
    pub morphology_kernel_size: Option<u32>,
}

impl BinarizationOverrides {
    /// Keys that are specific to one thresholding method.
    fn method_keys(&self) -> Vec<&'static str> {
        let flags = [
            ("block_size", self.block_size.is_some()),
            ("c_constant", self.c_constant.is_some()),
            ("window_size", self.window_size.is_some()),
            ("k", self.k.is_some()),
            ("r", self.r.is_some()),
            ("weights", self.weights.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(key, present)| present.then_some(key))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnhancementOverrides {
    pub enhance_contrast: Option<bool>,
    pub reduce_noise: Option<bool>,
    pub sharpen: Option<bool>,
    pub gamma_correction: Option<bool>,
    pub denoise: Option<DenoiseMethod>,
    pub contrast: Option<ContrastMethod>,
    pub sharpening: Option<SharpenMethod>,
    pub gamma: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputOverrides {
    pub white_background: Option<bool>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u8>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
