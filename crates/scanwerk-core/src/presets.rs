// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in scan profiles.
//
// The numbers here were tuned by eye against real phone captures and have no
// derivation beyond that. Keep them literal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{
    AdaptiveOptions, BackgroundConfig, BinarizationConfig, BinarizationMethod, ContrastMethod,
    DenoiseMethod, EnhancementConfig, GeometricConfig, MedianDivisionOptions,
    NaturalEnhancementOptions, OutputConfig, PostprocessOptions, PreprocessOptions, ScanProfile,
    SharpenMethod, UltraWhiteningOptions,
};
use crate::error::{Result, ScanError};

// -- Shared building blocks --------------------------------------------------

const GEOMETRIC: GeometricConfig = GeometricConfig {
    enable_perspective: false,
    enable_deskew: true,
    enable_crop: true,
};

const PREPROCESS: PreprocessOptions = PreprocessOptions {
    denoise: true,
    blur_kernel: 3,
    enhance_contrast: true,
};

const POSTPROCESS: PostprocessOptions = PostprocessOptions {
    remove_noise: true,
    fill_holes: true,
    morphology_kernel_size: 2,
};

const OUTPUT: OutputConfig = OutputConfig {
    white_background: false,
    max_width: 2000,
    max_height: 2000,
    quality: 95,
};

const DENOISE: DenoiseMethod = DenoiseMethod::Bilateral {
    diameter: 9,
    sigma_color: 75.0,
    sigma_space: 75.0,
};

const CONTRAST: ContrastMethod = ContrastMethod::Clahe {
    clip_limit: 2.0,
    tile_grid_size: 8,
};

const SHARPEN: SharpenMethod = SharpenMethod::UnsharpMask {
    sigma: 1.0,
    strength: 1.5,
    threshold: 0,
};

const fn binarization(enable: bool, block_size: u32, c_constant: f32) -> BinarizationConfig {
    BinarizationConfig {
        enable,
        method: BinarizationMethod::AdaptiveGaussian(AdaptiveOptions {
            block_size,
            c_constant,
        }),
        preprocess: PREPROCESS,
        postprocess: POSTPROCESS,
    }
}

const fn enhancement(contrast: bool, denoise: bool, sharpen: bool, gamma: bool) -> EnhancementConfig {
    EnhancementConfig {
        enhance_contrast: contrast,
        reduce_noise: denoise,
        sharpen,
        gamma_correction: gamma,
        denoise: DENOISE,
        contrast: CONTRAST,
        sharpening: SHARPEN,
        gamma: 1.2,
    }
}

// -- Named presets -----------------------------------------------------------

pub const DEFAULT_PROFILE: ScanProfile = ScanProfile {
    geometric: GEOMETRIC,
    background: BackgroundConfig::MedianDivision(MedianDivisionOptions {
        kernel_size: 31,
        brightness_adjustment: 1.25,
        contrast_adjustment: 1.12,
    }),
    binarization: binarization(false, 11, 2.0),
    enhancement: enhancement(true, true, true, false),
    output: OUTPUT,
};

pub const BALANCED_PROFILE: ScanProfile = ScanProfile {
    geometric: GEOMETRIC,
    background: BackgroundConfig::MedianDivision(MedianDivisionOptions {
        kernel_size: 25,
        brightness_adjustment: 1.20,
        contrast_adjustment: 1.08,
    }),
    binarization: binarization(false, 15, 5.0),
    enhancement: enhancement(true, false, false, false),
    output: OUTPUT,
};

pub const NATURAL_PROFILE: ScanProfile = ScanProfile {
    geometric: GEOMETRIC,
    background: BackgroundConfig::NaturalEnhancement(NaturalEnhancementOptions {
        brightness_boost: 1.15,
        contrast_boost: 1.05,
        preserve_ratio: 0.5,
    }),
    binarization: binarization(false, 21, 8.0),
    enhancement: enhancement(false, false, false, false),
    output: OUTPUT,
};

pub const ULTRA_WHITE_PROFILE: ScanProfile = ScanProfile {
    geometric: GEOMETRIC,
    background: BackgroundConfig::UltraWhitening(UltraWhiteningOptions {
        kernel_size: 25,
        whitening_strength: 1.3,
        background_threshold: 0.7,
    }),
    binarization: binarization(false, 15, 3.0),
    enhancement: enhancement(true, false, false, false),
    output: OUTPUT,
};

pub const OCR_PROFILE: ScanProfile = ScanProfile {
    geometric: GeometricConfig {
        enable_perspective: true,
        ..GEOMETRIC
    },
    background: BackgroundConfig::MedianDivision(MedianDivisionOptions {
        kernel_size: 61,
        brightness_adjustment: 1.3,
        contrast_adjustment: 1.2,
    }),
    binarization: binarization(true, 15, 4.0),
    enhancement: enhancement(true, true, false, false),
    output: OutputConfig {
        white_background: true,
        ..OUTPUT
    },
};

pub const PRINTING_PROFILE: ScanProfile = ScanProfile {
    geometric: GeometricConfig {
        enable_perspective: true,
        ..GEOMETRIC
    },
    background: BackgroundConfig::MedianDivision(MedianDivisionOptions {
        kernel_size: 45,
        brightness_adjustment: 1.1,
        contrast_adjustment: 1.05,
    }),
    binarization: binarization(false, 11, 2.0),
    enhancement: enhancement(true, true, true, true),
    output: OutputConfig {
        white_background: true,
        max_width: 3000,
        max_height: 3000,
        quality: 95,
    },
};

/// A named preset that callers may retrieve directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Default,
    Balanced,
    Natural,
    UltraWhite,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Default, Self::Balanced, Self::Natural, Self::UltraWhite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Balanced => "balanced",
            Self::Natural => "natural",
            Self::UltraWhite => "ultra_white",
        }
    }

    /// An owned copy of the preset profile.
    pub fn profile(&self) -> ScanProfile {
        match self {
            Self::Default => DEFAULT_PROFILE,
            Self::Balanced => BALANCED_PROFILE,
            Self::Natural => NATURAL_PROFILE,
            Self::UltraWhite => ULTRA_WHITE_PROFILE,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ScanError::Config(format!("unknown preset `{s}`")))
    }
}

/// What the caller intends to do with the scan. Selects the base profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    #[default]
    Standard,
    Balanced,
    Natural,
    UltraWhite,
    /// High-contrast binarized output for a downstream OCR engine.
    Ocr,
    /// Tuned for paper reproduction at a higher resolution.
    Printing,
}

impl ScanMode {
    pub const ALL: [ScanMode; 6] = [
        Self::Standard,
        Self::Balanced,
        Self::Natural,
        Self::UltraWhite,
        Self::Ocr,
        Self::Printing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Balanced => "balanced",
            Self::Natural => "natural",
            Self::UltraWhite => "ultra_white",
            Self::Ocr => "ocr",
            Self::Printing => "printing",
        }
    }

    pub fn profile(&self) -> ScanProfile {
        match self {
            Self::Standard => Preset::Default.profile(),
            Self::Balanced => Preset::Balanced.profile(),
            Self::Natural => Preset::Natural.profile(),
            Self::UltraWhite => Preset::UltraWhite.profile(),
            Self::Ocr => OCR_PROFILE,
            Self::Printing => PRINTING_PROFILE,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        // Preset names are accepted as aliases.
        if s == "default" {
            return Ok(Self::Standard);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScanError::Config(format!("unknown scan mode `{s}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_parameters() {
        for preset in Preset::ALL {
            let profile = preset.profile();
            assert_eq!(profile.output, OUTPUT, "{preset} output bounds");
            assert!(!profile.binarization.enable, "{preset} binarizes by default");
        }
    }

    #[test]
    fn retrieval_returns_independent_copies() {
        let mut first = Preset::Balanced.profile();
        first.output.max_width = 10;
        assert_eq!(Preset::Balanced.profile().output.max_width, 2000);
    }

    #[test]
    fn ocr_mode_binarizes_onto_white() {
        let profile = ScanMode::Ocr.profile();
        assert!(profile.geometric.enable_perspective);
        assert!(profile.binarization.enable);
        assert!(profile.output.white_background);
        assert!(!profile.enhancement.sharpen);
        assert_eq!(
            profile.binarization.method,
            BinarizationMethod::AdaptiveGaussian(AdaptiveOptions {
                block_size: 15,
                c_constant: 4.0,
            })
        );
    }

    #[test]
    fn printing_mode_raises_bounds_and_enables_gamma() {
        let profile = ScanMode::Printing.profile();
        assert_eq!((profile.output.max_width, profile.output.max_height), (3000, 3000));
        assert!(profile.enhancement.gamma_correction);
        assert!(!profile.binarization.enable);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for preset in Preset::ALL {
            assert_eq!(preset.as_str().parse::<Preset>().unwrap(), preset);
        }
        for mode in ScanMode::ALL {
            assert_eq!(mode.as_str().parse::<ScanMode>().unwrap(), mode);
        }
        assert_eq!("default".parse::<ScanMode>().unwrap(), ScanMode::Standard);
        assert!("sepia".parse::<Preset>().is_err());
    }

    #[test]
    fn default_profile_matches_preset() {
        assert_eq!(ScanProfile::default(), Preset::Default.profile());
    }
}
