// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture quality analysis. Read-only: scores focus, lighting, tilt and
// contrast of a photo and suggests which processing would help.

use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::{OverallLevel, OverallQuality, QualityLevel, QualityMetric, QualityReport};
use tracing::{info, instrument};

use crate::image::PixelBuffer;
use crate::image::filters::gaussian_blur;
use crate::image::stats::{laplacian_variance, std_dev, variance};
use crate::scan::skew::quick_skew;

#[derive(Debug, Default, Clone, Copy)]
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Score the four metrics and combine them as
    /// `0.3 * sharpness + 0.3 * illumination + 0.2 * skew + 0.2 * contrast`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze(&self, image: &PixelBuffer) -> Result<QualityReport> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("empty image".into()));
        }
        let gray = image.to_gray();

        let focus = laplacian_variance(&gray);
        let sharpness = metric(
            focus,
            (focus / 1000.0).min(1.0),
            focus > 500.0,
            if focus <= 100.0 {
                "image is blurry, retake the photo"
            } else {
                "sharpness is acceptable"
            },
        );

        let lighting = variance(&gaussian_blur(&gray, 21));
        let illumination = metric(
            lighting,
            (1.0 - lighting / 5000.0).max(0.0),
            lighting < 2000.0,
            if lighting >= 3000.0 {
                "lighting is uneven, adjust the light source"
            } else {
                "lighting is even"
            },
        );

        let tilt = f64::from(quick_skew(&gray).abs());
        let level_page = tilt < 2.0;
        let skew = metric(
            tilt,
            if level_page { 1.0 } else { 0.5 },
            level_page,
            if tilt > 5.0 {
                "document is badly tilted, retake the photo"
            } else {
                "document orientation is fine"
            },
        );

        let spread = std_dev(&gray);
        let contrast = metric(
            spread,
            (spread / 100.0).min(1.0),
            spread > 50.0,
            if spread < 30.0 {
                "contrast is low, improve the lighting"
            } else {
                "contrast is good"
            },
        );

        let score = sharpness.score * 0.3 + illumination.score * 0.3 + skew.score * 0.2 + contrast.score * 0.2;
        let level = if score > 0.8 {
            OverallLevel::Excellent
        } else if score > 0.6 {
            OverallLevel::Good
        } else {
            OverallLevel::Poor
        };

        let recommendations: Vec<String> = [
            (&sharpness, "enable sharpening"),
            (&illumination, "use a larger median kernel for background flattening"),
            (&contrast, "enable CLAHE contrast enhancement"),
            (&skew, "enable deskew"),
        ]
        .into_iter()
        .filter(|(m, _)| m.level == QualityLevel::Poor)
        .map(|(_, advice)| advice.to_string())
        .collect();
        let recommendation = if recommendations.is_empty() {
            "image quality is good, standard processing is sufficient".to_string()
        } else {
            format!("suggested: {}", recommendations.join(", "))
        };

        info!(score, ?level, focus, lighting, tilt, spread, "Quality analysis finished");
        Ok(QualityReport {
            sharpness,
            illumination,
            skew,
            contrast,
            overall: OverallQuality {
                score,
                level,
                recommendations,
                recommendation,
            },
        })
    }
}

fn metric(value: f64, score: f64, good: bool, suggestion: &str) -> QualityMetric {
    QualityMetric {
        value,
        score,
        level: if good { QualityLevel::Good } else { QualityLevel::Poor },
        suggestion: Some(suggestion.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn flat_page_is_blurry_and_flat() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(64, 64, Luma([200])));
        let report = QualityAnalyzer::new().analyze(&img).unwrap();
        assert_eq!(report.sharpness.level, QualityLevel::Poor);
        assert_eq!(report.contrast.level, QualityLevel::Poor);
        assert_eq!(report.illumination.level, QualityLevel::Good);
        assert_eq!(report.skew.level, QualityLevel::Good);
        // 0.3 * 0 + 0.3 * 1 + 0.2 * 1 + 0.2 * 0
        assert!((report.overall.score - 0.5).abs() < 1e-9);
        assert_eq!(report.overall.level, OverallLevel::Poor);
        assert_eq!(
            report.overall.recommendations,
            vec!["enable sharpening", "enable CLAHE contrast enhancement"]
        );
    }

    #[test]
    fn crisp_checkerboard_scores_well() {
        let img = PixelBuffer::Gray(GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 2 + y / 2) % 2 == 0 { 20 } else { 235 }])
        }));
        let report = QualityAnalyzer::new().analyze(&img).unwrap();
        assert_eq!(report.sharpness.level, QualityLevel::Good);
        assert_eq!(report.contrast.level, QualityLevel::Good);
        assert!(report.sharpness.score > 0.99);
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = PixelBuffer::Gray(GrayImage::new(0, 0));
        assert!(QualityAnalyzer::new().analyze(&img).is_err());
    }
}
