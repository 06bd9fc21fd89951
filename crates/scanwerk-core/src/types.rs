// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Scanwerk: geometry primitives, stage outcomes, scan
// metadata and quality reports.

use serde::{Deserialize, Serialize};

use crate::config::ScanProfile;
use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A point in image coordinates (x to the right, y downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Four document corners in the order top-left, top-right, bottom-right,
/// bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quadrilateral {
    /// Order four unordered corners around their centroid.
    ///
    /// Corners are sorted clockwise (on screen) by their angle from the
    /// centroid, then rotated so the corner with the smallest `x + y` comes
    /// first.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        if points.len() != 4 {
            return Err(ScanError::invalid(
                "quadrilateral",
                format!("expected 4 corners, got {}", points.len()),
            ));
        }

        let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

        let mut ordered: Vec<Point> = points.to_vec();
        ordered.sort_by(|a, b| {
            let ta = (a.y - cy).atan2(a.x - cx);
            let tb = (b.y - cy).atan2(b.x - cx);
            ta.total_cmp(&tb)
        });

        let start = ordered
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        ordered.rotate_left(start);

        let quad = Self {
            top_left: ordered[0],
            top_right: ordered[1],
            bottom_right: ordered[2],
            bottom_left: ordered[3],
        };

        if quad.area() < 1.0 {
            return Err(ScanError::DegenerateImage(
                "quadrilateral corners are collinear".into(),
            ));
        }
        Ok(quad)
    }

    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Shoelace area.
    pub fn area(&self) -> f32 {
        let c = self.corners();
        let mut sum = 0.0f32;
        for i in 0..4 {
            let j = (i + 1) % 4;
            sum += c[i].x * c[j].y - c[j].x * c[i].y;
        }
        sum.abs() / 2.0
    }

    /// Size of the rectified page: the longer of each pair of opposing edges.
    pub fn target_size(&self) -> Size {
        let width = self
            .top_left
            .distance(&self.top_right)
            .max(self.bottom_left.distance(&self.bottom_right));
        let height = self
            .top_left
            .distance(&self.bottom_left)
            .max(self.top_right.distance(&self.bottom_right));
        Size::new(width.round().max(1.0) as u32, height.round().max(1.0) as u32)
    }
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

/// What happened to one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Applied,
    /// The stage failed and its input was passed through unchanged.
    Degraded { reason: String },
    /// The stage was switched off by configuration.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl StageReport {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, StageStatus::Degraded { .. })
    }
}

/// Metadata describing one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub original_size: Size,
    pub final_size: Size,
    /// Working-resolution scale applied before processing (1.0 if none).
    pub scale_factor: f64,
    pub config_used: ScanProfile,
    /// Set when the pipeline fell back to returning the original image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<StageReport>,
}

// ---------------------------------------------------------------------------
// Quality analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Good,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallLevel {
    Excellent,
    Good,
    Poor,
}

/// One scored quality measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    /// Raw measurement (Laplacian variance, degrees, std-dev...).
    pub value: f64,
    /// Normalised score in 0.0..=1.0.
    pub score: f64,
    pub level: QualityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallQuality {
    pub score: f64,
    pub level: OverallLevel,
    /// One entry per poor metric.
    pub recommendations: Vec<String>,
    /// Human-readable summary of `recommendations`.
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub sharpness: QualityMetric,
    pub illumination: QualityMetric,
    pub skew: QualityMetric,
    pub contrast: QualityMetric,
    pub overall: OverallQuality,
}

/// Image statistics that drive automatic binarization method selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// Variance of a heavily blurred copy, i.e. of the illumination field.
    pub illumination_variance: f64,
    /// Histogram variance scaled into roughly 0..=1.
    pub contrast: f64,
    /// Laplacian variance scaled by 1/10000.
    pub noise_level: f64,
    /// Share of pixels on a Canny edge.
    pub edge_density: f64,
}

/// Scores for a finished binarization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinarizationQuality {
    pub edge_preservation: f64,
    pub separation: f64,
    pub noise_ratio: f64,
    pub overall: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrilateral_orders_scrambled_corners() {
        let pts = [
            Point::new(90.0, 110.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 100.0),
            Point::new(95.0, 10.0),
        ];
        let quad = Quadrilateral::from_points(&pts).unwrap();
        assert_eq!(quad.top_left, Point::new(10.0, 5.0));
        assert_eq!(quad.top_right, Point::new(95.0, 10.0));
        assert_eq!(quad.bottom_right, Point::new(90.0, 110.0));
        assert_eq!(quad.bottom_left, Point::new(5.0, 100.0));
    }

    #[test]
    fn quadrilateral_needs_exactly_four_points() {
        let pts = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        assert!(Quadrilateral::from_points(&pts).is_err());
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ];
        assert!(Quadrilateral::from_points(&pts).is_err());
    }

    #[test]
    fn target_size_uses_longest_opposing_edges() {
        let quad = Quadrilateral {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(100.0, 0.0),
            bottom_right: Point::new(120.0, 200.0),
            bottom_left: Point::new(0.0, 200.0),
        };
        let size = quad.target_size();
        assert_eq!(size.width, 120);
        assert_eq!(size.height, 201);
    }

    #[test]
    fn stage_report_serializes_flat() {
        let report = StageReport {
            stage: "deskew".into(),
            status: StageStatus::Degraded {
                reason: "no lines".into(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "deskew");
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "no lines");
        assert!(report.is_degraded());
    }
}
