// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation. Three independent estimators (Hough line angles,
// projection-profile search, text-line blob orientation) vote and the median
// of the ones that produced an answer wins.
//
// Angles are in degrees, positive when text lines run clockwise on screen
// (rising towards the bottom-right). Rotating by the negated angle levels them.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::hough::{LineDetectionOptions, detect_lines};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::image::contour::{contour_points, min_area_rect, polygon_area};
use crate::image::morphology::{self, StructuringElement};
use crate::image::stats::{percentile, variance_of};
use crate::image::threshold::{apply_threshold, otsu_threshold};

/// Lines whose angle from horizontal exceeds this are ignored.
const MAX_LINE_ANGLE: f32 = 30.0;

/// Projection search range and step.
const PROFILE_RANGE: f32 = 10.0;
const PROFILE_STEP: f32 = 0.5;

/// The projection search runs on a copy no larger than this on either side.
const PROFILE_MAX_SIDE: u32 = 600;

/// Text-line blobs smaller than this (in pixels of area) are noise.
const MIN_BLOB_AREA: f32 = 500.0;

/// Per-estimator results and the consensus angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkewEstimate {
    pub angle: f32,
    pub hough: Option<f32>,
    pub projection: Option<f32>,
    pub text_lines: Option<f32>,
}

impl SkewEstimate {
    /// Number of estimators that produced an angle.
    pub fn votes(&self) -> usize {
        [self.hough, self.projection, self.text_lines]
            .iter()
            .filter(|a| a.is_some())
            .count()
    }
}

/// Run all three estimators and take the median of those that succeeded.
/// An image with no usable structure has angle 0.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn estimate_skew(gray: &GrayImage) -> SkewEstimate {
    let hough = hough_skew(gray);
    let projection = projection_profile_skew(gray);
    let text_lines = text_line_skew(gray);

    let mut votes: Vec<f32> = [hough, projection, text_lines].into_iter().flatten().collect();
    let angle = if votes.is_empty() {
        0.0
    } else {
        percentile(&mut votes, 50.0)
    };

    debug!(?hough, ?projection, ?text_lines, angle, "Skew estimators finished");
    SkewEstimate {
        angle,
        hough,
        projection,
        text_lines,
    }
}

/// Median angle of near-horizontal Hough lines over a Canny edge map.
///
/// Needs at least five detected lines, three of them within 30 degrees of
/// horizontal.
pub fn hough_skew(gray: &GrayImage) -> Option<f32> {
    let edges = canny(gray, 50.0, 150.0);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: 100,
            suppression_radius: 4,
        },
    );
    if lines.len() < 5 {
        debug!(lines = lines.len(), "Too few Hough lines");
        return None;
    }

    // A line's polar angle is the direction of its normal: 90 for horizontal.
    let mut angles: Vec<f32> = lines
        .iter()
        .map(|line| line.angle_in_degrees as f32 - 90.0)
        .filter(|a| a.abs() < MAX_LINE_ANGLE)
        .collect();
    if angles.len() < 3 {
        return None;
    }
    Some(percentile(&mut angles, 50.0))
}

/// Angle in [-10, 10] whose de-rotation gives the spikiest row profile.
///
/// Works on an Otsu ink mask so the background does not dilute the profile.
/// Candidates are tried nearest-to-zero first, so flat profiles resolve to 0.
pub fn projection_profile_skew(gray: &GrayImage) -> Option<f32> {
    let small = downscale(gray, PROFILE_MAX_SIDE);
    let ink = ink_mask(&small)?;

    let steps = (PROFILE_RANGE / PROFILE_STEP) as i32;
    let candidates = std::iter::once(0.0).chain((1..=steps).flat_map(|i| {
        let a = i as f32 * PROFILE_STEP;
        [-a, a]
    }));

    let mut best: Option<(f32, f64)> = None;
    for angle in candidates {
        let rotated = rotate_about_center(&ink, (-angle).to_radians(), Interpolation::Nearest, Luma([0]));
        let score = variance_of(
            rotated
                .rows()
                .map(|row| row.map(|p| f64::from(p.0[0])).sum::<f64>()),
        );
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((angle, score));
        }
    }
    best.map(|(angle, _)| angle)
}

/// Median orientation of elongated ink blobs.
///
/// Ink is closed with a wide flat element so the glyphs of a line merge into
/// one blob; each large blob's minimum-area rectangle gives a line angle.
pub fn text_line_skew(gray: &GrayImage) -> Option<f32> {
    let ink = ink_mask(gray)?;
    let merged = morphology::close(&ink, StructuringElement::Rect { width: 20, height: 1 }, 1);

    let mut angles: Vec<f32> = find_contours::<u32>(&merged)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(contour_points)
        .filter(|points| polygon_area(points) > MIN_BLOB_AREA)
        .filter_map(|points| min_area_rect(&points))
        .map(|rect| fold_quarter(rect.long_side_angle()))
        .filter(|a| a.abs() < MAX_LINE_ANGLE)
        .collect();

    debug!(blobs = angles.len(), "Text-line blobs measured");
    if angles.len() < 3 {
        return None;
    }
    Some(percentile(&mut angles, 50.0))
}

/// Quick single-pass estimate used for quality reports: every Hough line
/// votes, horizontal and vertical alike, folded into [-45, 45).
pub fn quick_skew(gray: &GrayImage) -> f32 {
    let edges = canny(gray, 50.0, 150.0);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: 100,
            suppression_radius: 4,
        },
    );
    let mut angles: Vec<f32> = lines
        .iter()
        .map(|line| (line.angle_in_degrees as f32 + 45.0).rem_euclid(90.0) - 45.0)
        .collect();
    if angles.is_empty() {
        return 0.0;
    }
    percentile(&mut angles, 50.0)
}

/// Fold an angle into [-45, 45] modulo 90.
fn fold_quarter(angle: f32) -> f32 {
    if angle > 45.0 {
        angle - 90.0
    } else if angle < -45.0 {
        angle + 90.0
    } else {
        angle
    }
}

/// Dark pixels as 255, background as 0. `None` for images without contrast.
fn ink_mask(gray: &GrayImage) -> Option<GrayImage> {
    let (min, max) = gray
        .as_raw()
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min >= max {
        return None;
    }
    Some(apply_threshold(gray, otsu_threshold(gray), true))
}

fn downscale(gray: &GrayImage, max_side: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return gray.clone();
    }
    let scale = max_side as f32 / longest as f32;
    let nw = ((w as f32 * scale) as u32).max(1);
    let nh = ((h as f32 * scale) as u32).max(1);
    imageops::resize(gray, nw, nh, FilterType::Triangle)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Dark bars on a mid-gray page, tilted clockwise by `degrees`.
    pub(crate) fn tilted_lines(width: u32, height: u32, degrees: f32) -> GrayImage {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let (s, c) = degrees.to_radians().sin_cos();
        GrayImage::from_fn(width, height, |x, y| {
            // Undo the tilt to find where this pixel sits on the level page.
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let u = dx * c + dy * s;
            let v = -dx * s + dy * c;
            let in_block = u.abs() < 300.0 && v.abs() < 400.0;
            let on_bar = (v + 400.0).rem_euclid(40.0) < 12.0;
            Luma([if in_block && on_bar { 40 } else { 180 }])
        })
    }

    #[test]
    fn level_lines_have_no_skew() {
        let img = tilted_lines(1000, 1000, 0.0);
        let estimate = estimate_skew(&img);
        assert!(estimate.angle.abs() < 0.6, "{estimate:?}");
    }

    #[test]
    fn consensus_recovers_tilt() {
        let img = tilted_lines(1000, 1400, 7.0);
        let estimate = estimate_skew(&img);
        assert!(estimate.votes() >= 2, "{estimate:?}");
        assert!((estimate.angle - 7.0).abs() < 1.0, "{estimate:?}");
    }

    #[test]
    fn counter_clockwise_tilt_is_negative() {
        let img = tilted_lines(1000, 1000, -4.0);
        let projection = projection_profile_skew(&img).unwrap();
        assert!((projection + 4.0).abs() <= 1.0, "projection {projection}");
    }

    #[test]
    fn text_lines_measure_bar_orientation() {
        let img = tilted_lines(1000, 1000, 5.0);
        let angle = text_line_skew(&img).unwrap();
        assert!((angle - 5.0).abs() < 1.0, "angle {angle}");
    }

    #[test]
    fn blank_page_has_no_votes() {
        let img = GrayImage::from_pixel(300, 300, Luma([200]));
        let estimate = estimate_skew(&img);
        assert_eq!(estimate.votes(), 0);
        assert_eq!(estimate.angle, 0.0);
        assert_eq!(quick_skew(&img), 0.0);
    }

    #[test]
    fn quarter_fold() {
        assert_eq!(fold_quarter(80.0), -10.0);
        assert_eq!(fold_quarter(-50.0), 40.0);
        assert_eq!(fold_quarter(12.0), 12.0);
    }
}
