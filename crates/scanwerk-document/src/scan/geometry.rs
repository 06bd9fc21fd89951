// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric correction — perspective rectification from a detected page
// outline, deskew, content cropping, and the final white-border trim.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_core::config::GeometricConfig;
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::Quadrilateral;
use tracing::{debug, info, instrument};

use super::skew::estimate_skew;
use super::stage::StageLog;
use crate::image::contour::{approximate_polygon, contour_points, perimeter, polygon_area};
use crate::image::filters::gaussian_blur;
use crate::image::morphology::{self, StructuringElement};
use crate::image::threshold::{AdaptiveKind, adaptive_threshold, apply_threshold, otsu_threshold};
use crate::image::{ImageProcessor, PixelBuffer};

/// Rotations smaller than this are not worth the resampling.
pub const MIN_DESKEW_ANGLE: f32 = 0.5;

/// Margin kept around detected content when cropping.
pub const CROP_MARGIN: u32 = 10;

/// Pixels brighter than this count as white border.
pub const WHITE_BORDER_THRESHOLD: u8 = 240;

/// A page outline must cover at least this share of the image.
const MIN_PAGE_AREA_RATIO: f32 = 0.1;

/// How many of the largest outlines are tried as page candidates.
const PAGE_CANDIDATES: usize = 5;

/// Runs perspective → deskew → crop. Stateless; one instance can serve any
/// number of images.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometricCorrector;

impl GeometricCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Apply the enabled corrections in order. Each one falls back to its
    /// own input on failure and is recorded in `log`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn correct(&self, image: PixelBuffer, config: &GeometricConfig, log: &mut StageLog) -> PixelBuffer {
        let image = log.run("perspective", config.enable_perspective, image, |img| {
            self.perspective_correction(img)
        });
        let image = log.run("deskew", config.enable_deskew, image, |img| self.deskew(img));
        log.run("crop", config.enable_crop, image, |img| self.crop_document(img, CROP_MARGIN))
    }

    // -- Perspective ----------------------------------------------------------

    /// Locate the page outline: the largest external contour covering at least
    /// 10% of the image whose polygon approximation has exactly four corners.
    #[instrument(skip_all)]
    pub fn find_document_quad(&self, image: &PixelBuffer) -> Result<Quadrilateral> {
        let gray = image.to_gray();
        let blurred = gaussian_blur(&gray, 5);
        let thresh = adaptive_threshold(&blurred, 11, 2.0, AdaptiveKind::Gaussian);
        let closed = morphology::close(&thresh, StructuringElement::square(3), 1);
        let edges = canny(&closed, 75.0, 200.0);

        let mut outlines: Vec<_> = find_contours::<u32>(&edges)
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(contour_points)
            .map(|points| (polygon_area(&points), points))
            .collect();
        outlines.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_area = image.size().area() as f32 * MIN_PAGE_AREA_RATIO;
        for (area, points) in outlines.iter().take(PAGE_CANDIDATES) {
            if *area < min_area {
                continue;
            }
            let corners = approximate_polygon(points, 0.02 * perimeter(points));
            if corners.len() == 4 {
                info!(area, "Page outline found");
                return Quadrilateral::from_points(&corners);
            }
            debug!(area, vertices = corners.len(), "Outline is not a quadrilateral");
        }
        Err(ScanError::NotFound("no four-cornered page outline".into()))
    }

    /// Warp the detected page onto an upright rectangle sized by its longest
    /// opposing edges.
    #[instrument(skip_all)]
    pub fn perspective_correction(&self, image: &PixelBuffer) -> Result<PixelBuffer> {
        let quad = self.find_document_quad(image)?;
        let size = quad.target_size();
        let (w, h) = ((size.width - 1).max(1) as f32, (size.height - 1).max(1) as f32);

        let src = quad.corners().map(|p| (p.x, p.y));
        let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            ScanError::DegenerateImage("page corners do not define a projection".into())
        })?;

        let warped = match image {
            PixelBuffer::Gray(img) => {
                let mut out = GrayImage::new(size.width, size.height);
                warp_into(img, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
                PixelBuffer::Gray(out)
            }
            PixelBuffer::Rgb(img) => {
                let mut out = RgbImage::new(size.width, size.height);
                warp_into(img, &projection, Interpolation::Bilinear, Rgb([255u8, 255, 255]), &mut out);
                PixelBuffer::Rgb(out)
            }
        };
        info!(width = size.width, height = size.height, "Perspective corrected");
        Ok(warped)
    }

    // -- Deskew ---------------------------------------------------------------

    /// Rotate so text lines run horizontally. Angles under half a degree are
    /// left alone.
    #[instrument(skip_all)]
    pub fn deskew(&self, image: &PixelBuffer) -> Result<PixelBuffer> {
        if image.is_empty() {
            return Err(ScanError::DegenerateImage("empty image".into()));
        }
        let estimate = estimate_skew(&image.to_gray());
        if estimate.angle.abs() < MIN_DESKEW_ANGLE {
            info!(angle = estimate.angle, "Skew below noise floor; not rotating");
            return Ok(image.clone());
        }
        info!(angle = estimate.angle, votes = estimate.votes(), "Deskewing");
        Ok(ImageProcessor::from_buffer(image.clone())
            .rotate(-estimate.angle)
            .into_buffer())
    }

    // -- Cropping -------------------------------------------------------------

    /// Crop to the bounding box of dark (Otsu foreground) content plus
    /// `margin` pixels, clamped to the image.
    #[instrument(skip(self, image))]
    pub fn crop_document(&self, image: &PixelBuffer, margin: u32) -> Result<PixelBuffer> {
        let gray = image.to_gray();
        let ink = apply_threshold(&gray, otsu_threshold(&gray), true);
        let (x0, y0, x1, y1) = bounding_box(&ink, |v| v > 0)
            .ok_or_else(|| ScanError::NotFound("no document content".into()))?;

        let x = x0.saturating_sub(margin);
        let y = y0.saturating_sub(margin);
        let width = (x1 + margin + 1).min(image.width()) - x;
        let height = (y1 + margin + 1).min(image.height()) - y;
        info!(x, y, width, height, "Cropping to content");
        Ok(ImageProcessor::from_buffer(image.clone())
            .crop(x, y, width, height)
            .into_buffer())
    }

    /// Trim the outer band of near-white pixels (above `threshold`). An image
    /// with nothing but white is returned unchanged.
    #[instrument(skip(self, image))]
    pub fn auto_crop_white_borders(&self, image: &PixelBuffer, threshold: u8) -> PixelBuffer {
        let gray = image.to_gray();
        let Some((x0, y0, x1, y1)) = bounding_box(&gray, |v| v <= threshold) else {
            debug!("No content below the white threshold");
            return image.clone();
        };
        if (x0, y0, x1 + 1, y1 + 1) == (0, 0, image.width(), image.height()) {
            return image.clone();
        }
        debug!(x0, y0, x1, y1, "Trimming white borders");
        ImageProcessor::from_buffer(image.clone())
            .crop(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
            .into_buffer()
    }
}

/// Inclusive bounding box `(x0, y0, x1, y1)` of pixels matching `keep`.
fn bounding_box(gray: &GrayImage, keep: impl Fn(u8) -> bool) -> Option<(u32, u32, u32, u32)> {
    let mut bbox: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in gray.enumerate_pixels() {
        if !keep(p.0[0]) {
            continue;
        }
        bbox = Some(match bbox {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bbox
}
