// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, working-resolution resize and restore, rotation
// with canvas expansion, crop, and encode. Operates on in-memory pixel
// buffers using the `image` and `imageproc` crates.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_core::error::{Result, ScanError};
use tracing::{debug, info, instrument};

use super::buffer::PixelBuffer;

/// Input formats the decoder accepts.
pub const SUPPORTED_FORMATS: &[&str] = &["JPEG", "PNG", "BMP", "TIFF", "WEBP", "GIF"];

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let (processor, scale) = ImageProcessor::open("photo.jpg")?.resize_to_fit(2000, 2000);
/// let bytes = processor.rotate(-3.5).to_jpeg_bytes(95)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: PixelBuffer,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanError::Decode(format!("failed to open {}: {}", path.as_ref().display(), err))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self {
            image: PixelBuffer::from_dynamic(img),
        })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ScanError::Decode(format!("failed to decode image: {}", err)))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self {
            image: PixelBuffer::from_dynamic(img),
        })
    }

    /// Wrap an already-decoded buffer.
    pub fn from_buffer(image: PixelBuffer) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_buffer(&self) -> &PixelBuffer {
        &self.image
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Downscale to fit within `max_width` x `max_height`, preserving aspect
    /// ratio. Never upscales. Returns the processor and the scale factor that
    /// was applied (1.0 when the image already fits).
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize_to_fit(self, max_width: u32, max_height: u32) -> (Self, f64) {
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 || max_width == 0 || max_height == 0 {
            return (self, 1.0);
        }

        let scale = (f64::from(max_width) / f64::from(w))
            .min(f64::from(max_height) / f64::from(h))
            .min(1.0);
        if scale >= 1.0 {
            return (self, 1.0);
        }

        let new_w = ((f64::from(w) * scale) as u32).max(1);
        let new_h = ((f64::from(h) * scale) as u32).max(1);
        info!(from_w = w, from_h = h, new_w, new_h, scale, "Resizing to working resolution");
        (self.resample(new_w, new_h, FilterType::Lanczos3), scale)
    }

    /// Resize to exactly `width` x `height` with Catmull-Rom interpolation.
    /// Used to restore the original resolution after processing.
    #[instrument(skip(self), fields(width, height))]
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        if (width, height) == (self.width(), self.height()) {
            return self;
        }
        debug!(from_w = self.width(), from_h = self.height(), width, height, "Resampling");
        self.resample(width.max(1), height.max(1), FilterType::CatmullRom)
    }

    fn resample(self, width: u32, height: u32, filter: FilterType) -> Self {
        let image = match &self.image {
            PixelBuffer::Gray(img) => PixelBuffer::Gray(imageops::resize(img, width, height, filter)),
            PixelBuffer::Rgb(img) => PixelBuffer::Rgb(imageops::resize(img, width, height, filter)),
        };
        Self { image }
    }

    /// Rotate the image by an arbitrary angle in degrees (clockwise on screen).
    ///
    /// For 90/180/270 degree rotations, lossless rotation is used. For other
    /// angles, a bilinear affine warp is applied and the canvas expands to
    /// contain the whole rotated image; uncovered corners are filled white.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        info!(degrees, "Rotating image");

        // Fast-path for exact multiples of 90.
        let normalised = degrees.rem_euclid(360.0);
        let quarter = |img: PixelBuffer, f: fn(&GrayImage) -> GrayImage, g: fn(&RgbImage) -> RgbImage| match img {
            PixelBuffer::Gray(i) => PixelBuffer::Gray(f(&i)),
            PixelBuffer::Rgb(i) => PixelBuffer::Rgb(g(&i)),
        };
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: quarter(self.image, imageops::rotate90, imageops::rotate90),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: quarter(self.image, imageops::rotate180, imageops::rotate180),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: quarter(self.image, imageops::rotate270, imageops::rotate270),
            };
        }
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }

        let (w, h) = (self.width() as f32, self.height() as f32);
        let theta = degrees.to_radians();
        let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
        let new_w = (w * cos + h * sin).ceil().max(1.0) as u32;
        let new_h = (w * sin + h * cos).ceil().max(1.0) as u32;

        // Centre on the origin, rotate, then re-centre on the larger canvas.
        let projection = Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0)
            * Projection::rotate(theta)
            * Projection::translate(-w / 2.0, -h / 2.0);

        let image = match &self.image {
            PixelBuffer::Gray(img) => {
                let mut out = GrayImage::new(new_w, new_h);
                warp_into(img, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
                PixelBuffer::Gray(out)
            }
            PixelBuffer::Rgb(img) => {
                let mut out = RgbImage::new(new_w, new_h);
                warp_into(img, &projection, Interpolation::Bilinear, Rgb([255u8, 255, 255]), &mut out);
                PixelBuffer::Rgb(out)
            }
        };
        debug!(new_w, new_h, "General rotation applied");
        Self { image }
    }

    /// Crop a rectangular region from the image.
    ///
    /// `x` and `y` are the top-left corner; `width` and `height` define the
    /// size of the crop rectangle. Values are clamped to image bounds.
    #[instrument(skip(self), fields(x, y, width, height))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let img_w = self.width();
        let img_h = self.height();

        let safe_x = x.min(img_w.saturating_sub(1));
        let safe_y = y.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w.saturating_sub(safe_x));
        let safe_h = height.min(img_h.saturating_sub(safe_y));

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image");

        let image = match &self.image {
            PixelBuffer::Gray(img) => {
                PixelBuffer::Gray(imageops::crop_imm(img, safe_x, safe_y, safe_w, safe_h).to_image())
            }
            PixelBuffer::Rgb(img) => {
                PixelBuffer::Rgb(imageops::crop_imm(img, safe_x, safe_y, safe_w, safe_h).to_image())
            }
        };
        Self { image }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        let result = match &self.image {
            PixelBuffer::Gray(img) => img.write_with_encoder(encoder),
            PixelBuffer::Rgb(img) => img.write_with_encoder(encoder),
        };
        result.map_err(|err| ScanError::Encode(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(w: u32, h: u32) -> ImageProcessor {
        ImageProcessor::from_buffer(PixelBuffer::Rgb(RgbImage::from_pixel(w, h, Rgb([90, 90, 90]))))
    }

    /// Images inside the bounds are never upscaled.
    #[test]
    fn resize_to_fit_never_upscales() {
        let (p, scale) = rgb(300, 200).resize_to_fit(2000, 2000);
        assert_eq!(scale, 1.0);
        assert_eq!((p.width(), p.height()), (300, 200));
    }

    /// Downscale honours the tighter bound and keeps the aspect ratio.
    #[test]
    fn resize_to_fit_uses_tighter_bound() {
        let (p, scale) = rgb(4000, 1000).resize_to_fit(2000, 2000);
        assert!((scale - 0.5).abs() < 1e-12);
        assert_eq!((p.width(), p.height()), (2000, 500));
    }

    /// Restoring to the recorded size gives back the original dimensions.
    #[test]
    fn resize_round_trip_restores_exact_size() {
        let (small, _) = rgb(3001, 2203).resize_to_fit(2000, 2000);
        let restored = small.resize_exact(3001, 2203);
        assert_eq!((restored.width(), restored.height()), (3001, 2203));
    }

    /// A general rotation grows the canvas and fills corners with white.
    #[test]
    fn rotate_expands_canvas_with_white() {
        let p = rgb(200, 100).rotate(30.0);
        assert!(p.width() > 200 && p.height() > 100);
        match p.as_buffer() {
            PixelBuffer::Rgb(img) => assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]),
            _ => panic!("channel count changed"),
        }
    }

    /// Quarter turns swap dimensions losslessly.
    #[test]
    fn rotate_quarter_turn_swaps_dimensions() {
        let p = rgb(20, 10).rotate(90.0);
        assert_eq!((p.width(), p.height()), (10, 20));
    }

    /// Crop rectangles are clamped to the image.
    #[test]
    fn crop_clamps_to_bounds() {
        let p = rgb(50, 40).crop(30, 30, 100, 100);
        assert_eq!((p.width(), p.height()), (20, 10));
    }

    /// Encoded output decodes back to the same dimensions.
    #[test]
    fn jpeg_bytes_decode_again() {
        let bytes = rgb(32, 16).to_jpeg_bytes(90).unwrap();
        let decoded = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    /// Garbage input is a decode error, not a panic.
    #[test]
    fn from_bytes_rejects_garbage() {
        let err = ImageProcessor::from_bytes(b"not an image").err().unwrap();
        assert!(matches!(err, ScanError::Decode(_)));
    }
}
