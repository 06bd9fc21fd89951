// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel buffer shared by every pipeline stage: an 8-bit grayscale or 8-bit
// three-channel image. Alpha is dropped on the way in.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::Size;

use super::color;

/// An 8-bit image with one or three channels.
///
/// Stages never mutate the buffer they are given; every transformation
/// returns a fresh buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PixelBuffer {
    // -- Construction ---------------------------------------------------------

    /// Convert a decoded image. Single-channel sources stay single-channel;
    /// everything else becomes RGB.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::Gray(gray),
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
                Self::Gray(image.to_luma8())
            }
            DynamicImage::ImageRgb8(rgb) => Self::Rgb(rgb),
            other => Self::Rgb(other.to_rgb8()),
        }
    }

    /// Wrap a gray plane with the same channel layout as `self`.
    ///
    /// Used by stages whose algorithm works on luminance but whose contract
    /// is to preserve the channel count.
    pub fn like(&self, gray: GrayImage) -> Self {
        match self {
            Self::Gray(_) => Self::Gray(gray),
            Self::Rgb(_) => Self::Rgb(color::gray_to_rgb(&gray)),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgb(img) => img.height(),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn channels(&self) -> u8 {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Raw interleaved samples.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
        }
    }

    /// Mean over all samples of all channels.
    pub fn mean(&self) -> f64 {
        let raw = self.as_raw();
        if raw.is_empty() {
            return 0.0;
        }
        raw.iter().map(|&v| f64::from(v)).sum::<f64>() / raw.len() as f64
    }

    // -- Conversions ----------------------------------------------------------

    /// Luminance plane (BT.601 weights for RGB).
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Rgb(img) => color::rgb_to_gray(img),
        }
    }

    pub fn into_gray(self) -> GrayImage {
        match self {
            Self::Gray(img) => img,
            Self::Rgb(img) => color::rgb_to_gray(&img),
        }
    }

    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Gray(img) => color::gray_to_rgb(img),
            Self::Rgb(img) => img.clone(),
        }
    }

    // -- Per-channel processing -----------------------------------------------

    /// Split into independent channel planes (one for gray, three for RGB).
    pub fn planes(&self) -> Vec<GrayImage> {
        match self {
            Self::Gray(img) => vec![img.clone()],
            Self::Rgb(img) => (0..3)
                .map(|c| {
                    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
                        Luma([img.get_pixel(x, y).0[c]])
                    })
                })
                .collect(),
        }
    }

    /// Reassemble planes produced by [`PixelBuffer::planes`].
    pub fn from_planes(planes: Vec<GrayImage>) -> Result<Self> {
        match planes.as_slice() {
            [gray] => Ok(Self::Gray(gray.clone())),
            [r, g, b] => {
                if r.dimensions() != g.dimensions() || r.dimensions() != b.dimensions() {
                    return Err(ScanError::invalid(
                        "merge",
                        "channel planes differ in size",
                    ));
                }
                Ok(Self::Rgb(ImageBuffer::from_fn(r.width(), r.height(), |x, y| {
                    Rgb([
                        r.get_pixel(x, y).0[0],
                        g.get_pixel(x, y).0[0],
                        b.get_pixel(x, y).0[0],
                    ])
                })))
            }
            other => Err(ScanError::UnsupportedChannels {
                stage: "merge",
                channels: other.len().min(u8::MAX as usize) as u8,
            }),
        }
    }

    /// Run `f` on every channel independently and reassemble the result.
    pub fn map_planes<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&GrayImage) -> Result<GrayImage>,
    {
        let planes = self
            .planes()
            .iter()
            .map(&mut f)
            .collect::<Result<Vec<_>>>()?;
        Self::from_planes(planes)
    }

    /// Apply a sample-wise mapping to every channel.
    pub fn map_samples<F>(&self, f: F) -> Self
    where
        F: Fn(u8) -> u8,
    {
        match self {
            Self::Gray(img) => {
                let mut out = img.clone();
                out.iter_mut().for_each(|v| *v = f(*v));
                Self::Gray(out)
            }
            Self::Rgb(img) => {
                let mut out = img.clone();
                out.iter_mut().for_each(|v| *v = f(*v));
                Self::Rgb(out)
            }
        }
    }

    /// Apply a 256-entry lookup table to every sample.
    pub fn apply_lut(&self, lut: &[u8; 256]) -> Self {
        self.map_samples(|v| lut[v as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_input_becomes_rgb() {
        let rgba = image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 0]));
        let buffer = PixelBuffer::from_dynamic(DynamicImage::ImageRgba8(rgba));
        assert_eq!(buffer.channels(), 3);
        assert_eq!(buffer.size(), Size::new(4, 3));
    }

    #[test]
    fn planes_round_trip() {
        let rgb = RgbImage::from_fn(5, 4, |x, y| Rgb([x as u8, y as u8, (x + y) as u8]));
        let buffer = PixelBuffer::Rgb(rgb);
        let rebuilt = PixelBuffer::from_planes(buffer.planes()).unwrap();
        assert_eq!(rebuilt, buffer);
    }

    #[test]
    fn map_planes_keeps_channel_count() {
        let gray = PixelBuffer::Gray(GrayImage::from_pixel(3, 3, Luma([7])));
        let out = gray.map_planes(|p| Ok(p.clone())).unwrap();
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn mismatched_planes_are_rejected() {
        let planes = vec![
            GrayImage::new(2, 2),
            GrayImage::new(2, 2),
            GrayImage::new(3, 2),
        ];
        assert!(PixelBuffer::from_planes(planes).is_err());
        assert!(PixelBuffer::from_planes(vec![]).is_err());
    }

    #[test]
    fn like_replicates_gray_into_rgb() {
        let rgb = PixelBuffer::Rgb(RgbImage::new(2, 2));
        let out = rgb.like(GrayImage::from_pixel(2, 2, Luma([99])));
        assert_eq!(out.channels(), 3);
        assert!(out.as_raw().iter().all(|&v| v == 99));
    }
}
