// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grayscale morphology with rectangular and elliptical structuring elements,
// built on imageproc's masked min/max filters. Out-of-bounds neighbours are
// ignored, so borders neither grow nor shrink artificially.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Largest side a structuring element may have.
const MAX_SIDE: u32 = 255;

/// Shape of the neighbourhood used by erosion and dilation. The anchor is the
/// element's centre (`size / 2` on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
    Rect { width: u32, height: u32 },
    Ellipse { size: u32 },
}

impl StructuringElement {
    pub fn square(size: u32) -> Self {
        Self::Rect {
            width: size,
            height: size,
        }
    }

    fn mask(&self) -> Mask {
        match *self {
            Self::Rect { width, height } => {
                let (w, h) = (width.clamp(1, MAX_SIDE), height.clamp(1, MAX_SIDE));
                if w == h && w % 2 == 1 {
                    return Mask::square((w / 2) as u8);
                }
                let footprint = GrayImage::from_pixel(w, h, Luma([255]));
                Mask::from_image(&footprint, (w / 2) as u8, (h / 2) as u8)
            }
            Self::Ellipse { size } => Mask::disk((size.clamp(1, MAX_SIDE) / 2) as u8),
        }
    }
}

pub fn erode(src: &GrayImage, element: StructuringElement) -> GrayImage {
    grayscale_erode(src, &element.mask())
}

pub fn dilate(src: &GrayImage, element: StructuringElement) -> GrayImage {
    grayscale_dilate(src, &element.mask())
}

fn repeat(src: &GrayImage, times: u32, mask: &Mask, f: fn(&GrayImage, &Mask) -> GrayImage) -> GrayImage {
    let mut out = f(src, mask);
    for _ in 1..times.max(1) {
        out = f(&out, mask);
    }
    out
}

pub fn dilate_n(src: &GrayImage, element: StructuringElement, iterations: u32) -> GrayImage {
    repeat(src, iterations, &element.mask(), grayscale_dilate)
}

/// Erosion then dilation, each repeated `iterations` times. Removes bright
/// specks smaller than the element.
pub fn open(src: &GrayImage, element: StructuringElement, iterations: u32) -> GrayImage {
    let mask = element.mask();
    let eroded = repeat(src, iterations, &mask, grayscale_erode);
    repeat(&eroded, iterations, &mask, grayscale_dilate)
}

/// Dilation then erosion, each repeated `iterations` times. Fills dark gaps
/// smaller than the element.
pub fn close(src: &GrayImage, element: StructuringElement, iterations: u32) -> GrayImage {
    let mask = element.mask();
    let dilated = repeat(src, iterations, &mask, grayscale_dilate);
    repeat(&dilated, iterations, &mask, grayscale_erode)
}
