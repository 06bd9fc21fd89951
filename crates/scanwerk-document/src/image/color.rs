// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour-space helpers on 8-bit images: luminance, HSV value, and an 8-bit
// CIE L*a*b* encoding (L scaled to 0..=255, a/b offset by 128).

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

/// BT.601 luminance, rounded.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// The V channel of HSV, i.e. the per-pixel maximum of R, G and B.
pub fn hsv_value(rgb: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        Luma([r.max(g).max(b)])
    })
}

// -- L*a*b* -------------------------------------------------------------------

const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;
const EPSILON: f32 = 0.008_856;

fn srgb_to_linear(c: u8) -> f32 {
    let c = f32::from(c) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let v = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > EPSILON {
        cube
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

/// Split an RGB image into 8-bit L, a and b planes.
pub fn rgb_to_lab(rgb: &RgbImage) -> [GrayImage; 3] {
    let lut: Vec<f32> = (0..=255u8).map(srgb_to_linear).collect();
    let (w, h) = rgb.dimensions();
    let mut l_plane = GrayImage::new(w, h);
    let mut a_plane = GrayImage::new(w, h);
    let mut b_plane = GrayImage::new(w, h);

    for (x, y, px) in rgb.enumerate_pixels() {
        let [r, g, b] = px.0.map(|c| lut[c as usize]);
        let xx = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / XN;
        let yy = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
        let zz = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / ZN;

        let (fx, fy, fz) = (lab_f(xx), lab_f(yy), lab_f(zz));
        let l = if yy > EPSILON {
            116.0 * fy - 16.0
        } else {
            903.3 * yy
        };
        let a = 500.0 * (fx - fy) + 128.0;
        let bb = 200.0 * (fy - fz) + 128.0;

        l_plane.put_pixel(x, y, Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8]));
        a_plane.put_pixel(x, y, Luma([a.round().clamp(0.0, 255.0) as u8]));
        b_plane.put_pixel(x, y, Luma([bb.round().clamp(0.0, 255.0) as u8]));
    }

    [l_plane, a_plane, b_plane]
}

/// Inverse of [`rgb_to_lab`]. All planes must share the same dimensions.
pub fn lab_to_rgb(lab: &[GrayImage; 3]) -> RgbImage {
    let [l_plane, a_plane, b_plane] = lab;
    ImageBuffer::from_fn(l_plane.width(), l_plane.height(), |x, y| {
        let l = f32::from(l_plane.get_pixel(x, y).0[0]) * 100.0 / 255.0;
        let a = f32::from(a_plane.get_pixel(x, y).0[0]) - 128.0;
        let b = f32::from(b_plane.get_pixel(x, y).0[0]) - 128.0;

        let fy = (l + 16.0) / 116.0;
        let fx = fy + a / 500.0;
        let fz = fy - b / 200.0;

        let yy = if l > 7.999_6 { fy * fy * fy } else { l / 903.3 };
        let xx = lab_f_inv(fx) * XN;
        let zz = lab_f_inv(fz) * ZN;

        let r = 3.240_479 * xx - 1.537_150 * yy - 0.498_535 * zz;
        let g = -0.969_256 * xx + 1.875_991 * yy + 0.041_556 * zz;
        let bl = 0.055_648 * xx - 0.204_043 * yy + 1.057_311 * zz;

        Rgb([linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_conversion_uses_bt601_weights() {
        let rgb = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(rgb_to_gray(&rgb).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn hsv_value_is_channel_max() {
        let rgb = RgbImage::from_pixel(1, 1, Rgb([12, 200, 90]));
        assert_eq!(hsv_value(&rgb).get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn lab_round_trip_is_close() {
        let rgb = RgbImage::from_fn(16, 16, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        let back = lab_to_rgb(&rgb_to_lab(&rgb));
        for (a, b) in rgb.pixels().zip(back.pixels()) {
            for c in 0..3 {
                let diff = (i32::from(a.0[c]) - i32::from(b.0[c])).abs();
                assert!(diff <= 6, "channel drift {diff} for {a:?} -> {b:?}");
            }
        }
    }

    #[test]
    fn neutral_gray_has_centred_chroma() {
        let rgb = RgbImage::from_pixel(1, 1, Rgb([128, 128, 128]));
        let [_, a, b] = rgb_to_lab(&rgb);
        assert!((i32::from(a.get_pixel(0, 0).0[0]) - 128).abs() <= 1);
        assert!((i32::from(b.get_pixel(0, 0).0[0]) - 128).abs() <= 1);
    }
}
