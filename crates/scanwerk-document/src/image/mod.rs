// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — the pixel buffer, decode/resize/rotate/crop/encode, colour
// conversions, and the low-level filters the scan stages are built from.

pub mod buffer;
pub mod color;
pub mod contour;
pub mod filters;
pub mod morphology;
pub mod processor;
pub mod stats;
pub mod threshold;

pub use buffer::PixelBuffer;
pub use processor::{ImageProcessor, SUPPORTED_FORMATS};
