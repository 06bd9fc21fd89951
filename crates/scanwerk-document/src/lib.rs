// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Image processing for Scanwerk.
//
// Provides the pixel buffer and its low-level filters, and the scan pipeline
// that turns a phone photo of a page into a scanner-style image (geometry,
// background whitening, enhancement, binarization, quality analysis).

pub mod image;
pub mod scan;

// Re-export the primary structs so callers can use `scanwerk_document::ScanPipeline` etc.
pub use image::{ImageProcessor, PixelBuffer};
pub use scan::{QualityAnalyzer, ScanPipeline, ScanResult};
