// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan stages — geometry, background normalisation, enhancement,
// binarization, quality analysis, and the pipeline that chains them.

pub mod background;
pub mod binarize;
pub mod enhance;
pub mod geometry;
pub mod pipeline;
pub mod quality;
pub mod skew;
pub mod stage;

pub use background::BackgroundNormalizer;
pub use binarize::Binarizer;
pub use enhance::{EnhancementMetrics, Enhancer};
pub use geometry::GeometricCorrector;
pub use pipeline::{ScanPipeline, ScanResult};
pub use quality::QualityAnalyzer;
pub use stage::{StageLog, StageOutcome};
