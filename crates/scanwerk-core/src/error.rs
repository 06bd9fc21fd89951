// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
///
/// Only `Decode`, `Encode`, `Io` and `Serialization` ever reach a caller of
/// the pipeline; the remaining variants are produced by individual stages and
/// are absorbed into a degraded stage outcome.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Adapter errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    // -- Stage errors --
    #[error("invalid parameter for {stage}: {detail}")]
    InvalidParameter { stage: &'static str, detail: String },

    #[error("degenerate image: {0}")]
    DegenerateImage(String),

    #[error("{stage} does not support {channels}-channel images")]
    UnsupportedChannels { stage: &'static str, channels: u8 },

    #[error("not found: {0}")]
    NotFound(String),

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            stage,
            detail: detail.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
