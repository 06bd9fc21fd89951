// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stage outcomes. A failing stage hands its input through unchanged and the
// failure is recorded instead of propagated.

use scanwerk_core::error::Result;
use scanwerk_core::types::{StageReport, StageStatus};
use tracing::{debug, warn};

use crate::image::PixelBuffer;

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Applied(PixelBuffer),
    /// The stage failed; `image` is the stage's unchanged input.
    Degraded { image: PixelBuffer, reason: String },
    Skipped(PixelBuffer),
}

impl StageOutcome {
    /// Fold a stage result, falling back to `input` on error.
    pub fn from_result(input: PixelBuffer, result: Result<PixelBuffer>) -> Self {
        match result {
            Ok(image) => Self::Applied(image),
            Err(err) => Self::Degraded {
                image: input,
                reason: err.to_string(),
            },
        }
    }

    pub fn image(&self) -> &PixelBuffer {
        match self {
            Self::Applied(image) | Self::Skipped(image) => image,
            Self::Degraded { image, .. } => image,
        }
    }

    pub fn status(&self) -> StageStatus {
        match self {
            Self::Applied(_) => StageStatus::Applied,
            Self::Degraded { reason, .. } => StageStatus::Degraded {
                reason: reason.clone(),
            },
            Self::Skipped(_) => StageStatus::Skipped,
        }
    }

    pub fn into_image(self) -> PixelBuffer {
        match self {
            Self::Applied(image) | Self::Skipped(image) => image,
            Self::Degraded { image, .. } => image,
        }
    }
}

/// Ordered record of the stages a pipeline run went through.
#[derive(Debug, Default, Clone)]
pub struct StageLog {
    reports: Vec<StageReport>,
    /// Output of every applied stage, kept only when requested.
    snapshots: Option<Vec<(String, PixelBuffer)>>,
}

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that also keeps a copy of each applied stage's output.
    pub fn with_snapshots() -> Self {
        Self {
            reports: Vec::new(),
            snapshots: Some(Vec::new()),
        }
    }

    /// Run `stage` on `input` if `enabled`, record what happened and return
    /// the image the next stage should see.
    pub fn run<F>(&mut self, stage: &'static str, enabled: bool, input: PixelBuffer, f: F) -> PixelBuffer
    where
        F: FnOnce(&PixelBuffer) -> Result<PixelBuffer>,
    {
        let outcome = if enabled {
            let result = f(&input);
            StageOutcome::from_result(input, result)
        } else {
            StageOutcome::Skipped(input)
        };
        self.record(stage, outcome)
    }

    /// Record an outcome produced elsewhere and unwrap its image.
    pub fn record(&mut self, stage: &'static str, outcome: StageOutcome) -> PixelBuffer {
        let status = outcome.status();
        match &status {
            StageStatus::Applied => debug!(stage, "Stage applied"),
            StageStatus::Degraded { reason } => {
                warn!(stage, %reason, "Stage failed; passing input through")
            }
            StageStatus::Skipped => debug!(stage, "Stage skipped"),
        }
        if let (StageStatus::Applied, Some(snapshots)) = (&status, self.snapshots.as_mut()) {
            snapshots.push((stage.to_string(), outcome.image().clone()));
        }
        self.reports.push(StageReport {
            stage: stage.to_string(),
            status,
        });
        outcome.into_image()
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    /// Reports plus the captured snapshots (empty unless built with
    /// [`StageLog::with_snapshots`]).
    pub fn into_parts(self) -> (Vec<StageReport>, Vec<(String, PixelBuffer)>) {
        (self.reports, self.snapshots.unwrap_or_default())
    }
}
