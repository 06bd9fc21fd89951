// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — Core types, configuration profiles and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod presets;
pub mod types;

pub use config::{ProfileOverrides, ScanProfile};
pub use error::ScanError;
pub use presets::{Preset, ScanMode};
pub use types::*;
