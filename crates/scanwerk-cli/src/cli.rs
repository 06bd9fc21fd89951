// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scanwerk_core::presets::ScanMode;

/// Turn phone photos of paper documents into clean, scanner-style images.
#[derive(Parser, Debug)]
#[command(name = "scanwerk", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one or more photos and write JPEG output
    Scan(ScanArgs),
    /// Report capture quality of a photo as JSON
    Quality(QualityArgs),
    /// Print the built-in profiles as JSON
    Presets,
    /// List the accepted input formats
    Formats,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Input images
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (defaults to each input's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scan mode: standard, balanced, natural, ultra_white, ocr or printing
    #[arg(short, long, default_value = "standard")]
    pub mode: ScanMode,

    /// JSON file with profile overrides
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print scan metadata as JSON lines on stdout
    #[arg(long)]
    pub metadata: bool,
}

#[derive(Args, Debug)]
pub struct QualityArgs {
    pub input: PathBuf,
}
