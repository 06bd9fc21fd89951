// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each one writes its machine-readable output to
// the supplied writer; diagnostics go through tracing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use scanwerk_core::config::{ProfileOverrides, ScanProfile};
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::presets::ScanMode;
use scanwerk_document::image::SUPPORTED_FORMATS;
use scanwerk_document::{ImageProcessor, PixelBuffer, ScanPipeline};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cli::{QualityArgs, ScanArgs};

/// Outcome of a `scan` invocation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub written: Vec<PathBuf>,
    /// Inputs that could not be read or whose output could not be written.
    pub failed: Vec<PathBuf>,
    /// Inputs that were scanned but fell back to the original image.
    pub fallbacks: usize,
}

#[derive(Serialize)]
struct MetadataLine<'a> {
    input: &'a Path,
    output: &'a Path,
    #[serde(flatten)]
    metadata: &'a scanwerk_core::types::ScanMetadata,
}

pub fn run_scan(args: &ScanArgs, out: &mut impl Write) -> Result<ScanSummary> {
    let profile = resolve_profile(args.mode, args.config.as_deref())?;
    info!(mode = %args.mode, inputs = args.inputs.len(), "Starting scan");

    let mut summary = ScanSummary::default();
    let mut loaded: Vec<(&Path, PixelBuffer)> = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        match ImageProcessor::open(input) {
            Ok(processor) => loaded.push((input.as_path(), processor.into_buffer())),
            Err(err) => {
                error!(input = %input.display(), %err, "Skipping unreadable input");
                summary.failed.push(input.clone());
            }
        }
    }

    let images: Vec<PixelBuffer> = loaded.iter().map(|(_, img)| img.clone()).collect();
    let results = ScanPipeline::new().batch_scan(&images, &profile, |done, total| {
        info!(done, total, "Scan progress");
    });

    for ((input, _), result) in loaded.iter().zip(results) {
        if result.is_fallback() {
            summary.fallbacks += 1;
            warn!(input = %input.display(), error = ?result.metadata.error, "Wrote unprocessed image");
        }
        let target = output_path(input, args.output.as_deref());
        let bytes = ImageProcessor::from_buffer(result.image).to_jpeg_bytes(profile.output.quality)?;
        if let Err(err) = std::fs::write(&target, bytes) {
            error!(output = %target.display(), %err, "Failed to write output");
            summary.failed.push(input.to_path_buf());
            continue;
        }
        info!(output = %target.display(), "Wrote scan");

        if args.metadata {
            let line = MetadataLine {
                input,
                output: &target,
                metadata: &result.metadata,
            };
            serde_json::to_writer(&mut *out, &line)?;
            writeln!(out)?;
        }
        summary.written.push(target);
    }

    Ok(summary)
}

pub fn run_quality(args: &QualityArgs, out: &mut impl Write) -> Result<()> {
    let image = ImageProcessor::open(&args.input)?.into_buffer();
    let report = ScanPipeline::new().detect_quality(&image)?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn run_presets(out: &mut impl Write) -> Result<()> {
    let profiles: BTreeMap<&str, ScanProfile> = ScanMode::ALL
        .into_iter()
        .map(|mode| (mode.as_str(), mode.profile()))
        .collect();
    serde_json::to_writer_pretty(&mut *out, &profiles)?;
    writeln!(out)?;
    Ok(())
}

pub fn run_formats(out: &mut impl Write) -> Result<()> {
    for format in SUPPORTED_FORMATS {
        writeln!(out, "{format}")?;
    }
    Ok(())
}

fn resolve_profile(mode: ScanMode, config: Option<&Path>) -> Result<ScanProfile> {
    let overrides = match config {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Some(ProfileOverrides::from_json(&json).map_err(|err| {
                ScanError::Config(format!("invalid overrides in {}: {err}", path.display()))
            })?)
        }
        None => None,
    };
    ScanPipeline::resolve_profile(mode, overrides.as_ref())
}

/// `<dir>/<stem>_scan.jpg`, where `dir` is `output_dir` or the input's own
/// directory.
fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}_scan.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    fn write_page(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let page = RgbImage::from_fn(120, 160, |x, y| {
            let bar = (30..90).contains(&x) && y % 20 < 6 && (20..140).contains(&y);
            image::Rgb(if bar { [30, 30, 30] } else { [200, 195, 190] })
        });
        page.save(&path).unwrap();
        path
    }

    fn scan_args(inputs: Vec<PathBuf>, output: &Path) -> ScanArgs {
        ScanArgs {
            inputs,
            output: Some(output.to_path_buf()),
            mode: ScanMode::Standard,
            config: None,
            metadata: true,
        }
    }

    #[test]
    fn output_path_defaults_next_to_input() {
        assert_eq!(
            output_path(Path::new("/tmp/in/page.png"), None),
            PathBuf::from("/tmp/in/page_scan.jpg")
        );
        assert_eq!(
            output_path(Path::new("page.png"), Some(Path::new("/out"))),
            PathBuf::from("/out/page_scan.jpg")
        );
    }

    #[test]
    fn scan_writes_jpeg_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_page(dir.path(), "page.png");
        let mut out = Vec::new();

        let summary = run_scan(&scan_args(vec![input], dir.path()), &mut out).unwrap();
        assert_eq!(summary.written, vec![dir.path().join("page_scan.jpg")]);
        assert!(summary.failed.is_empty());

        let decoded = image::open(&summary.written[0]).unwrap();
        assert!(decoded.width() > 0);

        let line: serde_json::Value = serde_json::from_slice(out.trim_ascii_end()).unwrap();
        assert_eq!(line["original_size"]["width"], 120);
        assert!(line["stages"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn unreadable_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_page(dir.path(), "good.png");
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();

        let summary = run_scan(&scan_args(vec![bad.clone(), good], dir.path()), &mut Vec::new()).unwrap();
        assert_eq!(summary.failed, vec![bad]);
        assert_eq!(summary.written.len(), 1);
    }

    #[test]
    fn ocr_mode_with_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_page(dir.path(), "page.png");
        let config = dir.path().join("overrides.json");
        std::fs::write(&config, r#"{ "output": { "quality": 70 } }"#).unwrap();

        let mut args = scan_args(vec![input], dir.path());
        args.mode = ScanMode::Ocr;
        args.config = Some(config);
        let mut out = Vec::new();
        run_scan(&args, &mut out).unwrap();

        let line: serde_json::Value = serde_json::from_slice(out.trim_ascii_end()).unwrap();
        assert_eq!(line["config_used"]["output"]["quality"], 70);
        assert_eq!(line["config_used"]["binarization"]["enable"], true);
    }

    #[test]
    fn malformed_overrides_are_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_page(dir.path(), "page.png");
        let config = dir.path().join("overrides.json");
        std::fs::write(&config, r#"{ "output": { "sparkle": true } }"#).unwrap();

        let mut args = scan_args(vec![input], dir.path());
        args.config = Some(config);
        assert!(matches!(run_scan(&args, &mut Vec::new()), Err(ScanError::Config(_))));
    }

    #[test]
    fn quality_report_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        GrayImage::from_pixel(64, 64, Luma([200])).save(&path).unwrap();
        let mut out = Vec::new();

        run_quality(&QualityArgs { input: path }, &mut out).unwrap();
        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["sharpness"]["level"], "poor");
        assert!(report["overall"]["recommendation"].is_string());
    }

    #[test]
    fn presets_list_every_mode() {
        let mut out = Vec::new();
        run_presets(&mut out).unwrap();
        let profiles: serde_json::Value = serde_json::from_slice(&out).unwrap();
        for mode in ScanMode::ALL {
            assert!(profiles.get(mode.as_str()).is_some(), "{mode}");
        }
        assert_eq!(profiles["printing"]["output"]["max_width"], 3000);
    }

    #[test]
    fn formats_are_listed() {
        let mut out = Vec::new();
        run_formats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l == "JPEG"));
        assert_eq!(text.lines().count(), SUPPORTED_FORMATS.len());
    }
}
