// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — command-line adapter for the document scan pipeline.
//
// Entry point. Initialises logging, parses arguments and dispatches to the
// subcommand.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    let result = match &cli.command {
        Command::Scan(args) => commands::run_scan(args, &mut stdout).map(|summary| {
            tracing::info!(
                written = summary.written.len(),
                failed = summary.failed.len(),
                fallbacks = summary.fallbacks,
                "Scan finished"
            );
            summary.failed.is_empty()
        }),
        Command::Quality(args) => commands::run_quality(args, &mut stdout).map(|()| true),
        Command::Presets => commands::run_presets(&mut stdout).map(|()| true),
        Command::Formats => commands::run_formats(&mut stdout).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            tracing::error!(%err, "scanwerk failed");
            ExitCode::FAILURE
        }
    }
}
