// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! pipecraft - GitLab CI pipeline builder
//!
//! Render pipeline definitions into GitLab CI configuration.

use clap::Parser;
use miette::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipecraft::cli::{Cli, Commands};
use pipecraft::config::{Config, CONFIG_FILE};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "pipecraft=debug" } else { "pipecraft=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // an explicit --config must exist; the default file is optional
    let config = match cli.config {
        Some(ref path) if !path.exists() => {
            return Err(miette::miette!("Config file not found: {}", path.display()));
        }
        Some(ref path) => Config::load(path)?,
        None => Config::load(Path::new(CONFIG_FILE))?,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Render {
            definition,
            output,
            format,
            stdout,
        } => pipecraft::cli::render::run(definition, output, format, stdout, &config, cli.verbose),
        Commands::Validate { definition } => {
            pipecraft::cli::validate::run(definition, &config, cli.verbose)
        }
        Commands::Stages { definition } => {
            pipecraft::cli::stages::run(definition, &config, cli.verbose)
        }
    }
}
