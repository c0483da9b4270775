// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipecraft.

pub mod render;
pub mod stages;
pub mod validate;

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::{Pipeline, PipelineDefinition};

/// GitLab CI pipeline builder
///
/// Compose jobs and nested sequences, then render them as `.gitlab-ci.yml`.
#[derive(Parser, Debug)]
#[clap(
    name = "pipecraft",
    version,
    about = "Compose GitLab CI pipelines from reusable jobs and sequences",
    long_about = None,
    after_help = "Examples:\n\
        pipecraft render                     Render .pipecraft.yaml to generated-config.yml\n\
        pipecraft render ci.yaml --stdout    Print the rendered pipeline\n\
        pipecraft validate                   Check a definition for collisions\n\
        pipecraft stages                     Show the derived stage order\n\n\
        See 'pipecraft <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Configuration file (defaults to .pipecraft.toml)
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a pipeline definition as GitLab CI configuration
    Render {
        /// Pipeline definition file
        definition: Option<PathBuf>,

        /// Output file
        #[clap(short, long)]
        output: Option<PathBuf>,

        /// Output format (yaml, json)
        #[clap(short, long, default_value = "yaml")]
        format: OutputFormat,

        /// Print to stdout instead of writing a file
        #[clap(long)]
        stdout: bool,
    },

    /// Validate a pipeline definition
    Validate {
        /// Pipeline definition file
        definition: Option<PathBuf>,
    },

    /// Show the stage order and the jobs in each stage
    Stages {
        /// Pipeline definition file
        definition: Option<PathBuf>,
    },
}

/// Output format for the render command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Read a definition file and build its job tree
pub(crate) fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let definition = PipelineDefinition::from_file(path)?;
    Ok(definition.build()?)
}
