// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Stages command - show the derived stage order

use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::config::Config;
use crate::utils::{dimmed, print_header, print_numbered};

/// Run the stages command
pub fn run(definition: Option<PathBuf>, config: &Config, verbose: bool) -> Result<()> {
    let definition_path = config.definition_or(definition);
    let document = load_pipeline(&definition_path)?.render()?;

    print_header(&format!("Stages ({})", document.stages.len()));
    for (i, stage) in document.stages.iter().enumerate() {
        print_numbered(i + 1, &stage.name);
        for job in &stage.jobs {
            if verbose {
                println!("       {} {}", job.name, dimmed(&job.path.to_string()));
            } else {
                println!("       {}", job.name);
            }
        }
    }

    Ok(())
}
