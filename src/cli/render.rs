// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Render command - turn a definition into GitLab CI configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, OutputFormat};
use crate::config::Config;
use crate::errors::PipecraftError;
use crate::utils::print_success;
use crate::writer::YamlWriter;

/// Run the render command
pub fn run(
    definition: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    stdout: bool,
    config: &Config,
    verbose: bool,
) -> Result<()> {
    let definition_path = config.definition_or(definition);
    let pipeline = load_pipeline(&definition_path)?;
    let document = pipeline.render()?;

    let content = match format {
        OutputFormat::Yaml => YamlWriter::to_string(&document)?,
        OutputFormat::Json => {
            let value = YamlWriter::to_value(&document)?;
            let mut json = serde_json::to_string_pretty(&value).map_err(PipecraftError::from)?;
            json.push('\n');
            json
        }
    };

    if stdout {
        print!("{}", content);
        return Ok(());
    }

    let output_path = config.output_or(output);
    std::fs::write(&output_path, content).map_err(|e| PipecraftError::FileWriteError {
        path: output_path.clone(),
        error: e.to_string(),
    })?;

    print_success(&format!(
        "Rendered {} jobs in {} stages to {}",
        document.job_count(),
        document.stages.len(),
        output_path.display().to_string().bold()
    ));

    if verbose {
        for stage in &document.stages {
            let names: Vec<_> = stage.jobs.iter().map(|j| j.name.as_str()).collect();
            println!("    {} {}", stage.name, format!("[{}]", names.join(", ")).dimmed());
        }
    }

    Ok(())
}
