// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Validate command - check a pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::errors::{PipecraftError, RecoverySuggestion};
use crate::pipeline::{PipelineDefinition, PipelineValidator};
use crate::utils::{dimmed, print_error, print_section, print_success, print_suggestion, print_warning};
use crate::writer::YamlWriter;

/// Run the validate command
pub fn run(definition: Option<PathBuf>, config: &Config, verbose: bool) -> Result<()> {
    let definition_path = config.definition_or(definition);

    println!("{}", "Validating pipeline...".bold());
    println!();

    let definition = match PipelineDefinition::from_file(&definition_path) {
        Ok(d) => d,
        Err(e) => {
            print_error("Failed to parse pipeline definition");
            println!();
            return Err(e.into());
        }
    };
    print_success(&format!("{} is valid YAML", definition_path.display()));

    let pipeline = match definition.build() {
        Ok(p) => p,
        Err(e) => {
            report_failure(&e);
            return Err(e.into());
        }
    };
    print_success("Job tree builds");

    let validation = PipelineValidator::validate(&pipeline);

    // only a clean render can reach the writer checks
    let mut writer_error = None;
    if validation.is_valid() {
        match pipeline.render().and_then(|doc| YamlWriter::to_value(&doc).map(|_| doc)) {
            Ok(document) => {
                print_success("Identifiers are unique");
                if verbose {
                    print_section("Pipeline summary");
                    println!("  Stages: {}", document.stages.len());
                    for stage in &document.stages {
                        println!("    - {} {}", stage.name, dimmed(&format!("({} jobs)", stage.jobs.len())));
                        for job in &stage.jobs {
                            println!("        {} {}", job.name, dimmed(&job.path.to_string()));
                        }
                    }
                }
            }
            Err(e) if e.is_output_error() => writer_error = Some(e),
            Err(e) => {
                report_failure(&e);
                return Err(e.into());
            }
        }
    }

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().bold().to_string());
        for error in &validation.errors {
            print_error(error);
        }
        if let Err(e) = pipeline.render() {
            if e.is_tree_error() {
                if let Some(suggestion) = RecoverySuggestion::for_error(&e) {
                    print_suggestion(&suggestion);
                }
            }
        }
    }

    if let Some(e) = &writer_error {
        print_section(&"GitLab output".red().bold().to_string());
        report_failure(e);
    }

    if !validation.warnings.is_empty() {
        print_section(&"Warnings".yellow().bold().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    println!();

    if !validation.is_valid() || writer_error.is_some() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}

fn report_failure(error: &PipecraftError) {
    print_error(&error.to_string());
    if let Some(suggestion) = RecoverySuggestion::for_error(error) {
        print_suggestion(&suggestion);
    }
}
