// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! GitLab CI YAML writer
//!
//! Turns a rendered [`PipelineDocument`] into the text of a
//! `.gitlab-ci.yml`: global keys first, then the stage list, then one
//! top-level key per job.

use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::{PipecraftError, PipecraftResult};
use crate::pipeline::PipelineDocument;

/// Top-level keys GitLab does not treat as jobs
const RESERVED_KEYS: &[&str] = &[
    "after_script",
    "before_script",
    "cache",
    "default",
    "image",
    "include",
    "services",
    "stages",
    "variables",
    "workflow",
];

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "generated-config.yml";

/// Writer for GitLab CI pipeline files
pub struct YamlWriter;

impl YamlWriter {
    /// Build the YAML tree of a document
    pub fn to_value(document: &PipelineDocument) -> PipecraftResult<Value> {
        let mut root = Mapping::new();

        if !document.includes.is_empty() {
            root.insert("include".into(), serde_yaml::to_value(&document.includes)?);
        }
        if !document.services.is_empty() {
            root.insert("services".into(), serde_yaml::to_value(&document.services)?);
        }
        root.insert("stages".into(), serde_yaml::to_value(document.stage_names())?);

        let mut stage_of: HashMap<&str, &str> = HashMap::new();
        for job in document.jobs() {
            if RESERVED_KEYS.contains(&job.name.as_str()) {
                return Err(PipecraftError::ReservedJobName {
                    name: job.name.clone(),
                });
            }
            if let Some(first_stage) = stage_of.insert(&job.name, &job.stage) {
                return Err(PipecraftError::DuplicateJobKey {
                    name: job.name.clone(),
                    first_stage: first_stage.to_string(),
                    second_stage: job.stage.clone(),
                });
            }

            // the job name becomes the key, so drop it from the body
            let body: Mapping = match serde_yaml::to_value(job)? {
                Value::Mapping(fields) => fields
                    .into_iter()
                    .filter(|(key, _)| key.as_str() != Some("name"))
                    .collect(),
                _ => Mapping::new(),
            };
            root.insert(Value::String(job.name.clone()), Value::Mapping(body));
        }

        Ok(Value::Mapping(root))
    }

    /// Render a document as YAML text
    pub fn to_string(document: &PipelineDocument) -> PipecraftResult<String> {
        let value = Self::to_value(document)?;
        serde_yaml::to_string(&value).map_err(Into::into)
    }

    /// Write a document to `path`
    pub fn write(document: &PipelineDocument, path: &Path) -> PipecraftResult<()> {
        let content = Self::to_string(document)?;

        std::fs::write(path, content).map_err(|e| PipecraftError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), "wrote pipeline");
        Ok(())
    }
}
