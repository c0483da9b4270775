// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Project configuration
//!
//! Loaded from `.pipecraft.toml` in the working directory. Every key is
//! optional; command-line flags take precedence over what is set here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{PipecraftError, PipecraftResult};
use crate::writer::DEFAULT_OUTPUT;

/// Default configuration file name
pub const CONFIG_FILE: &str = ".pipecraft.toml";

/// Default pipeline definition file name
pub const DEFAULT_DEFINITION: &str = ".pipecraft.yaml";

/// Configuration from .pipecraft.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Pipeline definition to read
    #[serde(default = "default_definition")]
    pub definition: PathBuf,

    /// Where `render` writes the generated pipeline
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_definition() -> PathBuf {
    PathBuf::from(DEFAULT_DEFINITION)
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition: default_definition(),
            output: default_output(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> PipecraftResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipecraftError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml(&content)
    }

    /// Load from the project directory (looks for .pipecraft.toml)
    pub fn load_from_project(project_root: &Path) -> PipecraftResult<Self> {
        Self::load(&project_root.join(CONFIG_FILE))
    }

    pub fn from_toml(content: &str) -> PipecraftResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Definition path, preferring an explicit command-line value
    pub fn definition_or(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.definition.clone())
    }

    /// Output path, preferring an explicit command-line value
    pub fn output_or(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.output.clone())
    }
}
