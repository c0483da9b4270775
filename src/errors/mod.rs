// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Error types with actionable messages
//!
//! Tree construction errors are raised at `add_children` time, identifier
//! collisions at render time. Both carry enough context to point at the
//! offending place in the tree.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::NodePath;

/// Result type for pipecraft operations
pub type PipecraftResult<T> = Result<T, PipecraftError>;

/// Main error type for pipecraft
#[derive(Error, Debug, Diagnostic)]
pub enum PipecraftError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tree Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{node} is already attached to a sequence")]
    #[diagnostic(code(pipecraft::already_attached))]
    AlreadyAttached {
        node: String,
        #[help]
        help: Option<String>,
    },

    #[error("Jobs at {first} and {second} both resolve to name '{name}' in stage '{stage}'")]
    #[diagnostic(
        code(pipecraft::duplicate_identifier),
        help("Provide a different name and/or stage when adding those jobs to their sequences")
    )]
    DuplicateIdentifier {
        name: String,
        stage: String,
        first: NodePath,
        second: NodePath,
    },

    #[error("Invalid {field} override '{value}': {reason}")]
    #[diagnostic(code(pipecraft::invalid_override))]
    InvalidOverride {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Job '{referrer}' refers to {target}, which is not part of the pipeline")]
    #[diagnostic(
        code(pipecraft::unresolved_reference),
        help("Add the referenced job or sequence to the pipeline, or refer to it by name")
    )]
    UnresolvedReference { referrer: String, target: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Writer Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Job name '{name}' is used in stage '{first_stage}' and in stage '{second_stage}'")]
    #[diagnostic(
        code(pipecraft::duplicate_job_key),
        help("GitLab keys jobs by name only, so job names must be unique across stages")
    )]
    DuplicateJobKey {
        name: String,
        first_stage: String,
        second_stage: String,
    },

    #[error("Job name '{name}' is a top-level GitLab keyword")]
    #[diagnostic(
        code(pipecraft::reserved_job_name),
        help("Rename the job or add it with a name override")
    )]
    ReservedJobName { name: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Definition file not found: {path}")]
    #[diagnostic(
        code(pipecraft::definition_not_found),
        help("Create a .pipecraft.yaml or pass the definition path explicitly")
    )]
    DefinitionNotFound { path: PathBuf },

    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(pipecraft::invalid_definition))]
    InvalidDefinition {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipecraft::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pipecraft::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(pipecraft::io_error))]
    Io { message: String },

    #[error("YAML error: {message}")]
    #[diagnostic(code(pipecraft::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(pipecraft::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipecraft::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for PipecraftError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipecraftError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipecraftError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipecraftError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl PipecraftError {
    /// Create an already-attached error for a node that has a parent
    pub fn already_attached(node: String) -> Self {
        Self::AlreadyAttached {
            node,
            help: Some(
                "A node can only live in one sequence. Use `duplicate()` to attach a copy elsewhere."
                    .into(),
            ),
        }
    }

    /// Create an already-attached error for a node that would become its own ancestor
    pub fn attachment_cycle(node: String) -> Self {
        Self::AlreadyAttached {
            node,
            help: Some("A sequence cannot be added to itself or to one of its descendants.".into()),
        }
    }

    /// Create an already-attached error for a node passed twice in one call
    pub fn attached_twice(node: String) -> Self {
        Self::AlreadyAttached {
            node,
            help: Some("The same node was passed more than once to a single `add_children` call.".into()),
        }
    }

    /// Whether this error comes from building or rendering the tree itself
    pub fn is_tree_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyAttached { .. }
                | Self::DuplicateIdentifier { .. }
                | Self::InvalidOverride { .. }
                | Self::UnresolvedReference { .. }
        )
    }

    /// Whether a valid tree can't be written as GitLab YAML
    pub fn is_output_error(&self) -> bool {
        matches!(self, Self::DuplicateJobKey { .. } | Self::ReservedJobName { .. })
    }
}
