// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from tree errors.

use super::PipecraftError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Definition snippets that show the fix
    pub examples: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest how to separate two jobs with the same identifier
    pub fn fix_duplicate_identifier(name: &str, stage: &str) -> Self {
        Self {
            action: "Give the colliding jobs distinct identifiers".into(),
            steps: vec![
                format!("Two jobs resolve to name '{}' in stage '{}'", name, stage),
                "The override closest to a job wins over overrides set further up the tree".into(),
                "Pass a `name` (or `stage`) when adding one of the jobs or its sequence".into(),
            ],
            examples: vec![
                "children:".into(),
                "  - job: { stage: deploy, script: [./deploy.sh] }".into(),
                format!("    name: {}-eu", name),
            ],
        }
    }

    /// Suggest how to rename a job whose name repeats in another stage
    pub fn fix_duplicate_job_key(name: &str, first_stage: &str, second_stage: &str) -> Self {
        Self {
            action: "Give the job a distinct name in one of the stages".into(),
            steps: vec![
                format!(
                    "Job name '{}' is used in stage '{}' and in stage '{}'",
                    name, first_stage, second_stage
                ),
                "GitLab identifies jobs by name alone, whatever their stage".into(),
                format!("Pass a `name` when adding the job for stage '{}'", second_stage),
            ],
            examples: vec![
                "children:".into(),
                format!("  - job: {{ stage: {}, script: [...] }}", second_stage),
                format!("    name: {}-{}", name, second_stage),
            ],
        }
    }

    /// Suggest how to rename a job that shadows a top-level keyword
    pub fn fix_reserved_job_name(name: &str) -> Self {
        Self {
            action: "Rename the job".into(),
            steps: vec![
                format!("'{}' is a top-level key of .gitlab-ci.yml", name),
                "Pass a `name` override or set another job name".into(),
            ],
            examples: vec![format!("    name: {}-job", name)],
        }
    }

    /// Suggest how to fix a reference to a node outside the pipeline
    pub fn fix_unresolved_reference(referrer: &str, target: &str) -> Self {
        Self {
            action: "Attach the referenced node or refer to it by name".into(),
            steps: vec![
                format!("Job '{}' needs {}, which the pipeline never renders", referrer, target),
                "Add it to the pipeline, or use its rendered name as a plain need".into(),
            ],
            examples: vec![],
        }
    }

    /// Suggest how to reuse an already attached node
    pub fn fix_already_attached(node: &str) -> Self {
        Self {
            action: "Attach a copy instead of the same node".into(),
            steps: vec![
                format!("{} already has a parent sequence", node),
                "Each job or sequence may appear only once in the tree".into(),
                "Call `duplicate()` to get a detached copy for the second site".into(),
            ],
            examples: vec![],
        }
    }

    /// Suggest how to fix an override value
    pub fn fix_invalid_override(field: &str) -> Self {
        Self {
            action: format!("Clean up the {} override", field),
            steps: vec![
                "Remove leading and trailing whitespace".into(),
                "Remove newlines, tabs and other control characters".into(),
            ],
            examples: vec![],
        }
    }

    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &PipecraftError) -> Option<Self> {
        match error {
            PipecraftError::DuplicateIdentifier { name, stage, .. } => {
                Some(Self::fix_duplicate_identifier(name, stage))
            }
            PipecraftError::DuplicateJobKey {
                name,
                first_stage,
                second_stage,
            } => Some(Self::fix_duplicate_job_key(name, first_stage, second_stage)),
            PipecraftError::ReservedJobName { name } => Some(Self::fix_reserved_job_name(name)),
            PipecraftError::UnresolvedReference { referrer, target } => {
                Some(Self::fix_unresolved_reference(referrer, target))
            }
            PipecraftError::AlreadyAttached { node, .. } => Some(Self::fix_already_attached(node)),
            PipecraftError::InvalidOverride { field, .. } => Some(Self::fix_invalid_override(field)),
            _ => None,
        }
    }
}
