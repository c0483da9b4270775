// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Pipeline validation
//!
//! Whole-tree checks over the flat list of rendered jobs. Identifier
//! collisions are fatal; the remaining findings are warnings.

use std::collections::{HashMap, HashSet};

use crate::errors::PipecraftError;
use crate::pipeline::{JobDocument, NeedSource, NodePath, Pipeline, DEFAULT_STAGE};

/// Fail on the first pair of jobs sharing a resolved (name, stage).
pub fn ensure_unique_identifiers(jobs: &[JobDocument]) -> Result<(), PipecraftError> {
    match find_collisions(jobs).into_iter().next() {
        Some(collision) => Err(collision),
        None => Ok(()),
    }
}

/// Every job that repeats an earlier job's identifier, paired with the first
/// job that used it, in emission order.
fn find_collisions(jobs: &[JobDocument]) -> Vec<PipecraftError> {
    let mut seen: HashMap<(&str, &str), &NodePath> = HashMap::new();
    let mut collisions = Vec::new();

    for job in jobs {
        let key = (job.name.as_str(), job.stage.as_str());
        match seen.get(&key) {
            Some(first) => collisions.push(PipecraftError::DuplicateIdentifier {
                name: job.name.clone(),
                stage: job.stage.clone(),
                first: (*first).clone(),
                second: job.path.clone(),
            }),
            None => {
                seen.insert(key, &job.path);
            }
        }
    }

    collisions
}

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Render the tree and report every problem found
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut jobs = pipeline.render_jobs();

        if jobs.is_empty() {
            result.add_error("Pipeline has no jobs");
        }

        for collision in find_collisions(&jobs) {
            result.add_error(&collision.to_string());
        }

        match pipeline.resolve_references(&mut jobs) {
            Ok(()) => Self::validate_references(&jobs, &mut result),
            Err(e) => result.add_error(&e.to_string()),
        }

        for job in &jobs {
            Self::validate_job(job, &mut result);
        }

        result
    }

    /// Needs and dependencies given by name may point at jobs that come
    /// from an include, so unknown names are only warnings.
    fn validate_references(jobs: &[JobDocument], result: &mut ValidationResult) {
        let names: HashSet<&str> = jobs.iter().map(|j| j.name.as_str()).collect();

        for job in jobs {
            let needed = job
                .needs
                .iter()
                .flatten()
                .filter(|need| need.source == NeedSource::Local)
                .map(|need| need.job.as_str());
            let depended = job.dependencies.iter().flatten().map(String::as_str);

            for target in needed.chain(depended) {
                if !names.contains(target) {
                    result.add_warning(&format!(
                        "Job '{}' at {} refers to '{}', which no job in this pipeline is named",
                        job.name, job.path, target
                    ));
                }
            }
        }
    }

    fn validate_job(job: &JobDocument, result: &mut ValidationResult) {
        if job.scripts.is_empty() {
            result.add_warning(&format!("Job '{}' at {} has no script", job.name, job.path));
        }

        if job.scripts.iter().any(|s| s.trim().is_empty()) {
            result.add_warning(&format!(
                "Job '{}' at {} has an empty script line",
                job.name, job.path
            ));
        }

        if job.stage == DEFAULT_STAGE && job.name == DEFAULT_STAGE {
            result.add_warning(&format!(
                "Job at {} has neither a name nor a stage and is named '{}'",
                job.path, DEFAULT_STAGE
            ));
        }

        if matches!(&job.artifacts, Some(artifacts) if artifacts.is_empty()) {
            result.add_warning(&format!(
                "Job '{}' at {} declares artifacts without paths or reports",
                job.name, job.path
            ));
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Artifacts, Job, JobReference, Override, Sequence};

    #[test]
    fn test_validate_empty_pipeline() {
        let result = PipelineValidator::validate(&Pipeline::new());
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no jobs"));
    }

    #[test]
    fn test_validate_reports_every_collision() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_children(
                [
                    Job::new("prod", ["a"]),
                    Job::new("prod", ["b"]),
                    Job::new("prod", ["c"]),
                ],
                Override::name("deploy"),
            )
            .unwrap();

        let result = PipelineValidator::validate(&pipeline);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("root[0] and root[1]"));
        assert!(result.errors[1].contains("root[0] and root[2]"));
    }

    #[test]
    fn test_ensure_unique_identifiers_names_both_paths() {
        let seq = Sequence::new();
        seq.add_children([Job::new("prod", ["a"])], Override::name("deploy"))
            .unwrap();
        let mut pipeline = Pipeline::new();
        pipeline
            .add_children([Job::new("prod", ["b"])], Override::name("deploy"))
            .unwrap()
            .add_children([&seq], Override::none())
            .unwrap();

        let jobs = pipeline.render_jobs();
        match ensure_unique_identifiers(&jobs) {
            Err(PipecraftError::DuplicateIdentifier { first, second, .. }) => {
                assert_eq!(first.to_string(), "root[0]");
                assert_eq!(second.to_string(), "root[1][0]");
            }
            other => panic!("Expected DuplicateIdentifier, got {:?}", other),
        }
    }

    #[test]
    fn test_warnings() {
        let empty_script = Job::new("build", Vec::<String>::new());
        let anonymous = Job::unstaged(["true"]);
        let bad_artifacts = Job::new("pack", ["tar"]);
        bad_artifacts.assign_artifacts(Artifacts::default());

        let mut pipeline = Pipeline::new();
        pipeline
            .add_children([&empty_script, &anonymous, &bad_artifacts], Override::none())
            .unwrap();

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 3);
        assert!(result.warnings[0].contains("no script"));
        assert!(result.warnings[1].contains("neither a name nor a stage"));
        assert!(result.warnings[2].contains("artifacts"));
    }

    #[test]
    fn test_reference_problems() {
        let stray = Job::new("build", ["make"]);
        let deploy = Job::new("deploy", ["./deploy.sh"]);
        deploy.add_needs([&stray]);

        let mut pipeline = Pipeline::new();
        pipeline.add_children([&deploy], Override::none()).unwrap();
        let result = PipelineValidator::validate(&pipeline);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("not part of the pipeline"));

        let lint = Job::new("lint", ["cargo clippy"]);
        lint.add_dependencies([JobReference::from("generate")]);
        let mut pipeline = Pipeline::new();
        pipeline.add_children([&lint], Override::none()).unwrap();
        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.warnings[0].contains("refers to 'generate'"));
    }
}
