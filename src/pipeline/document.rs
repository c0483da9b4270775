// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Rendered pipeline documents
//!
//! The flat output of a render pass: stages in first-discovery order, each
//! holding its jobs in emission order. This is what writers consume.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::identifier::NodePath;
use super::reference::{extend_unique, JobReference};
use super::values::{
    AllowFailure, Artifacts, Cache, Image, Include, Need, Rule, Service, WhenStatement,
};

/// One job entry of a rendered pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobDocument {
    pub name: String,

    pub stage: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    /// Resolved `needs`; filled in by [`Pipeline::render`](super::Pipeline::render).
    /// An empty list is kept: it means "start right away".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs: Option<Vec<Need>>,

    /// Resolved `dependencies`, filled in like `needs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    #[serde(rename = "script")]
    pub scripts: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<Cache>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<AllowFailure>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenStatement>,

    /// Where the job sits in the rendered tree
    #[serde(skip)]
    pub path: NodePath,

    #[serde(skip)]
    pub(crate) need_refs: Option<Vec<JobReference>>,

    #[serde(skip)]
    pub(crate) dependency_refs: Option<Vec<JobReference>>,
}

impl JobDocument {
    pub(crate) fn add_needs(&mut self, needs: &[JobReference]) {
        extend_unique(self.need_refs.get_or_insert_with(Vec::new), needs);
    }

    pub(crate) fn add_dependencies(&mut self, dependencies: &[JobReference]) {
        extend_unique(self.dependency_refs.get_or_insert_with(Vec::new), dependencies);
    }

    pub(crate) fn add_tags(&mut self, tags: &[String]) {
        for tag in tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
    }

    pub(crate) fn prepend_scripts(&mut self, scripts: &[String]) {
        self.scripts.splice(0..0, scripts.iter().cloned());
    }

    pub(crate) fn prepend_rules(&mut self, rules: &[Rule]) {
        self.rules.splice(0..0, rules.iter().cloned());
    }
}

/// A stage and the jobs assigned to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDocument {
    pub name: String,
    pub jobs: Vec<JobDocument>,
}

/// The complete rendered pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineDocument {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Include>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,

    pub stages: Vec<StageDocument>,
}

impl PipelineDocument {
    /// Group jobs by stage. A stage's position is fixed by the first job
    /// that resolves to it.
    pub fn from_jobs(jobs: Vec<JobDocument>) -> Self {
        let mut stages: Vec<StageDocument> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for job in jobs {
            match positions.get(&job.stage) {
                Some(&index) => stages[index].jobs.push(job),
                None => {
                    positions.insert(job.stage.clone(), stages.len());
                    stages.push(StageDocument {
                        name: job.stage.clone(),
                        jobs: vec![job],
                    });
                }
            }
        }

        Self {
            includes: Vec::new(),
            services: Vec::new(),
            stages,
        }
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&StageDocument> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// All jobs, stage by stage
    pub fn jobs(&self) -> impl Iterator<Item = &JobDocument> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }

    /// Get a job by name
    pub fn get_job(&self, name: &str) -> Option<&JobDocument> {
        self.jobs().find(|j| j.name == name)
    }

    pub fn job_count(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
