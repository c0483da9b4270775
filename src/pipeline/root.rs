// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! The pipeline root
//!
//! A pipeline is the uppermost sequence. Rendering it resolves every job's
//! identifier, rejects collisions and derives the stage order.

use std::path::Path;

use super::document::{JobDocument, PipelineDocument};
use super::identifier::{Override, OverrideChain};
use super::node::Node;
use super::reference::resolve_references;
use super::sequence::Sequence;
use super::validation::ensure_unique_identifiers;
use super::values::{Include, Service};
use crate::errors::PipecraftResult;
use crate::writer::YamlWriter;

/// Root of a job tree
#[derive(Debug, Default)]
pub struct Pipeline {
    root: Sequence,
    includes: Vec<Include>,
    services: Vec<Service>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add jobs or sequences to the top level of the pipeline
    pub fn add_children<I, N>(&mut self, nodes: I, overrides: Override) -> PipecraftResult<&mut Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.root.add_children(nodes, overrides)?;
        Ok(self)
    }

    /// The top-level sequence, for pipeline-wide tags, scripts, images, ...
    pub fn sequence(&self) -> &Sequence {
        &self.root
    }

    pub fn add_include(&mut self, include: Include) -> &mut Self {
        self.includes.push(include);
        self
    }

    pub fn add_services<I>(&mut self, services: I) -> &mut Self
    where
        I: IntoIterator<Item = Service>,
    {
        self.services.extend(services);
        self
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Flat job list in emission order, without any whole-tree checks
    pub(crate) fn render_jobs(&self) -> Vec<JobDocument> {
        self.root.render(&OverrideChain::new())
    }

    /// Fill in `needs` and `dependencies` of jobs rendered by [`Self::render_jobs`]
    pub(crate) fn resolve_references(&self, jobs: &mut [JobDocument]) -> PipecraftResult<()> {
        resolve_references(jobs, &self.root.nested_jobs())
    }

    /// Render the whole tree into a pipeline document.
    ///
    /// Fails with `DuplicateIdentifier` if two jobs resolve to the same
    /// (name, stage), and with `UnresolvedReference` if a job needs a node
    /// that is not part of the pipeline. No partial document is returned.
    pub fn render(&self) -> PipecraftResult<PipelineDocument> {
        let mut jobs = self.render_jobs();
        ensure_unique_identifiers(&jobs)?;
        self.resolve_references(&mut jobs)?;

        let mut document = PipelineDocument::from_jobs(jobs);
        document.includes = self.includes.clone();
        document.services = self.services.clone();

        tracing::debug!(
            stages = document.stages.len(),
            jobs = document.job_count(),
            "rendered pipeline"
        );

        Ok(document)
    }

    /// Render and write the pipeline as GitLab CI YAML
    pub fn write_yaml(&self, path: &Path) -> PipecraftResult<()> {
        let document = self.render()?;
        YamlWriter::write(&document, path)
    }
}
