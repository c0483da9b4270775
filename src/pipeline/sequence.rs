// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Sequences of jobs and nested sequences
//!
//! A sequence owns an ordered list of children, each recorded together with
//! the name/stage override given when it was added. Rendering flattens the
//! subtree into job documents; the sequence itself emits nothing.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::document::JobDocument;
use super::identifier::{NodePath, Override, OverrideChain};
use super::job::Job;
use super::node::{live_parent, Node, ParentLink};
use super::reference::{extend_unique, JobReference};
use super::values::{AllowFailure, Artifacts, Cache, Image, Rule};
use crate::errors::{PipecraftError, PipecraftResult};

/// A child together with the override of its attachment site
#[derive(Debug)]
struct Child {
    node: Node,
    overrides: Override,
}

/// Configuration a sequence applies to every job below it.
///
/// `initialize` values only fill what a job leaves unset, `replace` values
/// overwrite, the rest add to what the job has.
#[derive(Debug, Clone, Default)]
struct Modifiers {
    tags: Vec<String>,
    tags_for_initialization: Option<Vec<String>>,
    tags_for_replacement: Option<Vec<String>>,
    variables: BTreeMap<String, String>,
    variables_for_initialization: Option<BTreeMap<String, String>>,
    variables_for_replacement: Option<BTreeMap<String, String>>,
    rules_to_append: Vec<Rule>,
    rules_to_prepend: Vec<Rule>,
    rules_for_initialization: Option<Vec<Rule>>,
    rules_for_replacement: Option<Vec<Rule>>,
    scripts_to_prepend: Vec<String>,
    scripts_to_append: Vec<String>,
    image_for_initialization: Option<Image>,
    image_for_replacement: Option<Image>,
    artifacts_for_initialization: Option<Artifacts>,
    artifacts_for_replacement: Option<Artifacts>,
    cache_for_initialization: Option<Cache>,
    cache_for_replacement: Option<Cache>,
    allow_failure_for_initialization: Option<AllowFailure>,
    allow_failure_for_replacement: Option<AllowFailure>,
    needs: Vec<JobReference>,
    needs_for_initialization: Option<Vec<JobReference>>,
    needs_for_replacement: Option<Vec<JobReference>>,
    dependencies: Vec<JobReference>,
    dependencies_for_initialization: Option<Vec<JobReference>>,
    dependencies_for_replacement: Option<Vec<JobReference>>,
}

fn initialize<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

fn replace<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl Modifiers {
    fn apply(&self, jobs: &mut [JobDocument]) {
        // needs only gate the entry of the sequence: the jobs of its first stage
        let first_stage = jobs.first().map(|job| job.stage.clone());
        for job in jobs.iter_mut().filter(|job| Some(&job.stage) == first_stage.as_ref()) {
            initialize(&mut job.need_refs, &self.needs_for_initialization);
            replace(&mut job.need_refs, &self.needs_for_replacement);
            if !self.needs.is_empty() {
                job.add_needs(&self.needs);
            }
        }

        for job in jobs {
            initialize(&mut job.image, &self.image_for_initialization);
            replace(&mut job.image, &self.image_for_replacement);

            initialize(&mut job.allow_failure, &self.allow_failure_for_initialization);
            replace(&mut job.allow_failure, &self.allow_failure_for_replacement);

            if let (true, Some(variables)) =
                (job.variables.is_empty(), &self.variables_for_initialization)
            {
                job.variables = variables.clone();
            }
            if let Some(variables) = &self.variables_for_replacement {
                job.variables = variables.clone();
            }
            job.variables
                .extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));

            initialize(&mut job.cache, &self.cache_for_initialization);
            replace(&mut job.cache, &self.cache_for_replacement);

            initialize(&mut job.artifacts, &self.artifacts_for_initialization);
            replace(&mut job.artifacts, &self.artifacts_for_replacement);

            initialize(&mut job.dependency_refs, &self.dependencies_for_initialization);
            replace(&mut job.dependency_refs, &self.dependencies_for_replacement);
            if !self.dependencies.is_empty() {
                job.add_dependencies(&self.dependencies);
            }

            if let (true, Some(tags)) = (job.tags.is_empty(), &self.tags_for_initialization) {
                job.tags = tags.clone();
            }
            if let Some(tags) = &self.tags_for_replacement {
                job.tags = tags.clone();
            }
            job.add_tags(&self.tags);

            if let (true, Some(rules)) = (job.rules.is_empty(), &self.rules_for_initialization) {
                job.rules = rules.clone();
            }
            if let Some(rules) = &self.rules_for_replacement {
                job.rules = rules.clone();
            }
            job.rules.extend(self.rules_to_append.iter().cloned());
            job.prepend_rules(&self.rules_to_prepend);

            job.prepend_scripts(&self.scripts_to_prepend);
            job.scripts.extend(self.scripts_to_append.iter().cloned());
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SequenceInner {
    children: Vec<Child>,
    parent: ParentLink,
    modifiers: Modifiers,
}

/// An ordered group of jobs and nested sequences.
///
/// Like [`Job`], a `Sequence` is a handle; clones refer to the same
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    inner: Rc<RefCell<SequenceInner>>,
}

impl Sequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<SequenceInner>>) -> Self {
        Self { inner }
    }

    /// Append children, all sharing the same override.
    ///
    /// Either every node is attached or, on error, none is. Fails with
    /// `AlreadyAttached` when a node already has a parent, is passed twice,
    /// or would become its own ancestor; with `InvalidOverride` when an
    /// override value is malformed.
    pub fn add_children<I, N>(&self, nodes: I, overrides: Override) -> PipecraftResult<&Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        let overrides = overrides.normalized()?;
        let nodes: Vec<Node> = nodes.into_iter().map(Into::into).collect();

        for (index, node) in nodes.iter().enumerate() {
            if node.is_attached() {
                return Err(PipecraftError::already_attached(node.describe()));
            }
            if nodes[..index].iter().any(|earlier| earlier.same_as(node)) {
                return Err(PipecraftError::attached_twice(node.describe()));
            }
            if let Node::Sequence(sequence) = node {
                if self.is_or_descends_from(sequence) {
                    return Err(PipecraftError::attachment_cycle(node.describe()));
                }
            }
        }

        let parent = Rc::downgrade(&self.inner);
        for node in &nodes {
            node.set_parent(parent.clone());
        }

        tracing::trace!(
            count = nodes.len(),
            name = ?overrides.name,
            stage = ?overrides.stage,
            "attaching children"
        );

        self.inner
            .borrow_mut()
            .children
            .extend(nodes.into_iter().map(|node| Child {
                node,
                overrides: overrides.clone(),
            }));

        Ok(self)
    }

    fn is_or_descends_from(&self, candidate: &Sequence) -> bool {
        let mut current = Some(self.clone());
        while let Some(sequence) = current {
            if sequence.same_as(candidate) {
                return true;
            }
            current = sequence.parent();
        }
        false
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.inner.borrow().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().children.is_empty()
    }

    /// Overrides recorded for the direct children, in insertion order
    pub fn child_overrides(&self) -> Vec<Override> {
        self.inner
            .borrow()
            .children
            .iter()
            .map(|child| child.overrides.clone())
            .collect()
    }

    /// All jobs of this sequence and its nested sequences, depth first
    pub fn nested_jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        self.collect_jobs(&mut jobs);
        jobs
    }

    pub(crate) fn collect_jobs(&self, out: &mut Vec<Job>) {
        for child in &self.inner.borrow().children {
            child.node.collect_jobs(out);
        }
    }

    pub fn add_tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.borrow_mut();
        for tag in tags {
            let tag = tag.into();
            if !inner.modifiers.tags.contains(&tag) {
                inner.modifiers.tags.push(tag);
            }
        }
        drop(inner);
        self
    }

    /// Add variables to every job; on key clash the sequence's value wins
    pub fn add_variables<I, K, V>(&self, variables: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner
            .borrow_mut()
            .modifiers
            .variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn append_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner.borrow_mut().modifiers.rules_to_append.extend(rules);
        self
    }

    pub fn prepend_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner
            .borrow_mut()
            .modifiers
            .rules_to_prepend
            .splice(0..0, rules);
        self
    }

    pub fn prepend_scripts<I, S>(&self, scripts: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .borrow_mut()
            .modifiers
            .scripts_to_prepend
            .splice(0..0, scripts.into_iter().map(Into::into));
        self
    }

    pub fn append_scripts<I, S>(&self, scripts: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .borrow_mut()
            .modifiers
            .scripts_to_append
            .extend(scripts.into_iter().map(Into::into));
        self
    }

    /// Set the image of jobs that have none
    pub fn initialize_image(&self, image: impl Into<Image>) -> &Self {
        self.inner.borrow_mut().modifiers.image_for_initialization = Some(image.into());
        self
    }

    /// Set the image of every job, replacing any previous one
    pub fn override_image(&self, image: impl Into<Image>) -> &Self {
        self.inner.borrow_mut().modifiers.image_for_replacement = Some(image.into());
        self
    }

    /// Set the artifacts of jobs that have none
    pub fn initialize_artifacts(&self, artifacts: Artifacts) -> &Self {
        self.inner.borrow_mut().modifiers.artifacts_for_initialization = Some(artifacts);
        self
    }

    pub fn override_artifacts(&self, artifacts: Artifacts) -> &Self {
        self.inner.borrow_mut().modifiers.artifacts_for_replacement = Some(artifacts);
        self
    }

    /// Set the cache of jobs that have none
    pub fn initialize_cache(&self, cache: Cache) -> &Self {
        self.inner.borrow_mut().modifiers.cache_for_initialization = Some(cache);
        self
    }

    pub fn override_cache(&self, cache: Cache) -> &Self {
        self.inner.borrow_mut().modifiers.cache_for_replacement = Some(cache);
        self
    }

    pub fn initialize_allow_failure(&self, allow_failure: impl Into<AllowFailure>) -> &Self {
        self.inner.borrow_mut().modifiers.allow_failure_for_initialization =
            Some(allow_failure.into());
        self
    }

    pub fn override_allow_failure(&self, allow_failure: impl Into<AllowFailure>) -> &Self {
        self.inner.borrow_mut().modifiers.allow_failure_for_replacement = Some(allow_failure.into());
        self
    }

    /// Set the tags of jobs that have none
    pub fn initialize_tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.borrow_mut().modifiers.tags_for_initialization =
            Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn override_tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.borrow_mut().modifiers.tags_for_replacement =
            Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Set the variables of jobs that have none
    pub fn initialize_variables<I, K, V>(&self, variables: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.borrow_mut().modifiers.variables_for_initialization = Some(
            variables
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn override_variables<I, K, V>(&self, variables: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.borrow_mut().modifiers.variables_for_replacement = Some(
            variables
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set the rules of jobs that have none
    pub fn initialize_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner.borrow_mut().modifiers.rules_for_initialization = Some(rules.into_iter().collect());
        self
    }

    pub fn override_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner.borrow_mut().modifiers.rules_for_replacement = Some(rules.into_iter().collect());
        self
    }

    /// Add needs to the jobs of this sequence's first stage
    pub fn add_needs<I, R>(&self, needs: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        let needs: Vec<JobReference> = needs.into_iter().map(Into::into).collect();
        extend_unique(&mut self.inner.borrow_mut().modifiers.needs, &needs);
        self
    }

    /// Set needs of first-stage jobs that have none
    pub fn initialize_needs<I, R>(&self, needs: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().modifiers.needs_for_initialization =
            Some(needs.into_iter().map(Into::into).collect());
        self
    }

    pub fn override_needs<I, R>(&self, needs: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().modifiers.needs_for_replacement =
            Some(needs.into_iter().map(Into::into).collect());
        self
    }

    pub fn add_dependencies<I, R>(&self, dependencies: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        let dependencies: Vec<JobReference> = dependencies.into_iter().map(Into::into).collect();
        extend_unique(&mut self.inner.borrow_mut().modifiers.dependencies, &dependencies);
        self
    }

    pub fn initialize_dependencies<I, R>(&self, dependencies: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().modifiers.dependencies_for_initialization =
            Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    pub fn override_dependencies<I, R>(&self, dependencies: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().modifiers.dependencies_for_replacement =
            Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    /// Detached deep copy of this sequence and all of its children
    pub fn duplicate(&self) -> Self {
        let inner = self.inner.borrow();
        let copy = Self::new();
        let parent = Rc::downgrade(&copy.inner);

        let children = inner
            .children
            .iter()
            .map(|child| {
                let node = child.node.duplicate();
                node.set_parent(parent.clone());
                Child {
                    node,
                    overrides: child.overrides.clone(),
                }
            })
            .collect();

        {
            let mut copy_inner = copy.inner.borrow_mut();
            copy_inner.children = children;
            copy_inner.modifiers = inner.modifiers.clone();
        }
        copy
    }

    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }

    pub fn parent(&self) -> Option<Sequence> {
        live_parent(&self.inner.borrow().parent)
    }

    pub fn same_as(&self, other: &Sequence) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_parent(&self, parent: Weak<RefCell<SequenceInner>>) {
        self.inner.borrow_mut().parent = Some(parent);
    }

    pub(crate) fn describe(&self) -> String {
        format!("sequence with {} children", self.len())
    }

    /// Flatten this sequence into job documents.
    ///
    /// `inherited` holds the overrides from the root down to this sequence,
    /// including the one it was added with.
    pub fn render(&self, inherited: &OverrideChain) -> Vec<JobDocument> {
        let mut out = Vec::new();
        self.render_into(inherited, &NodePath::root(), &mut out);
        out
    }

    pub(crate) fn render_into(
        &self,
        chain: &OverrideChain,
        path: &NodePath,
        out: &mut Vec<JobDocument>,
    ) {
        let inner = self.inner.borrow();
        let start = out.len();

        for (index, child) in inner.children.iter().enumerate() {
            let chain = chain.extended(&child.overrides);
            child.node.render_into(&chain, &path.child(index), out);
        }

        inner.modifiers.apply(&mut out[start..]);
    }
}
