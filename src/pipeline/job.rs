// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Job leaves
//!
//! A job holds its script and metadata. Its name and stage are only
//! defaults: the final identifier is resolved when the job is rendered
//! within its tree.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::document::JobDocument;
use super::identifier::{NodePath, OverrideChain};
use super::node::{live_parent, ParentLink};
use super::reference::{extend_unique, JobReference};
use super::sequence::{Sequence, SequenceInner};
use super::values::{AllowFailure, Artifacts, Cache, Image, Rule, WhenStatement};

#[derive(Debug, Clone, Default)]
struct JobState {
    name: Option<String>,
    stage: Option<String>,
    scripts: Vec<String>,
    image: Option<Image>,
    tags: Vec<String>,
    variables: BTreeMap<String, String>,
    rules: Vec<Rule>,
    artifacts: Option<Artifacts>,
    cache: Option<Cache>,
    needs: Option<Vec<JobReference>>,
    dependencies: Option<Vec<JobReference>>,
    allow_failure: Option<AllowFailure>,
    when: Option<WhenStatement>,
}

#[derive(Debug, Default)]
struct JobInner {
    state: JobState,
    parent: ParentLink,
}

/// A leaf unit of work.
///
/// `Job` is a handle: cloning it yields another handle to the same job,
/// which is why the same job can't be added to two sequences. Use
/// [`Job::duplicate`] to get an independent copy.
#[derive(Debug, Clone)]
pub struct Job {
    inner: Rc<RefCell<JobInner>>,
}

impl Job {
    /// Create a job in `stage` running `scripts`
    pub fn new<I, S>(stage: impl Into<String>, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let job = Self::unstaged(scripts);
        job.inner.borrow_mut().state.stage = Some(stage.into());
        job
    }

    /// Create a job without a stage of its own
    pub fn unstaged<I, S>(scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = JobState {
            scripts: scripts.into_iter().map(Into::into).collect(),
            ..JobState::default()
        };
        Self {
            inner: Rc::new(RefCell::new(JobInner {
                state,
                parent: None,
            })),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) -> &Self {
        self.inner.borrow_mut().state.name = Some(name.into());
        self
    }

    pub fn set_stage(&self, stage: impl Into<String>) -> &Self {
        self.inner.borrow_mut().state.stage = Some(stage.into());
        self
    }

    pub fn name(&self) -> Option<String> {
        self.inner.borrow().state.name.clone()
    }

    pub fn stage(&self) -> Option<String> {
        self.inner.borrow().state.stage.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.inner.borrow().state.scripts.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.inner.borrow().state.tags.clone()
    }

    pub fn variables(&self) -> BTreeMap<String, String> {
        self.inner.borrow().state.variables.clone()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.inner.borrow().state.rules.clone()
    }

    pub fn image(&self) -> Option<Image> {
        self.inner.borrow().state.image.clone()
    }

    pub fn artifacts(&self) -> Option<Artifacts> {
        self.inner.borrow().state.artifacts.clone()
    }

    pub fn cache(&self) -> Option<Cache> {
        self.inner.borrow().state.cache.clone()
    }

    pub fn needs(&self) -> Option<Vec<JobReference>> {
        self.inner.borrow().state.needs.clone()
    }

    pub fn dependencies(&self) -> Option<Vec<JobReference>> {
        self.inner.borrow().state.dependencies.clone()
    }

    pub fn allow_failure(&self) -> Option<AllowFailure> {
        self.inner.borrow().state.allow_failure.clone()
    }

    /// Add tags; tags already present keep their position
    pub fn add_tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.borrow_mut();
        for tag in tags {
            let tag = tag.into();
            if !inner.state.tags.contains(&tag) {
                inner.state.tags.push(tag);
            }
        }
        drop(inner);
        self
    }

    /// Replace all tags
    pub fn assign_tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.borrow_mut().state.tags.clear();
        self.add_tags(tags)
    }

    /// Add variables; an existing key gets the new value
    pub fn add_variables<I, K, V>(&self, variables: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner
            .borrow_mut()
            .state
            .variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn append_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner.borrow_mut().state.rules.extend(rules);
        self
    }

    pub fn prepend_rules<I>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.inner.borrow_mut().state.rules.splice(0..0, rules);
        self
    }

    pub fn prepend_scripts<I, S>(&self, scripts: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .borrow_mut()
            .state
            .scripts
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
            .state
            .scripts
            .extend(scripts.into_iter().map(Into::into));
        self
    }

    pub fn assign_image(&self, image: impl Into<Image>) -> &Self {
        self.inner.borrow_mut().state.image = Some(image.into());
        self
    }

    pub fn assign_artifacts(&self, artifacts: Artifacts) -> &Self {
        self.inner.borrow_mut().state.artifacts = Some(artifacts);
        self
    }

    pub fn assign_cache(&self, cache: Cache) -> &Self {
        self.inner.borrow_mut().state.cache = Some(cache);
        self
    }

    /// Wait for other jobs. A sequence stands for the jobs in its last
    /// stage. References already present are skipped.
    pub fn add_needs<I, R>(&self, needs: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        let needs: Vec<JobReference> = needs.into_iter().map(Into::into).collect();
        let mut inner = self.inner.borrow_mut();
        extend_unique(inner.state.needs.get_or_insert_with(Vec::new), &needs);
        drop(inner);
        self
    }

    /// Replace all needs. An empty list renders as `needs: []`.
    pub fn assign_needs<I, R>(&self, needs: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().state.needs = Some(Vec::new());
        self.add_needs(needs)
    }

    /// Fetch artifacts only from these jobs. A sequence stands for all of
    /// its jobs.
    pub fn add_dependencies<I, R>(&self, dependencies: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        let dependencies: Vec<JobReference> = dependencies.into_iter().map(Into::into).collect();
        let mut inner = self.inner.borrow_mut();
        extend_unique(
            inner.state.dependencies.get_or_insert_with(Vec::new),
            &dependencies,
        );
        drop(inner);
        self
    }

    pub fn assign_dependencies<I, R>(&self, dependencies: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: Into<JobReference>,
    {
        self.inner.borrow_mut().state.dependencies = Some(Vec::new());
        self.add_dependencies(dependencies)
    }

    /// A flag, or exit codes via [`AllowFailure::exit_codes`]
    pub fn set_allow_failure(&self, allow_failure: impl Into<AllowFailure>) -> &Self {
        self.inner.borrow_mut().state.allow_failure = Some(allow_failure.into());
        self
    }

    pub fn set_when(&self, when: WhenStatement) -> &Self {
        self.inner.borrow_mut().state.when = Some(when);
        self
    }

    /// Detached copy with the same configuration
    pub fn duplicate(&self) -> Self {
        let state = self.inner.borrow().state.clone();
        Self {
            inner: Rc::new(RefCell::new(JobInner {
                state,
                parent: None,
            })),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }

    pub fn parent(&self) -> Option<Sequence> {
        live_parent(&self.inner.borrow().parent)
    }

    pub fn same_as(&self, other: &Job) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_parent(&self, parent: Weak<RefCell<SequenceInner>>) {
        self.inner.borrow_mut().parent = Some(parent);
    }

    pub(crate) fn describe(&self) -> String {
        let inner = self.inner.borrow();
        match inner.state.name.as_ref().or(inner.state.stage.as_ref()) {
            Some(label) => format!("job '{}'", label),
            None => "unnamed job".to_string(),
        }
    }

    /// Render this job under the overrides of its ancestors.
    ///
    /// `inherited` must already contain the override of the job's own
    /// attachment site as its last link.
    pub fn render(&self, inherited: &OverrideChain) -> JobDocument {
        self.render_at(inherited, &NodePath::root())
    }

    pub(crate) fn render_at(&self, chain: &OverrideChain, path: &NodePath) -> JobDocument {
        let inner = self.inner.borrow();
        let state = &inner.state;
        let id = chain.resolve(state.name.as_deref(), state.stage.as_deref());

        JobDocument {
            name: id.name,
            stage: id.stage,
            image: state.image.clone(),
            needs: None,
            dependencies: None,
            scripts: state.scripts.clone(),
            variables: state.variables.clone(),
            rules: state.rules.clone(),
            cache: state.cache.clone(),
            artifacts: state.artifacts.clone(),
            tags: state.tags.clone(),
            allow_failure: state.allow_failure.clone(),
            when: state.when,
            path: path.clone(),
            need_refs: state.needs.clone(),
            dependency_refs: state.dependencies.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Override;

    #[test]
    fn test_render_without_overrides() {
        let job = Job::new("print_date", ["date"]);
        let doc = job.render(&OverrideChain::new());

        assert_eq!(doc.name, "print_date");
        assert_eq!(doc.stage, "print_date");
        assert_eq!(doc.scripts, vec!["date"]);
        assert!(doc.image.is_none());
    }

    #[test]
    fn test_script_order() {
        let job = Job::new("build", ["make"]);
        job.prepend_scripts(["cd src"]);
        job.append_scripts(["make install"]);
        job.prepend_scripts(["set -e", "env"]);

        let doc = job.render(&OverrideChain::new());
        assert_eq!(doc.scripts, vec!["set -e", "env", "cd src", "make", "make install"]);
    }

    #[test]
    fn test_additive_metadata() {
        let job = Job::new("test", ["cargo test"]);
        job.add_tags(["docker"]).add_tags(["docker", "linux"]);
        job.add_variables([("A", "1"), ("B", "2")]);
        job.add_variables([("A", "3")]);
        job.append_rules([Rule::new("$A == \"1\"")]);
        job.prepend_rules([Rule::never()]);

        assert_eq!(job.tags(), vec!["docker", "linux"]);
        assert_eq!(job.variables().get("A").map(String::as_str), Some("3"));
        assert_eq!(job.variables().len(), 2);
        let rules = job.rules();
        assert_eq!(rules[0], Rule::never());
        assert_eq!(rules[1].if_statement.as_deref(), Some("$A == \"1\""));
    }

    #[test]
    fn test_render_applies_nearest_override() {
        let job = Job::new("build", ["make"]);
        job.set_name("compile");
        let chain = OverrideChain::new()
            .extended(&Override::new("outer", "release"))
            .extended(&Override::stage("nightly"));

        let doc = job.render(&chain);
        assert_eq!(doc.name, "outer");
        assert_eq!(doc.stage, "nightly");
    }

    #[test]
    fn test_render_is_repeatable() {
        let job = Job::new("lint", ["cargo clippy"]);
        job.assign_image("rust:1.80");
        let chain = OverrideChain::new().extended(&Override::name("clippy"));
        assert_eq!(job.render(&chain), job.render(&chain));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let job = Job::new("build", ["make"]);
        let copy = job.duplicate();
        copy.append_scripts(["make check"]);

        assert_eq!(job.scripts(), vec!["make"]);
        assert_eq!(copy.scripts(), vec!["make", "make check"]);
        assert!(!job.same_as(&copy));
        assert!(job.same_as(&job.clone()));
    }

    #[test]
    fn test_needs_and_dependencies_accumulate() {
        let build = Job::new("build", ["make"]);
        let docs = Job::new("docs", ["make doc"]);
        let job = Job::new("deploy", ["./deploy.sh"]);
        assert!(job.needs().is_none());

        job.add_needs([&build]).add_needs([&build, &docs]);
        assert_eq!(job.needs().map(|n| n.len()), Some(2));

        job.assign_needs([&docs]);
        assert_eq!(job.needs(), Some(vec![JobReference::from(&docs)]));

        job.add_dependencies(["build"]);
        let doc = job.render(&OverrideChain::new());
        assert_eq!(doc.need_refs, Some(vec![JobReference::from(&docs)]));
        assert_eq!(doc.dependency_refs.map(|d| d.len()), Some(1));
        // names are only known once the pipeline renders
        assert!(doc.needs.is_none());
    }

    #[test]
    fn test_cache_tags_and_exit_codes() {
        let job = Job::new("build", ["make"]);
        job.add_tags(["docker"]).assign_tags(["shell"]);
        job.assign_cache(Cache::new(["target"]));
        job.set_allow_failure(vec![137]);

        let doc = job.render(&OverrideChain::new());
        assert_eq!(doc.tags, vec!["shell"]);
        assert_eq!(doc.cache.unwrap().paths, vec!["./target"]);
        assert_eq!(doc.allow_failure, Some(AllowFailure::exit_codes([137])));

        job.set_allow_failure(true);
        assert_eq!(job.allow_failure(), Some(AllowFailure::Flag(true)));
    }

    #[test]
    fn test_unstaged_job_falls_back_to_default_stage() {
        let job = Job::unstaged(["echo hi"]);
        let doc = job.render(&OverrideChain::new());
        assert_eq!(doc.stage, crate::pipeline::DEFAULT_STAGE);
        assert_eq!(job.describe(), "unnamed job");
    }
}
