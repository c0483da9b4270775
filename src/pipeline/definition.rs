// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Pipeline definition files
//!
//! Declarative YAML description of a job tree, as read from
//! `.pipecraft.yaml`. Each entry of `children` is one attachment: exactly one
//! of `job` or `sequence`, plus the optional `name`/`stage` override.
//! Configuration shared by all jobs of a sequence (or of the whole
//! pipeline) sits under its `modifiers` key. Unknown keys are rejected at
//! every level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{PipecraftError, PipecraftResult};
use crate::pipeline::{
    AllowFailure, Artifacts, Cache, Image, Include, Job, Need, Node, NodePath, Override, Pipeline,
    Rule, Sequence, Service, WhenStatement,
};

/// Pipeline definition from .pipecraft.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    /// Configuration pulled in from other files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Include>,

    /// Services linked to every job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,

    /// Pipeline-wide job configuration
    #[serde(default, skip_serializing_if = "ModifierDefinition::is_empty")]
    pub modifiers: ModifierDefinition,

    /// Top-level jobs and sequences
    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

impl PipelineDefinition {
    /// Load a definition from a YAML file
    pub fn from_file(path: &Path) -> PipecraftResult<Self> {
        if !path.exists() {
            return Err(PipecraftError::DefinitionNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipecraftError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    /// Parse a definition from a YAML string
    pub fn from_yaml(yaml: &str) -> PipecraftResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize the definition to YAML
    pub fn to_yaml(&self) -> PipecraftResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Build the job tree this definition describes
    pub fn build(&self) -> PipecraftResult<Pipeline> {
        let mut pipeline = Pipeline::new();

        for include in &self.includes {
            pipeline.add_include(include.clone());
        }
        pipeline.add_services(self.services.iter().cloned());
        self.modifiers.apply_to(pipeline.sequence());

        for (index, child) in self.children.iter().enumerate() {
            let node = child.to_node(&NodePath::root().child(index))?;
            pipeline.add_children([node], child.overrides())?;
        }

        tracing::debug!(children = self.children.len(), "built pipeline from definition");

        Ok(pipeline)
    }
}

/// One attachment of a job or sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceDefinition>,

    /// Name override for this attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stage override for this attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl ChildDefinition {
    pub fn overrides(&self) -> Override {
        Override {
            name: self.name.clone(),
            stage: self.stage.clone(),
        }
    }

    fn to_node(&self, path: &NodePath) -> PipecraftResult<Node> {
        match (&self.job, &self.sequence) {
            (Some(job), None) => Ok(Node::Job(job.to_job())),
            (None, Some(sequence)) => Ok(Node::Sequence(sequence.to_sequence(path)?)),
            (Some(_), Some(_)) => Err(PipecraftError::InvalidDefinition {
                reason: format!("entry {} sets both `job` and `sequence`", path),
                help: Some("Split the entry into two children".into()),
            }),
            (None, None) => Err(PipecraftError::InvalidDefinition {
                reason: format!("entry {} sets neither `job` nor `sequence`", path),
                help: Some("Every child needs a `job:` or a `sequence:` key".into()),
            }),
        }
    }
}

/// A job and its metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Shell commands, a single string or a list
    #[serde(default)]
    pub script: ScriptList,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<Cache>,

    /// Jobs to wait for, by rendered name. `needs: []` starts right away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<Vec<Need>>,

    /// Jobs to fetch artifacts from, by rendered name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    /// `true`/`false`, or `{ exit_codes: [...] }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<AllowFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenStatement>,
}

impl JobDefinition {
    fn to_job(&self) -> Job {
        let job = Job::unstaged(self.script.lines());

        if let Some(name) = &self.name {
            job.set_name(name);
        }
        if let Some(stage) = &self.stage {
            job.set_stage(stage);
        }
        if let Some(image) = &self.image {
            job.assign_image(image.clone());
        }
        if let Some(artifacts) = &self.artifacts {
            job.assign_artifacts(artifacts.clone());
        }
        if let Some(cache) = &self.cache {
            job.assign_cache(cache.clone());
        }
        if let Some(needs) = &self.needs {
            job.assign_needs(needs.iter().cloned());
        }
        if let Some(dependencies) = &self.dependencies {
            job.assign_dependencies(dependencies.iter().map(String::as_str));
        }
        if let Some(allow_failure) = &self.allow_failure {
            job.set_allow_failure(allow_failure.clone());
        }
        if let Some(when) = self.when {
            job.set_when(when);
        }

        job.add_tags(self.tags.iter().cloned())
            .add_variables(self.variables.clone())
            .append_rules(self.rules.iter().cloned());

        job
    }
}

/// Script lines of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptList {
    /// A single command
    Single(String),

    /// Several commands, run in order
    Multiple(Vec<String>),
}

impl Default for ScriptList {
    fn default() -> Self {
        Self::Multiple(Vec::new())
    }
}

impl ScriptList {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::Multiple(v) => v.clone(),
        }
    }
}

/// A nested sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceDefinition {
    #[serde(default, skip_serializing_if = "ModifierDefinition::is_empty")]
    pub modifiers: ModifierDefinition,

    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

impl SequenceDefinition {
    fn to_sequence(&self, path: &NodePath) -> PipecraftResult<Sequence> {
        let sequence = Sequence::new();
        self.modifiers.apply_to(&sequence);

        for (index, child) in self.children.iter().enumerate() {
            let node = child.to_node(&path.child(index))?;
            sequence.add_children([node], child.overrides())?;
        }

        Ok(sequence)
    }
}

/// Configuration a sequence (or the pipeline) applies to all of its jobs.
///
/// `initialize_*` fills in what a job leaves unset, `override_*` replaces
/// it, plain keys add to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifierDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_tags: Option<Vec<String>>,

    /// On key clash the sequence's value wins
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_variables: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_variables: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepend_scripts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append_scripts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepend_rules: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append_rules: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_rules: Option<Vec<Rule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_rules: Option<Vec<Rule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_image: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_image: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_artifacts: Option<Artifacts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_artifacts: Option<Artifacts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_cache: Option<Cache>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_cache: Option<Cache>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_allow_failure: Option<AllowFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_allow_failure: Option<AllowFailure>,

    /// Needs for the jobs of the first stage of the sequence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<Need>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_needs: Option<Vec<Need>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_needs: Option<Vec<Need>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_dependencies: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_dependencies: Option<Vec<String>>,
}

impl ModifierDefinition {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn apply_to(&self, sequence: &Sequence) {
        sequence
            .add_tags(self.tags.iter().cloned())
            .add_variables(self.variables.clone())
            .prepend_scripts(self.prepend_scripts.iter().cloned())
            .append_scripts(self.append_scripts.iter().cloned())
            .prepend_rules(self.prepend_rules.iter().cloned())
            .append_rules(self.append_rules.iter().cloned())
            .add_needs(self.needs.iter().cloned())
            .add_dependencies(self.dependencies.iter().map(String::as_str));

        if let Some(tags) = &self.initialize_tags {
            sequence.initialize_tags(tags.iter().cloned());
        }
        if let Some(tags) = &self.override_tags {
            sequence.override_tags(tags.iter().cloned());
        }
        if let Some(variables) = &self.initialize_variables {
            sequence.initialize_variables(variables.clone());
        }
        if let Some(variables) = &self.override_variables {
            sequence.override_variables(variables.clone());
        }
        if let Some(rules) = &self.initialize_rules {
            sequence.initialize_rules(rules.iter().cloned());
        }
        if let Some(rules) = &self.override_rules {
            sequence.override_rules(rules.iter().cloned());
        }
        if let Some(image) = &self.initialize_image {
            sequence.initialize_image(image.clone());
        }
        if let Some(image) = &self.override_image {
            sequence.override_image(image.clone());
        }
        if let Some(artifacts) = &self.initialize_artifacts {
            sequence.initialize_artifacts(artifacts.clone());
        }
        if let Some(artifacts) = &self.override_artifacts {
            sequence.override_artifacts(artifacts.clone());
        }
        if let Some(cache) = &self.initialize_cache {
            sequence.initialize_cache(cache.clone());
        }
        if let Some(cache) = &self.override_cache {
            sequence.override_cache(cache.clone());
        }
        if let Some(allow_failure) = &self.initialize_allow_failure {
            sequence.initialize_allow_failure(allow_failure.clone());
        }
        if let Some(allow_failure) = &self.override_allow_failure {
            sequence.override_allow_failure(allow_failure.clone());
        }
        if let Some(needs) = &self.initialize_needs {
            sequence.initialize_needs(needs.iter().cloned());
        }
        if let Some(needs) = &self.override_needs {
            sequence.override_needs(needs.iter().cloned());
        }
        if let Some(dependencies) = &self.initialize_dependencies {
            sequence.initialize_dependencies(dependencies.iter().map(String::as_str));
        }
        if let Some(dependencies) = &self.override_dependencies {
            sequence.override_dependencies(dependencies.iter().map(String::as_str));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pipe_with_one_job() {
        let yaml = r#"
children:
  - job:
      stage: print_date
      script: date
"#;

        let definition = PipelineDefinition::from_yaml(yaml).unwrap();
        let doc = definition.build().unwrap().render().unwrap();
        assert_eq!(doc.stage_names(), vec!["print_date"]);
        assert_eq!(doc.stages[0].jobs[0].scripts, vec!["date"]);
    }

    #[test]
    fn test_parse_nested_sequences_with_overrides() {
        let yaml = r#"
modifiers:
  tags: [docker]
children:
  - sequence:
      children:
        - job: { stage: job1, script: [echo 1] }
        - job: { stage: job2, script: [echo 2] }
    stage: development
  - sequence:
      modifiers:
        variables:
          ENV: test
      children:
        - job: { stage: job1, script: [echo 1] }
        - job: { stage: job2, script: [echo 2] }
    stage: test
"#;

        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap().build().unwrap();
        let doc = pipeline.render().unwrap();

        assert_eq!(doc.stage_names(), vec!["development", "test"]);
        let test = doc.get_stage("test").unwrap();
        assert_eq!(test.jobs[1].name, "job2-test");
        assert_eq!(test.jobs[1].variables["ENV"], "test");
        assert!(doc.jobs().all(|j| j.tags == vec!["docker".to_string()]));

        let yaml = crate::writer::YamlWriter::to_string(&doc).unwrap();
        assert!(yaml.contains("job1-development:"));
        assert!(yaml.contains("job2-test:"));
    }

    #[test]
    fn test_misspelled_keys_are_rejected() {
        for yaml in [
            "children:\n  - sequence: { childs: [] }\n",
            "childs:\n  - job: { stage: a, script: x }\n",
            "tags: [docker]\nchildren: []\n",
            "modifiers: { tag: [docker] }\n",
            "children:\n  - sequence: { modifiers: { image: alpine } }\n",
        ] {
            assert!(
                matches!(PipelineDefinition::from_yaml(yaml), Err(PipecraftError::Yaml { .. })),
                "accepted {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_parse_modifiers() {
        let yaml = r#"
modifiers:
  initialize_image: alpine
  override_allow_failure: { exit_codes: [137] }
children:
  - job: { stage: prepare, script: [./fetch.sh] }
  - sequence:
      modifiers:
        initialize_tags: [shared]
        override_variables: { MODE: ci }
        initialize_cache: { paths: [.cargo] }
        needs: [prepare]
        dependencies: [prepare]
        override_rules:
          - if: $CI_COMMIT_TAG
      children:
        - job: { stage: build, script: [make], variables: { OWN: "1" } }
        - job: { stage: test, script: [make check], tags: [own] }
"#;

        let doc = PipelineDefinition::from_yaml(yaml)
            .unwrap()
            .build()
            .unwrap()
            .render()
            .unwrap();

        let build = doc.get_job("build").unwrap();
        let test = doc.get_job("test").unwrap();
        assert_eq!(build.image.as_ref().unwrap().reference(), "alpine");
        assert_eq!(build.allow_failure, Some(AllowFailure::exit_codes([137])));
        assert_eq!(build.tags, vec!["shared"]);
        assert_eq!(test.tags, vec!["own"]);
        assert_eq!(build.variables.keys().collect::<Vec<_>>(), vec!["MODE"]);
        assert_eq!(build.cache.as_ref().unwrap().paths, vec!["./.cargo"]);
        assert_eq!(build.rules[0].if_statement.as_deref(), Some("$CI_COMMIT_TAG"));

        // needs reach the first stage only, dependencies every job
        assert_eq!(build.needs, Some(vec![Need::job("prepare")]));
        assert!(test.needs.is_none());
        assert_eq!(test.dependencies, Some(vec!["prepare".to_string()]));
    }

    #[test]
    fn test_parse_job_metadata() {
        let yaml = r#"
children:
  - job:
      name: unit
      stage: test
      script:
        - cargo test
      image: rust:1.80
      tags: [linux]
      variables:
        RUST_BACKTRACE: "1"
      rules:
        - if: $CI_COMMIT_BRANCH
          when: on_success
      artifacts:
        paths: [target/report.xml]
        reports:
          junit: target/report.xml
      cache:
        paths: [target]
        key: { files: [Cargo.lock] }
        policy: pull
      needs:
        - build
        - job: lint
          artifacts: false
      dependencies: [build]
      allow_failure: true
      when: manual
    name: unit-linux
"#;

        let doc = PipelineDefinition::from_yaml(yaml)
            .unwrap()
            .build()
            .unwrap()
            .render()
            .unwrap();
        let job = doc.get_job("unit-linux").unwrap();

        assert_eq!(job.stage, "test");
        assert_eq!(job.image.as_ref().unwrap().reference(), "rust:1.80");
        assert_eq!(job.variables["RUST_BACKTRACE"], "1");
        assert_eq!(job.rules[0].when, Some(WhenStatement::OnSuccess));
        assert_eq!(job.artifacts.as_ref().unwrap().reports["junit"], "target/report.xml");
        assert_eq!(job.allow_failure, Some(AllowFailure::Flag(true)));
        assert_eq!(job.when, Some(WhenStatement::Manual));
        assert_eq!(job.cache.as_ref().unwrap().policy, Some(crate::pipeline::CachePolicy::Pull));
        let needs = job.needs.as_ref().unwrap();
        assert_eq!(needs[0], Need::job("build"));
        assert!(!needs[1].artifacts);
        assert_eq!(job.dependencies, Some(vec!["build".to_string()]));
    }

    #[test]
    fn test_entry_without_node_is_rejected() {
        let yaml = r#"
children:
  - sequence:
      children:
        - name: orphan
"#;

        let err = PipelineDefinition::from_yaml(yaml)
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            PipecraftError::InvalidDefinition { reason, .. } => {
                assert!(reason.contains("root[0][0]"));
                assert!(reason.contains("neither"));
            }
            other => panic!("Expected InvalidDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_entry_with_both_nodes_is_rejected() {
        let yaml = r#"
children:
  - job: { stage: a, script: x }
    sequence: { children: [] }
"#;

        let err = PipelineDefinition::from_yaml(yaml)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, PipecraftError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_unknown_job_key_is_rejected() {
        let yaml = r#"
children:
  - job: { stage: a, scripts: [x] }
"#;

        assert!(matches!(
            PipelineDefinition::from_yaml(yaml),
            Err(PipecraftError::Yaml { .. })
        ));
    }

    #[test]
    fn test_invalid_override_in_definition() {
        let yaml = "children:\n  - job: { stage: a, script: x }\n    name: \" spaced\"\n";

        let err = PipelineDefinition::from_yaml(yaml)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, PipecraftError::InvalidOverride { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineDefinition::from_file(Path::new("/nonexistent/.pipecraft.yaml")).unwrap_err();
        assert!(matches!(err, PipecraftError::DefinitionNotFound { .. }));
    }

    #[test]
    fn test_round_trip_yaml() {
        let definition = PipelineDefinition {
            includes: vec![Include::Local {
                local: "ci/base.yml".into(),
            }],
            modifiers: ModifierDefinition {
                override_tags: Some(vec!["docker".into()]),
                ..ModifierDefinition::default()
            },
            children: vec![ChildDefinition {
                job: Some(JobDefinition {
                    stage: Some("build".into()),
                    script: ScriptList::Multiple(vec!["make".into()]),
                    ..JobDefinition::default()
                }),
                name: Some("linux".into()),
                ..ChildDefinition::default()
            }],
            ..PipelineDefinition::default()
        };

        let yaml = definition.to_yaml().unwrap();
        let parsed = PipelineDefinition::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.children.len(), 1);
        assert_eq!(parsed.children[0].name.as_deref(), Some("linux"));
        assert_eq!(parsed.includes, definition.includes);
        assert_eq!(parsed.modifiers, definition.modifiers);
        assert!(!yaml.contains("initialize_tags"));
    }
}
