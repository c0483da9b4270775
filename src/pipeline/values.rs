// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Value objects attached to jobs and pipelines
//!
//! These are carried unchanged from the tree into the rendered document.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Container image a job runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ImageRepr", into = "ImageRepr")]
pub struct Image {
    /// Image reference without tag, or a full reference
    pub name: String,
    /// Optional tag appended to the name
    pub tag: Option<String>,
    /// Entrypoint override
    pub entrypoint: Vec<String>,
}

impl Image {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            entrypoint: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_entrypoint<I, S>(mut self, entrypoint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoint = entrypoint.into_iter().map(Into::into).collect();
        self
    }

    /// Full image reference, `name[:tag]`
    pub fn reference(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}:{}", self.name, tag),
            None => self.name.clone(),
        }
    }
}

impl From<&str> for Image {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Rendered shape of an [`Image`]: a bare string unless an entrypoint is set
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ImageRepr {
    Reference(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        entrypoint: Vec<String>,
    },
}

impl From<ImageRepr> for Image {
    fn from(repr: ImageRepr) -> Self {
        match repr {
            ImageRepr::Reference(name) => Self::new(name),
            ImageRepr::Full { name, entrypoint } => Self::new(name).with_entrypoint(entrypoint),
        }
    }
}

impl From<Image> for ImageRepr {
    fn from(image: Image) -> Self {
        if image.entrypoint.is_empty() {
            Self::Reference(image.reference())
        } else {
            Self::Full {
                name: image.reference(),
                entrypoint: image.entrypoint,
            }
        }
    }
}

/// When a job or rule applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WhenStatement {
    Always,
    Delayed,
    Never,
    OnFailure,
    OnSuccess,
    Manual,
}

impl std::fmt::Display for WhenStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Delayed => write!(f, "delayed"),
            Self::Never => write!(f, "never"),
            Self::OnFailure => write!(f, "on_failure"),
            Self::OnSuccess => write!(f, "on_success"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Conditional-execution predicate of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_statement: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenStatement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exists: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl Rule {
    /// Rule that matches when `condition` holds
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            if_statement: Some(condition.into()),
            ..Self::default()
        }
    }

    /// Rule that always applies and never runs the job
    pub fn never() -> Self {
        Self {
            when: Some(WhenStatement::Never),
            ..Self::default()
        }
    }

    /// Rule that always applies and runs the job on success
    pub fn on_success() -> Self {
        Self {
            when: Some(WhenStatement::OnSuccess),
            ..Self::default()
        }
    }

    pub fn with_when(mut self, when: WhenStatement) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_allow_failure(mut self, allow_failure: bool) -> Self {
        self.allow_failure = Some(allow_failure);
        self
    }

    pub fn with_changes<I, S>(mut self, changes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changes.extend(changes.into_iter().map(Into::into));
        self
    }

    pub fn with_exists<I, S>(mut self, exists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exists.extend(exists.into_iter().map(Into::into));
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Files a job hands over to later jobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[serde(rename = "exclude", default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_in: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_as: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untracked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenStatement>,

    /// Report type to report file, e.g. `junit: report.xml`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reports: BTreeMap<String, String>,
}

impl Artifacts {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(excludes.into_iter().map(Into::into));
        self
    }

    pub fn with_expire_in(mut self, expire_in: impl Into<String>) -> Self {
        self.expire_in = Some(expire_in.into());
        self
    }

    pub fn with_report(mut self, kind: impl Into<String>, path: impl Into<String>) -> Self {
        self.reports.insert(kind.into(), path.into());
        self
    }

    /// True when there is nothing to upload
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.reports.is_empty() && self.untracked != Some(true)
    }
}

/// Whether a failing job fails the pipeline.
///
/// Either a plain flag or a list of exit codes that are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowFailure {
    Flag(bool),
    ExitCodes { exit_codes: Vec<i32> },
}

impl AllowFailure {
    pub fn exit_codes<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self::ExitCodes {
            exit_codes: codes.into_iter().collect(),
        }
    }
}

impl From<bool> for AllowFailure {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<Vec<i32>> for AllowFailure {
    fn from(codes: Vec<i32>) -> Self {
        Self::exit_codes(codes)
    }
}

/// Key GitLab uses when a cache doesn't set one
pub const DEFAULT_CACHE_KEY: &str = "$CI_COMMIT_REF_SLUG";

/// Cache key: a fixed string or a hash of files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheKey {
    Key(String),
    Files {
        files: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
}

impl CacheKey {
    /// Fixed key. `/` and `.` are not allowed in cache keys and become
    /// `_` and `-`.
    pub fn new(key: impl Into<String>) -> Self {
        Self::Key(key.into().replace('/', "_").replace('.', "-"))
    }

    /// Key computed from the contents of up to two files
    pub fn files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Files {
            files: files.into_iter().map(Into::into).collect(),
            prefix: None,
        }
    }

    /// Prefix for a files key. Has no effect on a fixed key.
    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        match self {
            Self::Files { files, .. } => Self::Files {
                files,
                prefix: Some(prefix.into()),
            },
            key => key,
        }
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::Key(DEFAULT_CACHE_KEY.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    Pull,
    Push,
    PullPush,
}

/// When a cache is saved. A subset of [`WhenStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWhen {
    Always,
    OnFailure,
    OnSuccess,
}

/// Files kept between pipeline runs.
///
/// Paths are made relative to the project directory: a leading
/// `$CI_PROJECT_DIR` is dropped and `./` is prepended where missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(deserialize_with = "relative_cache_paths")]
    pub paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<CacheWhen>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untracked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<CachePolicy>,

    #[serde(default)]
    pub key: CacheKey,
}

impl Cache {
    /// Cache `paths` under the default key
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(Into::<String>::into)
                .map(|path| relative_cache_path(&path))
                .collect(),
            when: None,
            untracked: None,
            policy: None,
            key: CacheKey::default(),
        }
    }

    pub fn with_key(mut self, key: CacheKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_when(mut self, when: CacheWhen) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_untracked(mut self, untracked: bool) -> Self {
        self.untracked = Some(untracked);
        self
    }
}

fn relative_cache_paths<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let paths = Vec::<String>::deserialize(deserializer)?;
    Ok(paths.iter().map(|path| relative_cache_path(path)).collect())
}

fn relative_cache_path(path: &str) -> String {
    let path = path.strip_prefix("$CI_PROJECT_DIR").unwrap_or(path);
    let path = path.trim_start_matches('/');
    if path.starts_with("./") {
        path.to_string()
    } else {
        format!("./{}", path)
    }
}

/// Branch a cross-project need defaults to
pub const DEFAULT_NEED_REF: &str = "main";

/// Where a needed job lives
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum NeedSource {
    /// A job of this pipeline
    #[default]
    Local,
    /// A job of another project's pipeline
    Project { project: String, git_ref: String },
    /// A job of another pipeline, usually `$PARENT_PIPELINE_ID`
    Pipeline(String),
}

/// A job another job waits for, identified by its rendered name.
///
/// In a tree, needs are usually given as [`Job`](super::Job) or
/// [`Sequence`](super::Sequence) references and turned into `Need`s when
/// the pipeline renders. A `Need` built by name is used as is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "NeedRepr", into = "NeedRepr")]
pub struct Need {
    pub job: String,
    pub source: NeedSource,
    pub artifacts: bool,
}

impl Need {
    /// Need a job of this pipeline, including its artifacts
    pub fn job(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            source: NeedSource::Local,
            artifacts: true,
        }
    }

    /// Take the job from `project`, on [`DEFAULT_NEED_REF`] unless `git_ref`
    /// is given
    pub fn from_project(mut self, project: impl Into<String>, git_ref: Option<String>) -> Self {
        self.source = NeedSource::Project {
            project: project.into(),
            git_ref: git_ref.unwrap_or_else(|| DEFAULT_NEED_REF.to_string()),
        };
        self
    }

    /// Take the job from another pipeline of this project
    pub fn from_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.source = NeedSource::Pipeline(pipeline.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: bool) -> Self {
        self.artifacts = artifacts;
        self
    }
}

impl From<&str> for Need {
    fn from(job: &str) -> Self {
        Self::job(job)
    }
}

/// Wire shape of a [`Need`]: a bare job name or the full mapping
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NeedRepr {
    Job(String),
    Full {
        job: String,
        #[serde(default = "default_artifacts")]
        artifacts: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pipeline: Option<String>,
    },
}

fn default_artifacts() -> bool {
    true
}

impl TryFrom<NeedRepr> for Need {
    type Error = String;

    fn try_from(repr: NeedRepr) -> Result<Self, Self::Error> {
        match repr {
            NeedRepr::Job(job) => Ok(Self::job(job)),
            NeedRepr::Full {
                job,
                artifacts,
                project,
                git_ref,
                pipeline,
            } => {
                let need = Self::job(job).with_artifacts(artifacts);
                match (project, git_ref, pipeline) {
                    (Some(_), _, Some(_)) => Err(format!(
                        "need '{}' sets both `project` and `pipeline`",
                        need.job
                    )),
                    (None, Some(_), _) => Err(format!(
                        "need '{}' sets `ref` without `project`",
                        need.job
                    )),
                    (Some(project), git_ref, None) => Ok(need.from_project(project, git_ref)),
                    (None, None, Some(pipeline)) => Ok(need.from_pipeline(pipeline)),
                    (None, None, None) => Ok(need),
                }
            }
        }
    }
}

impl From<Need> for NeedRepr {
    fn from(need: Need) -> Self {
        let (project, git_ref, pipeline) = match need.source {
            NeedSource::Local => (None, None, None),
            NeedSource::Project { project, git_ref } => (Some(project), Some(git_ref), None),
            NeedSource::Pipeline(pipeline) => (None, None, Some(pipeline)),
        };
        Self::Full {
            job: need.job,
            artifacts: need.artifacts,
            project,
            git_ref,
            pipeline,
        }
    }
}

/// External configuration pulled into the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Include {
    Local {
        local: String,
    },
    Project {
        project: String,
        file: String,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
    },
    Remote {
        remote: String,
    },
    Template {
        template: String,
    },
}

/// Docker service linked to every job of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_renders_as_reference_without_entrypoint() {
        let image = Image::new("python").with_tag("3.12-slim");
        let value = serde_yaml::to_value(&image).unwrap();
        assert_eq!(value.as_str(), Some("python:3.12-slim"));
    }

    #[test]
    fn test_image_renders_as_mapping_with_entrypoint() {
        let image = Image::new("alpine").with_entrypoint([""]);
        let value = serde_yaml::to_value(&image).unwrap();
        assert_eq!(value["name"].as_str(), Some("alpine"));
        assert_eq!(value["entrypoint"][0].as_str(), Some(""));
    }

    #[test]
    fn test_parse_image_forms() {
        let image: Image = serde_yaml::from_str("busybox:latest").unwrap();
        assert_eq!(image.reference(), "busybox:latest");

        let image: Image = serde_yaml::from_str("name: gcr.io/kaniko\nentrypoint: ['']").unwrap();
        assert_eq!(image.name, "gcr.io/kaniko");
        assert_eq!(image.entrypoint, vec![String::new()]);
    }

    #[test]
    fn test_rule_uses_if_key() {
        let rule = Rule::new("$CI_COMMIT_BRANCH == \"main\"").with_when(WhenStatement::Manual);
        let value = serde_yaml::to_value(&rule).unwrap();
        assert_eq!(value["if"].as_str(), Some("$CI_COMMIT_BRANCH == \"main\""));
        assert_eq!(value["when"].as_str(), Some("manual"));
        assert!(value.get("changes").is_none());
    }

    #[test]
    fn test_parse_includes() {
        let yaml = r#"
- local: ci/common.yml
- project: group/templates
  file: build.yml
  ref: v1
- template: Security/SAST.gitlab-ci.yml
"#;
        let includes: Vec<Include> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(includes.len(), 3);
        assert!(matches!(&includes[0], Include::Local { local } if local == "ci/common.yml"));
        assert!(matches!(
            &includes[1],
            Include::Project { git_ref: Some(r), .. } if r == "v1"
        ));
        assert!(matches!(&includes[2], Include::Template { .. }));
    }

    #[test]
    fn test_artifacts_emptiness() {
        assert!(Artifacts::default().is_empty());
        assert!(!Artifacts::new(["dist/"]).is_empty());
        assert!(!Artifacts::default().with_report("junit", "report.xml").is_empty());
    }

    #[test]
    fn test_artifacts_excludes_use_gitlab_key() {
        let artifacts = Artifacts::new(["target/"]).with_excludes(["target/debug/**"]);
        let value = serde_yaml::to_value(&artifacts).unwrap();
        assert_eq!(value["exclude"][0].as_str(), Some("target/debug/**"));
        assert!(value.get("excludes").is_none());

        let parsed: Artifacts = serde_yaml::from_str("paths: [dist/]\nexclude: [dist/*.map]").unwrap();
        assert_eq!(parsed.excludes, vec!["dist/*.map"]);
    }

    #[test]
    fn test_allow_failure_forms() {
        let value = serde_yaml::to_value(AllowFailure::from(true)).unwrap();
        assert_eq!(value.as_bool(), Some(true));

        let value = serde_yaml::to_value(AllowFailure::exit_codes([137, 255])).unwrap();
        assert_eq!(value["exit_codes"][1].as_i64(), Some(255));

        let parsed: AllowFailure = serde_yaml::from_str("exit_codes: [1]").unwrap();
        assert_eq!(parsed, AllowFailure::exit_codes([1]));
    }

    #[test]
    fn test_cache_normalizes_paths_and_key() {
        let cache = Cache::new(["$CI_PROJECT_DIR/.cache/pip", "target", "./vendor"])
            .with_key(CacheKey::new("feature/v1.2"))
            .with_policy(CachePolicy::PullPush)
            .with_when(CacheWhen::OnSuccess);

        assert_eq!(cache.paths, vec!["./.cache/pip", "./target", "./vendor"]);
        assert_eq!(cache.key, CacheKey::Key("feature_v1-2".into()));

        let value = serde_yaml::to_value(&cache).unwrap();
        assert_eq!(value["policy"].as_str(), Some("pull-push"));
        assert_eq!(value["when"].as_str(), Some("on_success"));
        assert_eq!(value["key"].as_str(), Some("feature_v1-2"));
    }

    #[test]
    fn test_cache_key_forms() {
        let cache: Cache = serde_yaml::from_str("paths: [target]").unwrap();
        assert_eq!(cache.key, CacheKey::Key(DEFAULT_CACHE_KEY.into()));
        assert_eq!(cache.paths, vec!["./target"]);

        let key = CacheKey::files(["Cargo.lock"]).with_prefix("rust");
        let value = serde_yaml::to_value(&key).unwrap();
        assert_eq!(value["files"][0].as_str(), Some("Cargo.lock"));
        assert_eq!(value["prefix"].as_str(), Some("rust"));

        // a prefix only applies to file keys
        assert_eq!(CacheKey::new("deps").with_prefix("x"), CacheKey::Key("deps".into()));
    }

    #[test]
    fn test_need_rendering() {
        let value = serde_yaml::to_value(Need::job("build")).unwrap();
        assert_eq!(value["job"].as_str(), Some("build"));
        assert_eq!(value["artifacts"].as_bool(), Some(true));
        assert!(value.get("project").is_none());

        let need = Need::job("package").from_project("group/lib", None);
        let value = serde_yaml::to_value(&need).unwrap();
        assert_eq!(value["project"].as_str(), Some("group/lib"));
        assert_eq!(value["ref"].as_str(), Some(DEFAULT_NEED_REF));
    }

    #[test]
    fn test_parse_needs() {
        let yaml = r#"
- build
- job: docs
  artifacts: false
- job: generate
  pipeline: $PARENT_PIPELINE_ID
"#;
        let needs: Vec<Need> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(needs[0], Need::job("build"));
        assert!(!needs[1].artifacts);
        assert_eq!(needs[2].source, NeedSource::Pipeline("$PARENT_PIPELINE_ID".into()));
    }

    #[test]
    fn test_parse_need_rejects_conflicting_sources() {
        let err = serde_yaml::from_str::<Need>("job: a\nproject: g/p\npipeline: \"1\"");
        assert!(err.is_err());

        let err = serde_yaml::from_str::<Need>("job: a\nref: main");
        assert!(err.is_err());
    }
}
