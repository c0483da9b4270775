// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Job identifier resolution
//!
//! A job's final name and stage are computed late, while rendering, from the
//! job's own values and the overrides recorded at every attachment site
//! between the root and the job. The override closest to the job wins.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::{PipecraftError, PipecraftResult};

/// Stage used when neither the job nor any override supplies one
pub const DEFAULT_STAGE: &str = "test";

/// Name/stage override recorded at an `add_children` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Override {
    pub name: Option<String>,
    pub stage: Option<String>,
}

impl Override {
    /// No override at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Override both name and stage
    pub fn new(name: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            stage: Some(stage.into()),
        }
    }

    /// Override only the name
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            stage: None,
        }
    }

    /// Override only the stage
    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            name: None,
            stage: Some(stage.into()),
        }
    }

    /// Check override values and drop empty strings.
    pub(crate) fn normalized(self) -> PipecraftResult<Self> {
        Ok(Self {
            name: normalize_value("name", self.name)?,
            stage: normalize_value("stage", self.stage)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.stage.is_none()
    }
}

fn override_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s\p{Cc}](?:[^\p{Cc}]*[^\s\p{Cc}])?$").expect("override pattern is valid")
    })
}

fn normalize_value(field: &str, value: Option<String>) -> PipecraftResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    if value.is_empty() {
        return Ok(None);
    }

    if !override_pattern().is_match(&value) {
        let reason = if value.chars().any(char::is_control) {
            "control characters are not allowed"
        } else {
            "leading or trailing whitespace is not allowed"
        };
        return Err(PipecraftError::InvalidOverride {
            field: field.to_string(),
            value: value.escape_debug().to_string(),
            reason: reason.to_string(),
        });
    }

    Ok(Some(value))
}

/// Overrides accumulated from the root down to a node, farthest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideChain {
    links: Vec<Override>,
}

impl OverrideChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new chain with `nearest` appended below the current links
    pub fn extended(&self, nearest: &Override) -> Self {
        let mut links = self.links.clone();
        links.push(nearest.clone());
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn nearest_name(&self) -> Option<&str> {
        self.links.iter().rev().find_map(|o| o.name.as_deref())
    }

    fn nearest_stage(&self) -> Option<&str> {
        self.links.iter().rev().find_map(|o| o.stage.as_deref())
    }

    /// Resolve a job's final identifier.
    ///
    /// Stage: nearest stage override, else the job's stage, else
    /// [`DEFAULT_STAGE`]. Name: nearest name override, else the job's name,
    /// else a name derived from the stages. A job that only has its own
    /// stage and sits under a different stage override is named
    /// `{own}-{override}`, so the same job reused in two stages keeps two
    /// distinct names.
    pub fn resolve(&self, own_name: Option<&str>, own_stage: Option<&str>) -> Identifier {
        let stage = self
            .nearest_stage()
            .or(own_stage)
            .unwrap_or(DEFAULT_STAGE)
            .to_string();

        let name = match self.nearest_name().or(own_name) {
            Some(name) => name.to_string(),
            None => match own_stage {
                Some(own) if own != stage => format!("{}-{}", own, stage),
                Some(own) => own.to_string(),
                None => stage.clone(),
            },
        };

        Identifier { name, stage }
    }
}

impl FromIterator<Override> for OverrideChain {
    fn from_iter<T: IntoIterator<Item = Override>>(iter: T) -> Self {
        Self {
            links: iter.into_iter().collect(),
        }
    }
}

/// A job's resolved (name, stage) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub name: String,
    pub stage: String,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.stage)
    }
}

/// Position of a node in the tree, as child indices from the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        for index in &self.0 {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}
