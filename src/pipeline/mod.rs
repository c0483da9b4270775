// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Pipeline composition and rendering
//!
//! This module defines the job tree (jobs, sequences, the pipeline root),
//! the rules that give each job its final name and stage, and the flat
//! document a render pass produces.

mod definition;
mod document;
mod identifier;
mod job;
mod node;
mod reference;
mod root;
mod sequence;
mod validation;
mod values;

pub use definition::*;
pub use document::{JobDocument, PipelineDocument, StageDocument};
pub use identifier::{Identifier, NodePath, Override, OverrideChain, DEFAULT_STAGE};
pub use job::Job;
pub use node::Node;
pub use reference::JobReference;
pub use root::Pipeline;
pub use sequence::Sequence;
pub use validation::{ensure_unique_identifiers, PipelineValidator, ValidationResult};
pub use values::{
    AllowFailure, Artifacts, Cache, CacheKey, CachePolicy, CacheWhen, Image, Include, Need,
    NeedSource, Rule, Service, WhenStatement, DEFAULT_CACHE_KEY, DEFAULT_NEED_REF,
};
