// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! # pipecraft - GitLab CI pipeline builder
//!
//! `pipecraft` composes CI jobs into nested, reusable sequences and renders
//! the tree as a flat, deterministic GitLab CI pipeline.
//!
//! ## Features
//!
//! - **Reusable sequences** - Attach the same job definitions under different names and stages
//! - **Nearest-wins overrides** - A name or stage given at attachment replaces the job's own
//! - **Collision detection** - Two jobs resolving to the same name and stage fail the render
//! - **Deterministic output** - Stages ordered by first occurrence, jobs in tree order
//!
//! ## Quick Start
//!
//! ```
//! use pipecraft::{Job, Override, Pipeline, Sequence};
//!
//! let jobs = Sequence::new();
//! jobs.add_children([Job::new("build", ["make"])], Override::none())?;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .add_children([jobs.duplicate()], Override::stage("linux"))?
//!     .add_children([jobs.duplicate()], Override::stage("mac"))?;
//!
//! let document = pipeline.render()?;
//! assert_eq!(document.stage_names(), vec!["linux", "mac"]);
//! # Ok::<(), pipecraft::PipecraftError>(())
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod utils;
pub mod writer;

// Re-export commonly used types
pub use errors::{PipecraftError, PipecraftResult};
pub use pipeline::{Job, Node, Override, Pipeline, PipelineDocument, Sequence};
pub use writer::YamlWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
