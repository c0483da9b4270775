// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Utility modules
//!
//! Common utilities for the pipecraft CLI.

pub mod colors;

pub use colors::*;
