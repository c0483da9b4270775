// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Terminal color utilities
//!
//! Provides consistent color schemes across the CLI.

use colored::Colorize;

use crate::errors::RecoverySuggestion;

/// Style for dimmed/secondary text
pub fn dimmed(msg: &str) -> colored::ColoredString {
    msg.dimmed()
}

/// Style for code/commands
pub fn code(msg: &str) -> colored::ColoredString {
    msg.cyan()
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a numbered item
pub fn print_numbered(num: usize, content: &str) {
    println!("  {}. {}", num, content);
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print a recovery suggestion under an error
pub fn print_suggestion(suggestion: &RecoverySuggestion) {
    println!();
    println!("  {} {}", "→".blue(), suggestion.action.bold());
    for (i, step) in suggestion.steps.iter().enumerate() {
        println!("    {}. {}", i + 1, step);
    }
    if !suggestion.examples.is_empty() {
        println!();
        for line in &suggestion.examples {
            println!("      {}", code(line));
        }
    }
}
