//! Tooling & Integration Layer
//!
//! The `doctree` command-line surface over the document store.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
