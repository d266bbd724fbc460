//! Core engine for release runs
//!
//! - **config**: release config (`releases/config.json`) parsing and validation
//! - **error**: error types with contextual help messages
//! - **executor**: runs or prints planned operations
//! - **plan**: side-effecting operations and their shell rendering
//! - **vcs**: git queries (SystemGit)

pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod vcs;
