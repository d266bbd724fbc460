//! Read-only git queries (SystemGit)
//!
//! Mutating git commands (add, commit, tag, push) go through the plan executor
//! so dry-run mode can mirror them.

pub mod system_git;

pub use system_git::SystemGit;
