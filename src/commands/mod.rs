//! CLI commands for yarrboard-release
//!
//! - **release**: build, sign, package and (optionally) publish a firmware release

pub mod release;

pub use release::run_release;
