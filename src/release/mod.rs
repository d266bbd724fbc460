//! Firmware release pipeline
//!
//! - **version**: firmware version from the C headers
//! - **changelog**: release notes for a version from CHANGELOG.md
//! - **board**: per-board build, sign and package
//! - **webflash**: ESP Web Tools browser-flash bundle
//! - **manifest**: OTA manifest and release history
//! - **publish**: commit, tag, push and GitHub release

pub mod board;
pub mod changelog;
pub mod manifest;
pub mod publish;
pub mod version;
pub mod webflash;
