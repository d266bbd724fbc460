//! Firmware version resolution from C headers
//!
//! Two sources, tried in order:
//!
//! 1. `src/config.h` with `#define YB_FIRMWARE_VERSION "x.y.z"` (first match wins)
//! 2. `src/YarrboardVersion.h` with separate MAJOR/MINOR/PATCH integer macros,
//!    consulted only when `src/config.h` does not exist

use crate::core::error::{ReleaseResult, ResultExt, VersionError};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const PRIMARY_HEADER: &str = "src/config.h";
pub const SECONDARY_HEADER: &str = "src/YarrboardVersion.h";
pub const VERSION_MACRO: &str = "YB_FIRMWARE_VERSION";

/// Resolved release version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
  raw: String,
  semver: Option<semver::Version>,
}

impl FirmwareVersion {
  /// Wrap a version string; dotted triples also get a parsed semver form
  pub fn new(raw: impl Into<String>) -> Self {
    let raw = raw.into();
    let semver = semver::Version::parse(&raw).ok();
    Self { raw, semver }
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// Tag name for this version (`v1.2.3`)
  pub fn tag(&self) -> String {
    format!("v{}", self.raw)
  }

  /// True for semver pre-releases such as `2.1.0-beta.1`
  pub fn is_prerelease(&self) -> bool {
    self.semver.as_ref().is_some_and(|v| !v.pre.is_empty())
  }

  /// True when the version is not a semver triple (still usable, just opaque)
  pub fn is_opaque(&self) -> bool {
    self.semver.is_none()
  }
}

impl fmt::Display for FirmwareVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

/// Resolve the firmware version under `root`
pub fn resolve_version(root: &Path) -> ReleaseResult<FirmwareVersion> {
  let primary = root.join(PRIMARY_HEADER);
  let secondary = root.join(SECONDARY_HEADER);

  if primary.exists() {
    let content = fs::read_to_string(&primary).with_context(|| format!("Failed to read {}", PRIMARY_HEADER))?;
    return version_from_config_header(&content)
      .map(FirmwareVersion::new)
      .ok_or_else(|| {
        VersionError::MacroNotFound {
          path: PathBuf::from(PRIMARY_HEADER),
          macro_name: VERSION_MACRO.to_string(),
        }
        .into()
      });
  }

  if secondary.exists() {
    let content =
      fs::read_to_string(&secondary).with_context(|| format!("Failed to read {}", SECONDARY_HEADER))?;
    return version_from_version_header(&content)
      .map(FirmwareVersion::new)
      .map_err(|missing| {
        VersionError::Incomplete {
          path: PathBuf::from(SECONDARY_HEADER),
          missing,
        }
        .into()
      });
  }

  Err(
    VersionError::NoSource {
      candidates: vec![PathBuf::from(PRIMARY_HEADER), PathBuf::from(SECONDARY_HEADER)],
    }
    .into(),
  )
}

/// Scan for the quoted version macro, line by line
pub fn version_from_config_header(content: &str) -> Option<String> {
  let re = Regex::new(r#"YB_FIRMWARE_VERSION "(.*)""#).ok()?;
  content
    .lines()
    .find_map(|line| re.captures(line).map(|caps| caps[1].to_string()))
}

/// Compose `major.minor.patch` from the three integer macros
///
/// Returns the names of the missing components on failure. A later
/// definition of the same component overrides an earlier one.
pub fn version_from_version_header(content: &str) -> Result<String, Vec<&'static str>> {
  let re = match Regex::new(r"#define\s+YARRBOARD_VERSION_(MAJOR|MINOR|PATCH)\s+(\d+)") {
    Ok(re) => re,
    Err(_) => return Err(vec!["MAJOR", "MINOR", "PATCH"]),
  };

  let (mut major, mut minor, mut patch) = (None, None, None);
  for line in content.lines() {
    if let Some(caps) = re.captures(line) {
      let value = caps[2].to_string();
      match &caps[1] {
        "MAJOR" => major = Some(value),
        "MINOR" => minor = Some(value),
        _ => patch = Some(value),
      }
    }
  }

  match (major, minor, patch) {
    (Some(major), Some(minor), Some(patch)) => Ok(format!("{}.{}.{}", major, minor, patch)),
    (major, minor, patch) => {
      let mut missing = Vec::new();
      if major.is_none() {
        missing.push("MAJOR");
      }
      if minor.is_none() {
        missing.push("MINOR");
      }
      if patch.is_none() {
        missing.push("PATCH");
      }
      Err(missing)
    }
  }
}
