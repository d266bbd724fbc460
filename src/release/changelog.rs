//! Release notes extraction from CHANGELOG.md
//!
//! A section starts at the first heading naming the version (`## Version 1.2.3`,
//! `### v1.2.3`, `# 1.2.3`) and runs until the next line starting with `#`.

use crate::core::error::{ChangelogError, ReleaseResult, ResultExt};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const CHANGELOG_PATH: &str = "CHANGELOG.md";

/// Read CHANGELOG.md under `root` and extract the notes for `version`
pub fn load_release_notes(root: &Path, version: &str) -> ReleaseResult<String> {
  let path = root.join(CHANGELOG_PATH);
  if !path.exists() {
    return Err(
      ChangelogError::NotFound {
        path: PathBuf::from(CHANGELOG_PATH),
      }
      .into(),
    );
  }

  let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", CHANGELOG_PATH))?;
  extract_section(&content, version)
}

/// Extract the section for `version`, heading included, trimmed
pub fn extract_section(content: &str, version: &str) -> ReleaseResult<String> {
  // the version must end the heading word: 1.2.3 never matches 1.2.30 or 1.2.3-rc.1
  let pattern = format!(r"(?m)^#+[ \t]*(?:Version[ \t]+)?v?{}(?:[ \t\r]|$)", regex::escape(version));
  let heading = Regex::new(&pattern)?;

  let start = heading
    .find(content)
    .ok_or_else(|| ChangelogError::MissingSection {
      version: version.to_string(),
    })?
    .start();

  let mut lines = content[start..].lines();
  let mut section: Vec<&str> = lines.next().into_iter().collect();
  section.extend(lines.take_while(|line| !line.starts_with('#')));

  Ok(section.join("\n").trim().to_string())
}
