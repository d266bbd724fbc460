//! Release configuration (`releases/config.json`) loading and validation
//!
//! Loaded once, before any other work. Boards are either a bare name (no
//! browser-flash bundle) or `{"name": ..., "chip_family": ...}`.

use crate::core::error::{ConfigError, ReleaseResult, ResultExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the release configuration, relative to the repo root
pub const DEFAULT_CONFIG_PATH: &str = "releases/config.json";

fn default_release_branch() -> String {
  "main".to_string()
}

/// Release configuration as written on disk, before validation
#[derive(Debug, Deserialize)]
struct RawReleaseConfig {
  #[serde(default)]
  boards: Option<Vec<Value>>,
  #[serde(default)]
  firmware_url_base: Option<String>,
  #[serde(default)]
  signing_key_path: Option<String>,
  #[serde(default = "default_release_branch")]
  release_branch: String,
}

/// A build target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
  pub name: String,
  /// Chip family for the browser flashing tool (absent for legacy entries)
  pub chip_family: Option<String>,
}

impl Board {
  /// Parse one entry of the `boards` array
  fn from_value(index: usize, value: &Value) -> Result<Self, ConfigError> {
    match value {
      Value::String(name) if !name.trim().is_empty() => Ok(Self {
        name: name.clone(),
        chip_family: None,
      }),
      Value::String(_) => Err(ConfigError::InvalidBoard {
        index,
        reason: "board name is empty".to_string(),
      }),
      Value::Object(map) => {
        let name = required_str(map, "name").ok_or_else(|| ConfigError::InvalidBoard {
          index,
          reason: "missing `name`".to_string(),
        })?;
        let chip_family = required_str(map, "chip_family").ok_or_else(|| ConfigError::InvalidBoard {
          index,
          reason: format!("board '{}' is missing `chip_family`", name),
        })?;
        Ok(Self {
          name,
          chip_family: Some(chip_family),
        })
      }
      other => Err(ConfigError::InvalidBoard {
        index,
        reason: format!("expected a string or an object, found {}", json_kind(other)),
      }),
    }
  }
}

fn required_str(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
  map
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

/// Validated release configuration. Loaded once, immutable for the run.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
  pub boards: Vec<Board>,
  pub firmware_url_base: String,
  pub signing_key_path: PathBuf,
  pub release_branch: String,
  /// Where the config was read from (for messages)
  pub source: PathBuf,
}

impl ReleaseConfig {
  /// Load and validate the release configuration
  ///
  /// `path` is resolved against `root` when relative.
  pub fn load(root: &Path, path: &Path) -> ReleaseResult<Self> {
    let full_path = root.join(path);
    if !full_path.exists() {
      return Err(ConfigError::NotFound { path: path.to_path_buf() }.into());
    }

    let content =
      fs::read_to_string(&full_path).with_context(|| format!("Error reading {}", path.display()))?;

    Self::parse(&content, path)
  }

  /// Parse and validate config text
  pub fn parse(content: &str, source: &Path) -> ReleaseResult<Self> {
    let raw: RawReleaseConfig = serde_json::from_str(content).map_err(|e| ConfigError::Malformed {
      path: source.to_path_buf(),
      reason: e.to_string(),
    })?;

    let entries = raw.boards.unwrap_or_default();
    if entries.is_empty() {
      return Err(missing("boards"));
    }

    let firmware_url_base = raw.firmware_url_base.unwrap_or_default();
    if firmware_url_base.trim().is_empty() {
      return Err(missing("firmware_url_base"));
    }

    let signing_key_path = raw.signing_key_path.unwrap_or_default();
    if signing_key_path.trim().is_empty() {
      return Err(missing("signing_key_path"));
    }

    let mut boards = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
      let board = Board::from_value(index, entry)?;
      if !seen.insert(board.name.clone()) {
        return Err(ConfigError::DuplicateBoard { name: board.name }.into());
      }
      boards.push(board);
    }

    Ok(Self {
      boards,
      firmware_url_base,
      signing_key_path: expand_home(&signing_key_path),
      release_branch: raw.release_branch,
      source: source.to_path_buf(),
    })
  }

  /// Non-fatal issues worth telling the user about
  pub fn warnings(&self) -> Vec<String> {
    let mut warnings = Vec::new();
    if !self.firmware_url_base.ends_with('/') {
      warnings.push(format!(
        "firmware_url_base '{}' does not end with '/'; URLs are formed by appending '<board>/...'",
        self.firmware_url_base
      ));
    }
    warnings
  }

  /// Public download URL for a board's signed firmware
  pub fn firmware_url(&self, board: &str, version: &str) -> String {
    format!("{}{}/{}-{}.bin", self.firmware_url_base, board, board, version)
  }

  /// Public URL of a board's browser-flash manifest
  pub fn webflash_manifest_url(&self, board: &str, version: &str) -> String {
    format!(
      "{}{}/espwebtools-{}/manifest.json",
      self.firmware_url_base, board, version
    )
  }
}

fn missing(field: &str) -> crate::core::error::ReleaseError {
  ConfigError::MissingField {
    field: field.to_string(),
  }
  .into()
}

/// Expand a leading `~/` against $HOME
pub fn expand_home(path: &str) -> PathBuf {
  if let Some(rest) = path.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  PathBuf::from(path)
}
