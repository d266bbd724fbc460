//! OTA manifest and cumulative release history
//!
//! - `releases/ota_manifest.json`: flat list, one entry per board, rewritten
//!   every run
//! - `releases/release_history.json`: board → versions (newest first), loaded,
//!   updated and rewritten. A rerun for an existing version replaces that entry
//!   in place.

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::plan::Operation;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use std::fmt;
use std::fs;
use std::path::Path;

pub const OTA_MANIFEST_PATH: &str = "releases/ota_manifest.json";
pub const RELEASE_HISTORY_PATH: &str = "releases/release_history.json";

/// Serialize as JSON indented with four spaces
pub fn to_json_pretty<T: Serialize>(value: &T) -> ReleaseResult<String> {
  let mut buf = Vec::new();
  let formatter = PrettyFormatter::with_indent(b"    ");
  let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
  value.serialize(&mut ser)?;
  Ok(String::from_utf8(buf)?)
}

/// One board's entry in the OTA manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaManifestEntry {
  #[serde(rename = "type")]
  pub board: String,
  pub version: String,
  pub url: String,
  pub changelog: String,
}

/// Operation that (re)writes the OTA manifest
pub fn write_ota_manifest(entries: &[OtaManifestEntry]) -> ReleaseResult<Operation> {
  Ok(Operation::write_file(OTA_MANIFEST_PATH, to_json_pretty(&entries)?))
}

/// One released version of one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub version: String,
  pub url: String,
  #[serde(default)]
  pub espwebtools_manifest: Option<String>,
  pub changelog: String,
  /// Fields written by other tools are carried through untouched
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HistoryEntry {
  pub fn new(version: &str, url: String, espwebtools_manifest: Option<String>, changelog: &str) -> Self {
    Self {
      version: version.to_string(),
      url,
      espwebtools_manifest,
      changelog: changelog.to_string(),
      extra: serde_json::Map::new(),
    }
  }
}

/// Every version ever released, per board, newest first
///
/// Boards keep the order they have in the file; new boards are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseHistory {
  boards: Vec<(String, Vec<HistoryEntry>)>,
}

impl Serialize for ReleaseHistory {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(self.boards.iter().map(|(board, entries)| (board, entries)))
  }
}

impl<'de> Deserialize<'de> for ReleaseHistory {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct HistoryVisitor;

    impl<'de> Visitor<'de> for HistoryVisitor {
      type Value = ReleaseHistory;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping board names to release lists")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut boards: Vec<(String, Vec<HistoryEntry>)> = Vec::new();
        while let Some((board, entries)) = map.next_entry::<String, Vec<HistoryEntry>>()? {
          match boards.iter_mut().find(|(name, _)| *name == board) {
            Some(existing) => existing.1 = entries,
            None => boards.push((board, entries)),
          }
        }
        Ok(ReleaseHistory { boards })
      }
    }

    deserializer.deserialize_map(HistoryVisitor)
  }
}

impl ReleaseHistory {
  /// Load the history under `root`, or start empty when there is none yet
  pub fn load(root: &Path) -> ReleaseResult<Self> {
    let path = root.join(RELEASE_HISTORY_PATH);
    if !path.exists() {
      return Ok(Self::default());
    }

    let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", RELEASE_HISTORY_PATH))?;
    serde_json::from_str(&content).map_err(|e| {
      ReleaseError::with_help(
        format!("Error parsing {}: {}", RELEASE_HISTORY_PATH, e),
        "Fix or remove the file; it is rebuilt from this release onward.",
      )
    })
  }

  /// Record `entry` for `board`
  ///
  /// Replaces an existing entry with the same version in place, otherwise
  /// inserts at the front.
  pub fn record(&mut self, board: &str, entry: HistoryEntry) {
    let idx = match self.boards.iter().position(|(name, _)| name == board) {
      Some(idx) => idx,
      None => {
        self.boards.push((board.to_string(), Vec::new()));
        self.boards.len() - 1
      }
    };
    let versions = &mut self.boards[idx].1;
    match versions.iter_mut().find(|existing| existing.version == entry.version) {
      Some(existing) => *existing = entry,
      None => versions.insert(0, entry),
    }
  }

  #[cfg(test)]
  pub fn versions(&self, board: &str) -> &[HistoryEntry] {
    self
      .boards
      .iter()
      .find(|(name, _)| name == board)
      .map(|(_, entries)| entries.as_slice())
      .unwrap_or_default()
  }

  /// Operation that rewrites the history file
  pub fn write_operation(&self) -> ReleaseResult<Operation> {
    Ok(Operation::write_file(RELEASE_HISTORY_PATH, to_json_pretty(self)?))
  }
}
