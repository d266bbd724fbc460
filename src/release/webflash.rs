//! Browser-flash bundle for ESP Web Tools
//!
//! The bundle is a directory of raw partition images plus a `manifest.json`
//! telling the web flasher where each image goes:
//!
//! | part             | offset  |
//! |------------------|---------|
//! | `bootloader.bin` | 0x1000  |
//! | `partitions.bin` | 0x8000  |
//! | `boot_app0.bin`  | 0xE000  |
//! | `firmware.bin`   | 0x10000 |
//!
//! Missing bootloader/partition/bootstrap images are warnings: the manifest is
//! still written, listing only the parts that exist.

use crate::core::error::ReleaseResult;
use crate::core::plan::{Operation, Plan};
use crate::release::board::BoardPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BOOTLOADER_OFFSET: u32 = 4096;
pub const PARTITIONS_OFFSET: u32 = 32768;
pub const BOOT_APP0_OFFSET: u32 = 57344;
pub const FIRMWARE_OFFSET: u32 = 65536;

pub const BOOT_APP0: &str = "boot_app0.bin";

/// ESP Web Tools manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspWebToolsManifest {
  pub name: String,
  pub version: String,
  pub new_install_prompt_erase: bool,
  pub builds: Vec<FlashBuild>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashBuild {
  #[serde(rename = "chipFamily")]
  pub chip_family: String,
  pub parts: Vec<FlashPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashPart {
  pub path: String,
  pub offset: u32,
}

/// Finds the `boot_app0.bin` shipped with the Arduino ESP32 framework
///
/// Candidates are tried in order. A candidate containing glob metacharacters
/// is expanded and the match with the highest `@<version>` package suffix is
/// taken, compared numerically, so `framework-arduinoespressif32@3.10.0` beats
/// `@3.9.0`.
#[derive(Debug, Clone)]
pub struct BootstrapLocator {
  candidates: Vec<String>,
}

impl BootstrapLocator {
  /// Candidate list for the PlatformIO package cache
  ///
  /// Uses `$PLATFORMIO_CORE_DIR`, falling back to `$HOME/.platformio`.
  pub fn platformio() -> Self {
    let core_dir = std::env::var("PLATFORMIO_CORE_DIR")
      .map(PathBuf::from)
      .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".platformio")))
      .unwrap_or_else(|_| PathBuf::from(".platformio"));
    Self::under(&core_dir)
  }

  /// Candidate list for a PlatformIO core directory
  pub fn under(core_dir: &Path) -> Self {
    let packages = core_dir.join("packages");
    let suffix = Path::new("tools").join("partitions").join(BOOT_APP0);
    Self {
      candidates: vec![
        packages
          .join("framework-arduinoespressif32")
          .join(&suffix)
          .to_string_lossy()
          .to_string(),
        packages
          .join("framework-arduinoespressif32@*")
          .join(&suffix)
          .to_string_lossy()
          .to_string(),
      ],
    }
  }

  pub fn candidates(&self) -> &[String] {
    &self.candidates
  }

  /// First existing candidate, or None
  pub fn locate(&self) -> ReleaseResult<Option<PathBuf>> {
    for candidate in &self.candidates {
      if !candidate.contains(['*', '?', '[']) {
        let path = PathBuf::from(candidate);
        if path.is_file() {
          return Ok(Some(path));
        }
        continue;
      }

      let mut matches: Vec<PathBuf> = glob::glob(candidate)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
      matches.sort_by(|a, b| package_version(a).cmp(&package_version(b)).then_with(|| a.cmp(b)));
      if let Some(found) = matches.pop() {
        return Ok(Some(found));
      }
    }
    Ok(None)
  }
}

/// Numeric components of the `name@x.y.z` package directory in `path`
fn package_version(path: &Path) -> Vec<u64> {
  path
    .components()
    .rev()
    .filter_map(|c| c.as_os_str().to_str())
    .find_map(|name| name.split_once('@').map(|(_, version)| version))
    .map(|version| {
      version
        .split(['.', '-', '+'])
        .map(|part| part.parse().unwrap_or(0))
        .collect()
    })
    .unwrap_or_default()
}

/// Everything needed to plan one board's bundle
pub struct BundleInputs<'a> {
  pub root: &'a Path,
  pub board: &'a str,
  pub chip_family: &'a str,
  pub version: &'a str,
  pub paths: &'a BoardPaths,
  pub bootstrap: Option<&'a Path>,
  /// Treat build outputs as present (dry-run: the build would have produced them)
  pub assume_built: bool,
}

/// Planned bundle: copy operations, the manifest to write, and warnings
pub struct PlannedBundle {
  pub plan: Plan,
  pub manifest: EspWebToolsManifest,
  pub manifest_path: PathBuf,
  pub warnings: Vec<String>,
}

/// Plan the browser-flash bundle for a board
pub fn plan_bundle(inputs: &BundleInputs<'_>) -> PlannedBundle {
  let dir = inputs.paths.webflash_dir();
  let mut plan = Plan::new("browser-flash bundle");
  let mut parts = Vec::new();
  let mut warnings = Vec::new();

  plan.add(Operation::create_dir(&dir));

  let exists = |rel: &Path| inputs.assume_built || inputs.root.join(rel).is_file();

  let built_parts = [
    (inputs.paths.bootloader(), "bootloader.bin", BOOTLOADER_OFFSET),
    (inputs.paths.partitions(), "partitions.bin", PARTITIONS_OFFSET),
  ];
  for (source, name, offset) in built_parts {
    if exists(&source) {
      plan.add(Operation::copy(&source, dir.join(name)));
      parts.push(FlashPart {
        path: name.to_string(),
        offset,
      });
    } else {
      warnings.push(format!("{} not found; leaving it out of the flash manifest", source.display()));
    }
  }

  match inputs.bootstrap {
    Some(bootstrap) => {
      plan.add(Operation::copy(bootstrap, dir.join(BOOT_APP0)));
      parts.push(FlashPart {
        path: BOOT_APP0.to_string(),
        offset: BOOT_APP0_OFFSET,
      });
    }
    None => warnings.push(format!(
      "{} not found in the PlatformIO packages; leaving it out of the flash manifest",
      BOOT_APP0
    )),
  }

  plan.add(Operation::copy(inputs.paths.firmware_bin(), dir.join("firmware.bin")));
  parts.push(FlashPart {
    path: "firmware.bin".to_string(),
    offset: FIRMWARE_OFFSET,
  });

  let manifest = EspWebToolsManifest {
    name: format!("Yarrboard {}", inputs.board),
    version: inputs.version.to_string(),
    new_install_prompt_erase: true,
    builds: vec![FlashBuild {
      chip_family: inputs.chip_family.to_string(),
      parts,
    }],
  };
  PlannedBundle {
    plan,
    manifest,
    manifest_path: dir.join("manifest.json"),
    warnings,
  }
}
