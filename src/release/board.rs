//! Per-board build, sign and package steps
//!
//! For each board: build with PlatformIO, sign the binary with openssl,
//! prepend the signature, copy the signed binary and ELF into
//! `releases/<board>/`, and (for boards with a chip family) assemble the
//! browser-flash bundle. A failed step halts that board only.

use crate::core::config::{Board, ReleaseConfig};
use crate::core::executor::Executor;
use crate::core::plan::{Operation, Plan};
use crate::release::manifest::to_json_pretty;
use crate::release::version::FirmwareVersion;
use crate::release::webflash::{self, BundleInputs};
use crate::utils::display_path;
use std::path::{Path, PathBuf};

pub const BUILD_ROOT: &str = ".pio/build";
pub const RELEASES_DIR: &str = "releases";

/// Where a board's build outputs and release artifacts live (relative to root)
#[derive(Debug, Clone)]
pub struct BoardPaths {
  board: String,
  version: String,
  build_dir: PathBuf,
  release_dir: PathBuf,
}

impl BoardPaths {
  pub fn new(board: &str, version: &str) -> Self {
    Self {
      board: board.to_string(),
      version: version.to_string(),
      build_dir: Path::new(BUILD_ROOT).join(board),
      release_dir: Path::new(RELEASES_DIR).join(board),
    }
  }

  pub fn firmware_bin(&self) -> PathBuf {
    self.build_dir.join("firmware.bin")
  }

  pub fn firmware_elf(&self) -> PathBuf {
    self.build_dir.join("firmware.elf")
  }

  pub fn signature(&self) -> PathBuf {
    self.build_dir.join("firmware.sign")
  }

  pub fn signed_bin(&self) -> PathBuf {
    self.build_dir.join("signed.bin")
  }

  pub fn bootloader(&self) -> PathBuf {
    self.build_dir.join("bootloader.bin")
  }

  pub fn partitions(&self) -> PathBuf {
    self.build_dir.join("partitions.bin")
  }

  pub fn release_dir(&self) -> &Path {
    &self.release_dir
  }

  pub fn release_bin(&self) -> PathBuf {
    self.release_dir.join(format!("{}-{}.bin", self.board, self.version))
  }

  pub fn release_elf(&self) -> PathBuf {
    self.release_dir.join(format!("{}-{}.elf", self.board, self.version))
  }

  pub fn webflash_dir(&self) -> PathBuf {
    self.release_dir.join(format!("espwebtools-{}", self.version))
  }
}

/// How a board's build ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardStatus {
  Built,
  Failed { step: String, error: String },
}

/// Result of processing one board
#[derive(Debug, Clone)]
pub struct BoardOutcome {
  pub board: Board,
  pub status: BoardStatus,
  pub warnings: Vec<String>,
  /// Signed binary copied into the releases directory
  pub release_bin: PathBuf,
  /// Browser-flash manifest, when a bundle was assembled
  pub webflash_manifest: Option<PathBuf>,
}

impl BoardOutcome {
  pub fn is_built(&self) -> bool {
    self.status == BoardStatus::Built
  }
}

/// Build inputs shared by every board in a run
pub struct BoardBuild<'a> {
  pub config: &'a ReleaseConfig,
  pub version: &'a FirmwareVersion,
  /// Located bootstrap binary, if any
  pub bootstrap: Option<&'a Path>,
}

impl BoardBuild<'_> {
  /// Build, sign and package the firmware for `board`
  pub fn run(&self, exec: &mut Executor<'_>, board: &Board) -> BoardOutcome {
    let paths = BoardPaths::new(&board.name, self.version.as_str());
    let mut outcome = BoardOutcome {
      board: board.clone(),
      status: BoardStatus::Built,
      warnings: Vec::new(),
      release_bin: paths.release_bin(),
      webflash_manifest: None,
    };

    for plan in self.firmware_plans(board, &paths) {
      if let Err(err) = exec.apply_plan(&plan) {
        outcome.status = BoardStatus::Failed {
          step: plan.label.clone(),
          error: err.to_string(),
        };
        return outcome;
      }
    }

    let Some(chip_family) = board.chip_family.as_deref() else {
      outcome
        .warnings
        .push("no chip_family configured; skipping browser-flash bundle".to_string());
      return outcome;
    };

    let bundle = webflash::plan_bundle(&BundleInputs {
      root: exec.root(),
      board: &board.name,
      chip_family,
      version: self.version.as_str(),
      paths: &paths,
      bootstrap: self.bootstrap,
      assume_built: exec.is_dry_run(),
    });
    outcome.warnings.extend(bundle.warnings);

    let mut plan = bundle.plan;
    let written = to_json_pretty(&bundle.manifest).and_then(|json| {
      plan.add(Operation::write_file(&bundle.manifest_path, json));
      exec.apply_plan(&plan)
    });
    match written {
      Ok(()) => outcome.webflash_manifest = Some(bundle.manifest_path),
      Err(err) => {
        outcome.status = BoardStatus::Failed {
          step: plan.label.clone(),
          error: err.to_string(),
        };
      }
    }

    outcome
  }

  /// Build, sign and package plans, in execution order
  fn firmware_plans(&self, board: &Board, paths: &BoardPaths) -> Vec<Plan> {
    let mut build = Plan::new("build");
    build.add(Operation::run("pio", ["run", "-e", board.name.as_str(), "-s"]));

    let mut sign = Plan::new("sign");
    sign.add(Operation::run(
      "openssl",
      [
        "dgst".to_string(),
        "-sign".to_string(),
        display_path(&self.config.signing_key_path),
        "-keyform".to_string(),
        "PEM".to_string(),
        "-sha256".to_string(),
        "-out".to_string(),
        display_path(&paths.signature()),
        "-binary".to_string(),
        display_path(&paths.firmware_bin()),
      ],
    ));

    let mut package = Plan::new("package");
    package.add(Operation::concat(
      vec![paths.signature(), paths.firmware_bin()],
      paths.signed_bin(),
    ));
    package.add(Operation::create_dir(paths.release_dir()));
    package.add(Operation::copy(paths.signed_bin(), paths.release_bin()));
    package.add(Operation::copy(paths.firmware_elf(), paths.release_elf()));

    vec![build, sign, package]
  }
}
