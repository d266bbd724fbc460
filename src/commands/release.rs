//! Release command implementation
//!
//! One linear pass:
//! 1. Load and validate the release config
//! 2. Resolve the firmware version and check the release branch
//! 3. Extract the release notes from CHANGELOG.md
//! 4. Build, sign and package every board
//! 5. Write the OTA manifest and update the release history
//! 6. Optionally publish (commit, tag, push, GitHub release) after confirmation

use crate::core::config::ReleaseConfig;
use crate::core::error::{ProcessError, ReleaseResult, ResultExt, ValidationError};
use crate::core::executor::{CommandRunner, Executor, SystemRunner};
use crate::core::vcs::SystemGit;
use crate::release::board::{BoardBuild, BoardOutcome, BoardStatus};
use crate::release::changelog::load_release_notes;
use crate::release::manifest::{HistoryEntry, OtaManifestEntry, ReleaseHistory, write_ota_manifest};
use crate::release::publish::{confirm, print_checklist, publish_steps, run_publish};
use crate::release::version::{FirmwareVersion, resolve_version};
use crate::release::webflash::BootstrapLocator;
use crate::ui::progress::BoardProgress;
use sha2::{Digest, Sha256};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

/// Options for one release run
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
  /// Repository root
  pub root: PathBuf,
  /// Release config path, relative to root
  pub config_path: PathBuf,
  /// Print side-effecting steps instead of running them
  pub dry_run: bool,
  /// `--publish` was given
  pub publish: bool,
}

/// Run the release command against the real toolchain and terminal
pub fn run_release(opts: &ReleaseOptions) -> ReleaseResult<()> {
  let mut runner = SystemRunner;
  let locator = BootstrapLocator::platformio();
  let stdin = io::stdin();
  let mut input = stdin.lock();
  run_release_with(opts, &mut runner, &locator, &mut input)
}

/// Run the release with injectable tools, bootstrap lookup and confirmation input
pub fn run_release_with<R: BufRead>(
  opts: &ReleaseOptions,
  runner: &mut dyn CommandRunner,
  locator: &BootstrapLocator,
  input: &mut R,
) -> ReleaseResult<()> {
  let root = opts.root.as_path();

  let config = ReleaseConfig::load(root, &opts.config_path)?;
  println!("Loaded {} board(s) from {}", config.boards.len(), config.source.display());
  for warning in config.warnings() {
    eprintln!("⚠️  {}", warning);
  }
  // a broken history file must stop the run before anything is built
  let history = ReleaseHistory::load(root)?;

  let version = resolve_version(root)?;
  if version.is_opaque() {
    eprintln!("⚠️  Version '{}' is not a semantic version; using it as-is", version);
  }

  check_release_branch(root, &config, opts.dry_run)?;

  let release_notes = load_release_notes(root, version.as_str())?;

  println!("📦 Making firmware release for version {}", version);
  if opts.dry_run {
    println!("🔍 Test mode: commands and file writes are printed, not executed");
  }
  if opts.publish {
    println!("🚀 Publishing requested; you will still be asked to confirm");
  }
  println!();

  let bootstrap = if config.boards.iter().any(|b| b.chip_family.is_some()) {
    locate_bootstrap(locator)?
  } else {
    None
  };

  let mut exec = Executor::new(root, opts.dry_run, runner);
  let outcomes = build_boards(&mut exec, &config, &version, bootstrap.as_deref());

  let failed: Vec<String> = outcomes
    .iter()
    .filter(|o| !o.is_built())
    .map(|o| o.board.name.clone())
    .collect();
  if !failed.is_empty() {
    return Err(ProcessError::BoardsFailed { boards: failed }.into());
  }

  write_manifests(&mut exec, history, &config, &version, &release_notes, &outcomes)?;

  print_summary(root, &outcomes, opts.dry_run);

  let steps = publish_steps(&version, &release_notes);
  print_checklist(&steps);

  if confirm(input, &mut io::stdout())? {
    run_publish(&mut exec, &steps)?;
    println!("\n✅ Release complete!");
  } else {
    println!("\nRelease cancelled. You can run the commands manually if needed.");
  }

  Ok(())
}

/// A real release must be cut from the configured branch
fn check_release_branch(root: &Path, config: &ReleaseConfig, dry_run: bool) -> ReleaseResult<()> {
  if dry_run {
    println!(
      "🔍 Skipping branch check (expects '{}'): git rev-parse --abbrev-ref HEAD",
      config.release_branch
    );
    return Ok(());
  }

  let branch = SystemGit::open(root)?.current_branch()?;
  if branch != config.release_branch {
    return Err(
      ValidationError::WrongBranch {
        expected: config.release_branch.clone(),
        actual: branch,
      }
      .into(),
    );
  }
  Ok(())
}

fn locate_bootstrap(locator: &BootstrapLocator) -> ReleaseResult<Option<PathBuf>> {
  let found = locator.locate()?;
  match &found {
    Some(path) => println!("Using {} for browser-flash bundles", path.display()),
    None => {
      eprintln!("⚠️  boot_app0.bin not found. Looked in:");
      for candidate in locator.candidates() {
        eprintln!("     {}", candidate);
      }
    }
  }
  Ok(found)
}

/// Build every board in config order; failures are recorded, not propagated
fn build_boards(
  exec: &mut Executor<'_>,
  config: &ReleaseConfig,
  version: &FirmwareVersion,
  bootstrap: Option<&Path>,
) -> Vec<BoardOutcome> {
  let build = BoardBuild {
    config,
    version,
    bootstrap,
  };
  let mut progress = (!exec.is_dry_run()).then(|| BoardProgress::new(config.boards.len(), "Boards"));

  let mut outcomes = Vec::with_capacity(config.boards.len());
  for board in &config.boards {
    println!("🔨 Building {} firmware", board.name);
    let outcome = build.run(exec, board);

    for warning in &outcome.warnings {
      eprintln!("⚠️  {}: {}", board.name, warning);
    }
    if let BoardStatus::Failed { step, error } = &outcome.status {
      eprintln!("❌ {}: {} step failed, skipping the rest of this board\n   {}", board.name, step, error);
    }

    if let Some(progress) = progress.as_mut() {
      progress.inc();
    }
    outcomes.push(outcome);
  }

  outcomes
}

/// Render both manifests first, then write them
fn write_manifests(
  exec: &mut Executor<'_>,
  mut history: ReleaseHistory,
  config: &ReleaseConfig,
  version: &FirmwareVersion,
  release_notes: &str,
  outcomes: &[BoardOutcome],
) -> ReleaseResult<()> {
  let entries: Vec<OtaManifestEntry> = outcomes
    .iter()
    .map(|o| OtaManifestEntry {
      board: o.board.name.clone(),
      version: version.to_string(),
      url: config.firmware_url(&o.board.name, version.as_str()),
      changelog: release_notes.to_string(),
    })
    .collect();
  let ota_write = write_ota_manifest(&entries)?;

  for outcome in outcomes {
    let name = outcome.board.name.as_str();
    let webflash_url = outcome
      .webflash_manifest
      .as_ref()
      .map(|_| config.webflash_manifest_url(name, version.as_str()));
    history.record(
      name,
      HistoryEntry::new(
        version.as_str(),
        config.firmware_url(name, version.as_str()),
        webflash_url,
        release_notes,
      ),
    );
  }
  let history_write = history.write_operation()?;

  exec.apply(&ota_write)?;
  exec.apply(&history_write)?;

  Ok(())
}

fn print_summary(root: &Path, outcomes: &[BoardOutcome], dry_run: bool) {
  println!("\nBuild complete.\n");

  for outcome in outcomes {
    let digest = if dry_run {
      "(test mode)".to_string()
    } else {
      sha256_file(&root.join(&outcome.release_bin)).unwrap_or_else(|e| format!("(unreadable: {})", e))
    };
    println!("✅ {}", outcome.release_bin.display());
    println!("   sha256: {}", digest);
    if let Some(manifest) = &outcome.webflash_manifest {
      println!("   browser flash: {}", manifest.display());
    }
    if !outcome.warnings.is_empty() {
      println!("   {} warning(s)", outcome.warnings.len());
    }
  }
  println!();
}

fn sha256_file(path: &Path) -> ReleaseResult<String> {
  let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
  Ok(format!("{:x}", Sha256::digest(&bytes)))
}
