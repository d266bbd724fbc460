//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

pub const DEFAULT_CONFIG: &str = r#"{
    "boards": ["frothfet", {"name": "brineomatic", "chip_family": "ESP32-S3"}],
    "firmware_url_base": "https://fw.example.com/",
    "signing_key_path": "keys/private.pem"
}
"#;

/// A firmware repository on `main` with one commit
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
  /// Empty PlatformIO core dir, so the host's packages never leak in
  pub platformio_dir: PathBuf,
  /// Prepended to PATH when non-empty
  bin_dir: Option<PathBuf>,
}

impl TestRepo {
  /// Create a repo with config, version header and changelog for `version`
  pub fn new(version: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("firmware");
    let platformio_dir = root.path().join("platformio");
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(&platformio_dir)?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    let repo = Self {
      _root: root,
      path,
      platformio_dir,
      bin_dir: None,
    };
    repo.write_file("releases/config.json", DEFAULT_CONFIG)?;
    repo.write_file(
      "src/config.h",
      &format!("#pragma once\n#define YB_FIRMWARE_VERSION \"{}\"\n", version),
    )?;
    repo.write_file(
      "CHANGELOG.md",
      &format!(
        "# Changelog\n\n## Version {}\n\n* Relay fixes\n* Faster boot\n\n## Version 0.0.1\n\n* First\n",
        version
      ),
    )?;
    repo.commit("Initial firmware")?;

    Ok(repo)
  }

  /// Write a file relative to the repo root, creating parent dirs
  pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
    let path = self.path.join(rel);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
  }

  pub fn remove_file(&self, rel: &str) -> Result<()> {
    std::fs::remove_file(self.path.join(rel))?;
    Ok(())
  }

  pub fn commit(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  pub fn file_exists(&self, rel: &str) -> bool {
    self.path.join(rel).exists()
  }

  pub fn read_file(&self, rel: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(rel))?)
  }

  pub fn read_json(&self, rel: &str) -> Result<serde_json::Value> {
    let content = self.read_file(rel)?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", rel))
  }

  /// Install shell stand-ins for `pio` and `openssl` on PATH
  #[cfg(unix)]
  pub fn install_fake_toolchain(&mut self) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let bin = self.platformio_dir.join("fake-bin");
    std::fs::create_dir_all(&bin)?;

    // pio run -e <board> -s
    let pio = r#"#!/bin/sh
dir=".pio/build/$3"
mkdir -p "$dir"
printf FW > "$dir/firmware.bin"
printf ELF > "$dir/firmware.elf"
printf BOOT > "$dir/bootloader.bin"
printf PART > "$dir/partitions.bin"
"#;
    // openssl dgst ... -out <sig> -binary <bin>
    let openssl = r#"#!/bin/sh
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-out" ]; then
    printf SIG > "$2"
    exit 0
  fi
  shift
done
exit 1
"#;
    for (name, script) in [("pio", pio), ("openssl", openssl)] {
      let path = bin.join(name);
      std::fs::write(&path, script)?;
      std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    self.bin_dir = Some(bin);
    Ok(())
  }

  /// Run the release binary with `stdin` piped in
  ///
  /// Returns the output whatever the exit status; tests assert on it.
  pub fn run_release(&self, args: &[&str], stdin: &str) -> Result<Output> {
    let bin = env!("CARGO_BIN_EXE_yarrboard-release");

    let mut cmd = Command::new(bin);
    cmd
      .current_dir(&self.path)
      .args(args)
      .env("PLATFORMIO_CORE_DIR", &self.platformio_dir)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    if let Some(bin_dir) = &self.bin_dir {
      let path = std::env::var_os("PATH").unwrap_or_default();
      let mut dirs = vec![bin_dir.clone()];
      dirs.extend(std::env::split_paths(&path));
      cmd.env("PATH", std::env::join_paths(dirs)?);
    }

    let mut child = cmd.spawn().context("Failed to run yarrboard-release")?;
    if let Some(mut input) = child.stdin.take() {
      // the binary may exit before reading (config errors)
      let _ = input.write_all(stdin.as_bytes());
    }
    Ok(child.wait_with_output()?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}
