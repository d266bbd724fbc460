//! Integration tests for release runs

use crate::helpers::{TestRepo, git, stderr, stdout};
use anyhow::Result;

#[test]
fn test_dry_run_prints_plan_and_writes_nothing() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;

  let output = repo.run_release(&["--test"], "")?;
  let out = stdout(&output);

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert!(out.contains("Making firmware release for version 1.2.0"));
  assert!(out.contains("pio run -e frothfet -s"));
  assert!(out.contains("pio run -e brineomatic -s"));
  assert!(out.contains("openssl dgst -sign keys/private.pem"));
  assert!(out.contains("releases/ota_manifest.json"));
  assert!(out.contains("gh release create v1.2.0"));
  assert!(out.contains("Release cancelled"));

  assert!(!repo.file_exists(".pio"));
  assert!(!repo.file_exists("releases/ota_manifest.json"));
  assert!(!repo.file_exists("releases/release_history.json"));
  assert!(!repo.file_exists("releases/frothfet"));

  Ok(())
}

#[test]
fn test_dry_run_from_another_directory() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  let elsewhere = repo.platformio_dir.clone();

  let output = std::process::Command::new(env!("CARGO_BIN_EXE_yarrboard-release"))
    .current_dir(&elsewhere)
    .arg("--test")
    .arg("--root")
    .arg(&repo.path)
    .env("PLATFORMIO_CORE_DIR", &repo.platformio_dir)
    .stdin(std::process::Stdio::null())
    .output()?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert!(stdout(&output).contains("version 1.2.0"));
  Ok(())
}

#[test]
fn test_missing_config_field_fails_before_building() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  repo.write_file(
    "releases/config.json",
    r#"{"boards": ["frothfet"], "firmware_url_base": "https://fw.example.com/"}"#,
  )?;

  let output = repo.run_release(&[], "YES\n")?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("No signing_key_path found in release config"));
  assert!(!stdout(&output).contains("Building"));
  assert!(!repo.file_exists(".pio"));
  Ok(())
}

#[test]
fn test_missing_config_file() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  repo.remove_file("releases/config.json")?;

  let output = repo.run_release(&["--test"], "")?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("releases/config.json does not exist"));
  Ok(())
}

#[test]
fn test_version_from_secondary_header() -> Result<()> {
  let repo = TestRepo::new("2.4.6")?;
  repo.remove_file("src/config.h")?;
  repo.write_file(
    "src/YarrboardVersion.h",
    "#define YARRBOARD_VERSION_MAJOR 2\n#define YARRBOARD_VERSION_MINOR 4\n#define YARRBOARD_VERSION_PATCH 6\n",
  )?;

  let output = repo.run_release(&["--test"], "")?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert!(stdout(&output).contains("Making firmware release for version 2.4.6"));
  Ok(())
}

#[test]
fn test_missing_changelog_section() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  repo.write_file("CHANGELOG.md", "# Changelog\n\n## Version 1.1.0\n\n* Older\n")?;

  let output = repo.run_release(&["--test"], "")?;

  assert_eq!(output.status.code(), Some(1));
  let err = stderr(&output);
  assert!(err.contains("Could not extract the version 1.2.0 block from the changelog"));
  assert!(err.contains("## Version 1.2.0"));
  Ok(())
}

#[test]
fn test_wrong_branch_blocks_real_release() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  git(&repo.path, &["checkout", "-b", "wip"])?;

  let output = repo.run_release(&[], "YES\n")?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("You are on 'wip', not 'main'"));
  assert!(!repo.file_exists(".pio"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_release_with_fake_toolchain() -> Result<()> {
  let mut repo = TestRepo::new("1.2.0")?;
  repo.install_fake_toolchain()?;

  let output = repo.run_release(&[], "no\n")?;
  let out = stdout(&output);

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert!(out.contains("Build complete."));
  assert!(out.contains("sha256:"));
  assert!(out.contains("Release cancelled"));

  assert_eq!(repo.read_file("releases/frothfet/frothfet-1.2.0.bin")?, "SIGFW");
  assert_eq!(repo.read_file("releases/brineomatic/brineomatic-1.2.0.elf")?, "ELF");

  let ota = repo.read_json("releases/ota_manifest.json")?;
  assert_eq!(ota[0]["type"], "frothfet");
  assert_eq!(ota[0]["url"], "https://fw.example.com/frothfet/frothfet-1.2.0.bin");
  assert_eq!(ota[0]["changelog"], "## Version 1.2.0\n\n* Relay fixes\n* Faster boot");

  let history = repo.read_json("releases/release_history.json")?;
  assert_eq!(history["frothfet"][0]["espwebtools_manifest"], serde_json::Value::Null);
  assert_eq!(
    history["brineomatic"][0]["espwebtools_manifest"],
    "https://fw.example.com/brineomatic/espwebtools-1.2.0/manifest.json"
  );

  // no boot_app0.bin in the empty PlatformIO dir: bundle written without it
  let flash = repo.read_json("releases/brineomatic/espwebtools-1.2.0/manifest.json")?;
  let parts: Vec<&str> = flash["builds"][0]["parts"]
    .as_array()
    .map(|parts| parts.iter().filter_map(|p| p["path"].as_str()).collect())
    .unwrap_or_default();
  assert_eq!(parts, vec!["bootloader.bin", "partitions.bin", "firmware.bin"]);
  assert!(stderr(&output).contains("boot_app0.bin not found"));

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_publish_stops_at_first_failed_step() -> Result<()> {
  let mut repo = TestRepo::new("1.2.0")?;
  repo.install_fake_toolchain()?;

  // no remote configured, so `git push` fails after the commit lands
  let output = repo.run_release(&["--publish"], "YES\n")?;

  assert_eq!(output.status.code(), Some(2));
  let err = stderr(&output);
  assert!(err.contains("Publishing stopped at 'Pushing changes to GitHub'"));
  assert!(err.contains("Already done: Adding firmware files, Committing changes"));

  let log = git(&repo.path, &["log", "-1", "--format=%s"])?;
  assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "Firmware release v1.2.0");
  let tags = git(&repo.path, &["tag", "--list"])?;
  assert!(tags.stdout.is_empty());

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_unwritable_ota_manifest_exits_with_system_error() -> Result<()> {
  let mut repo = TestRepo::new("1.2.0")?;
  repo.install_fake_toolchain()?;
  std::fs::create_dir_all(repo.path.join("releases/ota_manifest.json"))?;

  let output = repo.run_release(&[], "")?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("Failed to write releases/ota_manifest.json"));
  assert!(!repo.file_exists("releases/release_history.json"));
  Ok(())
}

#[test]
fn test_malformed_history_fails_before_building() -> Result<()> {
  let repo = TestRepo::new("1.2.0")?;
  repo.write_file("releases/release_history.json", "{not json")?;

  let output = repo.run_release(&[], "")?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Error parsing releases/release_history.json"));
  assert!(!stdout(&output).contains("Building"));
  assert!(!repo.file_exists(".pio"));
  Ok(())
}
