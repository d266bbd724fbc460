//! Plan execution engine
//!
//! The executor is the only place that touches the file system or spawns
//! processes on behalf of a release. In dry-run mode it prints each operation
//! and does nothing else.

use crate::core::error::{ProcessError, ReleaseResult, ResultExt};
use crate::core::plan::{Operation, Plan};
use crate::utils::render_command;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
  /// Exit code, or None when terminated by a signal
  pub code: Option<i32>,
}

impl CommandStatus {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Something that can run an external program to completion
pub trait CommandRunner {
  /// Run `program` in `cwd`, wait for it, and report its status.
  ///
  /// An `Err` means the program could not be started at all.
  fn run(&mut self, cwd: &Path, program: &str, args: &[String], stdin: Option<&str>) -> io::Result<CommandStatus>;
}

/// Runs programs with `std::process::Command`, sharing our stdout/stderr
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&mut self, cwd: &Path, program: &str, args: &[String], stdin: Option<&str>) -> io::Result<CommandStatus> {
    let mut cmd = Command::new(program);
    cmd.current_dir(cwd).args(args);

    let status = match stdin {
      None => cmd.status()?,
      Some(input) => {
        let mut child = cmd.stdin(Stdio::piped()).spawn()?;
        if let Some(mut pipe) = child.stdin.take() {
          pipe.write_all(input.as_bytes())?;
        }
        child.wait()?
      }
    };

    Ok(CommandStatus { code: status.code() })
  }
}

/// Applies operations relative to a repository root
pub struct Executor<'r> {
  root: PathBuf,
  dry_run: bool,
  runner: &'r mut dyn CommandRunner,
}

impl<'r> Executor<'r> {
  pub fn new(root: &Path, dry_run: bool, runner: &'r mut dyn CommandRunner) -> Self {
    Self {
      root: root.to_path_buf(),
      dry_run,
      runner,
    }
  }

  pub fn is_dry_run(&self) -> bool {
    self.dry_run
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Apply every operation of a plan, stopping at the first failure
  pub fn apply_plan(&mut self, plan: &Plan) -> ReleaseResult<()> {
    if self.dry_run {
      print!("{}", plan.to_human_readable());
      return Ok(());
    }

    for op in &plan.operations {
      self.apply(op)?;
    }
    Ok(())
  }

  /// Apply one operation (or print it in dry-run mode)
  pub fn apply(&mut self, op: &Operation) -> ReleaseResult<()> {
    if self.dry_run {
      println!("{}", op);
      return Ok(());
    }

    match op {
      Operation::Run { program, args, stdin } => self.run(program, args, stdin.as_deref()),
      Operation::CreateDir { path } => {
        fs::create_dir_all(self.root.join(path)).with_context(|| format!("`{}` failed", op))
      }
      Operation::Copy { from, to } => fs::copy(self.root.join(from), self.root.join(to))
        .map(|_| ())
        .with_context(|| format!("`{}` failed", op)),
      Operation::Concat { parts, to } => self.concat(parts, to).with_context(|| format!("`{}` failed", op)),
      Operation::WriteFile { path, contents } => {
        fs::write(self.root.join(path), contents).with_context(|| format!("Failed to write {}", path.display()))
      }
    }
  }

  fn run(&mut self, program: &str, args: &[String], stdin: Option<&str>) -> ReleaseResult<()> {
    let status = self
      .runner
      .run(&self.root, program, args, stdin)
      .map_err(|e| ProcessError::SpawnFailed {
        command: render_command(program, args),
        reason: e.to_string(),
      })?;

    if !status.success() {
      return Err(
        ProcessError::Failed {
          command: render_command(program, args),
          code: status.code,
        }
        .into(),
      );
    }

    Ok(())
  }

  fn concat(&self, parts: &[PathBuf], to: &Path) -> io::Result<()> {
    let mut combined = Vec::new();
    for part in parts {
      combined.extend(fs::read(self.root.join(part))?);
    }
    fs::write(self.root.join(to), combined)
  }
}


#[cfg(test)]
mod tests {
  use super::testing::RecordingRunner;
  use super::*;
  use crate::core::error::ReleaseError;
  use tempfile::TempDir;

  #[test]
  fn test_dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let mut runner = RecordingRunner::new();
    let mut exec = Executor::new(dir.path(), true, &mut runner);

    exec.apply(&Operation::create_dir("releases/b")).unwrap();
    exec.apply(&Operation::write_file("releases/b/x.json", "{}")).unwrap();
    exec.apply(&Operation::run("pio", ["run"])).unwrap();

    assert!(!dir.path().join("releases").exists());
    assert!(runner.invocations.is_empty());
  }

  #[test]
  fn test_file_operations_apply() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sig"), b"SIG").unwrap();
    fs::write(dir.path().join("fw"), b"FIRMWARE").unwrap();

    let mut runner = RecordingRunner::new();
    let mut exec = Executor::new(dir.path(), false, &mut runner);

    let mut plan = Plan::new("combine");
    plan.add(Operation::concat(vec!["sig".into(), "fw".into()], "signed"));
    plan.add(Operation::create_dir("out/nested"));
    plan.add(Operation::copy("signed", "out/nested/signed.bin"));
    exec.apply_plan(&plan).unwrap();

    assert_eq!(fs::read(dir.path().join("out/nested/signed.bin")).unwrap(), b"SIGFIRMWARE");
  }

  #[test]
  fn test_failed_command_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut runner = RecordingRunner::new().fail_when("pio run");
    let mut exec = Executor::new(dir.path(), false, &mut runner);

    let err = exec.apply(&Operation::run("pio", ["run", "-e", "b"])).unwrap_err();
    match err {
      ReleaseError::Process(ProcessError::Failed { command, code }) => {
        assert_eq!(command, "pio run -e b");
        assert_eq!(code, Some(1));
      }
      other => panic!("expected process failure, got {:?}", other),
    }
  }

  #[test]
  fn test_plan_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let mut runner = RecordingRunner::new();
    let mut exec = Executor::new(dir.path(), false, &mut runner);

    let mut plan = Plan::new("copy");
    plan.add(Operation::copy("missing.bin", "out.bin"));
    plan.add(Operation::run("echo", ["never"]));

    let err = exec.apply_plan(&plan).unwrap_err();
    assert!(err.to_string().contains("cp missing.bin out.bin"));
    assert!(runner.invocations.is_empty());
  }

  #[test]
  fn test_system_runner_reports_exit_code() {
    let dir = TempDir::new().unwrap();
    let mut runner = SystemRunner;
    let status = runner
      .run(dir.path(), "git", &["--version".to_string()], None)
      .unwrap();
    assert!(status.success());

    let spawn = runner.run(dir.path(), "definitely-not-a-real-program-xyz", &[], None);
    assert!(spawn.is_err());
  }
}
