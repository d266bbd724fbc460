//! Interactive publish sequence: commit, tag, push, create the GitHub release
//!
//! Nothing runs unless the user types exactly `YES`. Steps run in a fixed
//! order and stop at the first failure; completed steps are not rolled back.

use crate::core::error::{ProcessError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::executor::Executor;
use crate::core::plan::Operation;
use crate::release::version::FirmwareVersion;
use std::io::{BufRead, Write};

pub const CONFIRMATION: &str = "YES";

/// One step of the publish sequence
#[derive(Debug, Clone)]
pub struct PublishStep {
  /// Progress label ("Pushing tags...")
  pub label: &'static str,
  pub operation: Operation,
}

/// The ordered publish steps for a release
pub fn publish_steps(version: &FirmwareVersion, release_notes: &str) -> Vec<PublishStep> {
  let tag = version.tag();
  let message = format!("Firmware release {}", tag);

  let mut gh_args = vec![
    "release".to_string(),
    "create".to_string(),
    tag.clone(),
    "--notes-file".to_string(),
    "-".to_string(),
    "--title".to_string(),
    format!("Firmware Release {}", tag),
  ];
  if version.is_prerelease() {
    gh_args.push("--prerelease".to_string());
  }

  vec![
    PublishStep {
      label: "Adding firmware files",
      operation: Operation::run("git", ["add", "releases"]),
    },
    PublishStep {
      label: "Committing changes",
      operation: Operation::run("git", ["commit", "-am", message.as_str()]),
    },
    PublishStep {
      label: "Pushing changes to GitHub",
      operation: Operation::run("git", ["push"]),
    },
    PublishStep {
      label: "Creating git tag",
      operation: Operation::run("git", ["tag", "-a", tag.as_str(), "-m", message.as_str()]),
    },
    PublishStep {
      label: "Pushing tags",
      operation: Operation::run("git", ["push", "origin", tag.as_str()]),
    },
    PublishStep {
      label: "Creating GitHub release",
      operation: Operation::run("gh", gh_args).with_stdin(release_notes),
    },
  ]
}

/// Print the manual checklist for the publish steps
pub fn print_checklist(steps: &[PublishStep]) {
  println!("Next steps:");
  for (idx, step) in steps.iter().enumerate() {
    // notes go in on stdin; show the bare command in the checklist
    let command = match &step.operation {
      Operation::Run { program, args, .. } => crate::utils::render_command(program, args),
      other => other.to_string(),
    };
    println!("{}. {}: {}", idx + 1, step.label, command);
  }
  println!();
}

/// Ask for confirmation; true only for an exact `YES`
pub fn confirm(input: &mut impl BufRead, output: &mut impl Write) -> ReleaseResult<bool> {
  write!(
    output,
    "Type {} to execute these commands and complete the release: ",
    CONFIRMATION
  )?;
  output.flush()?;

  let mut line = String::new();
  input.read_line(&mut line).context("Failed to read confirmation")?;
  Ok(line.trim_end_matches(['\r', '\n']) == CONFIRMATION)
}

/// Run the publish steps in order, stopping at the first failure
pub fn run_publish(exec: &mut Executor<'_>, steps: &[PublishStep]) -> ReleaseResult<()> {
  println!("\nExecuting release commands...\n");

  let mut completed = Vec::new();
  for (idx, step) in steps.iter().enumerate() {
    println!("{}. {}...", idx + 1, step.label);
    if let Err(err) = exec.apply(&step.operation) {
      return Err(ReleaseError::Process(ProcessError::PublishIncomplete {
        step: step.label.to_string(),
        completed,
        reason: err.to_string(),
      }));
    }
    completed.push(step.label.to_string());
  }

  Ok(())
}
