//! Plan-based operations for reviewable, dry-runnable release steps
//!
//! Every side-effecting step of a release is described as an `Operation`
//! before anything happens, which gives us:
//!
//! - **Dry-run mode**: print exactly what would happen, with zero effect
//! - **Auditability**: each operation renders as the equivalent shell command
//! - **Step-level failure**: a plan stops at the first failed operation
//!
//! # Architecture
//!
//! ```text
//! release stage (board build, bundle, manifests, publish)
//!   ↓
//! Plan (what to do)
//!   ↓
//! Executor (print or apply each operation)
//! ```

use crate::utils::{display_path, render_command, shell_quote};
use std::fmt;
use std::path::PathBuf;

/// A single side-effecting step. Paths are relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  /// Run an external program, optionally feeding text on stdin
  Run {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
  },

  /// Create a directory and its parents
  CreateDir { path: PathBuf },

  /// Copy a file
  Copy { from: PathBuf, to: PathBuf },

  /// Write the concatenation of several files to one output
  Concat { parts: Vec<PathBuf>, to: PathBuf },

  /// Write text to a file, replacing any previous content
  WriteFile { path: PathBuf, contents: String },
}

impl Operation {
  /// Run an external program
  pub fn run<I, S>(program: &str, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Operation::Run {
      program: program.to_string(),
      args: args.into_iter().map(Into::into).collect(),
      stdin: None,
    }
  }

  /// Attach stdin text to a `Run` operation (no-op for other kinds)
  pub fn with_stdin(self, input: impl Into<String>) -> Self {
    match self {
      Operation::Run { program, args, .. } => Operation::Run {
        program,
        args,
        stdin: Some(input.into()),
      },
      other => other,
    }
  }

  pub fn create_dir(path: impl Into<PathBuf>) -> Self {
    Operation::CreateDir { path: path.into() }
  }

  pub fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
    Operation::Copy {
      from: from.into(),
      to: to.into(),
    }
  }

  pub fn concat(parts: Vec<PathBuf>, to: impl Into<PathBuf>) -> Self {
    Operation::Concat { parts, to: to.into() }
  }

  pub fn write_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
    Operation::WriteFile {
      path: path.into(),
      contents: contents.into(),
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operation::Run { program, args, stdin } => {
        if let Some(input) = stdin {
          write!(f, "echo {} | ", shell_quote(input))?;
        }
        write!(f, "{}", render_command(program, args))
      }
      Operation::CreateDir { path } => write!(f, "mkdir -p {}", shell_quote(&display_path(path))),
      Operation::Copy { from, to } => write!(
        f,
        "cp {} {}",
        shell_quote(&display_path(from)),
        shell_quote(&display_path(to))
      ),
      Operation::Concat { parts, to } => {
        write!(f, "cat")?;
        for part in parts {
          write!(f, " {}", shell_quote(&display_path(part)))?;
        }
        write!(f, " > {}", shell_quote(&display_path(to)))
      }
      Operation::WriteFile { path, contents } => {
        write!(f, "cat > {} <<'EOF'\n{}\nEOF", shell_quote(&display_path(path)), contents)
      }
    }
  }
}

/// An ordered, labelled list of operations
#[derive(Debug, Clone, Default)]
pub struct Plan {
  /// What the plan accomplishes (used in progress and failure messages)
  pub label: String,

  /// Operations to perform (in order)
  pub operations: Vec<Operation>,
}

impl Plan {
  /// Create an empty plan
  pub fn new(label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      operations: Vec::new(),
    }
  }

  /// Add an operation to the plan
  pub fn add(&mut self, operation: Operation) {
    self.operations.push(operation);
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.operations.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }

  /// Render the plan as a shell-like script
  pub fn to_human_readable(&self) -> String {
    let mut out = format!("# {}\n", self.label);
    for op in &self.operations {
      out.push_str(&op.to_string());
      out.push('\n');
    }
    out
  }
}
