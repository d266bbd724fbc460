//! Error types for yarrboard-release with contextual messages and exit codes
//!
//! Every fatal condition in a release run maps onto one `ReleaseError`. Each
//! category knows its exit code and, where it helps, a suggestion for the user.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for yarrboard-release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, version, changelog, wrong branch)
  User = 1,
  /// System error (external command, I/O)
  System = 2,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for yarrboard-release
#[derive(Debug)]
pub enum ReleaseError {
  /// Release configuration errors
  Config(ConfigError),

  /// Firmware version could not be resolved
  Version(VersionError),

  /// Changelog section could not be extracted
  Changelog(ChangelogError),

  /// Preconditions for cutting a release
  Validation(ValidationError),

  /// External command or build step failures
  Process(ProcessError),

  /// I/O errors, optionally with what was being attempted
  Io { source: io::Error, context: Option<String> },

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  ///
  /// I/O errors keep their category (and exit code); the context leads the message.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Io { source, context } => ReleaseError::Io {
        source,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Config(_) | ReleaseError::Version(_) | ReleaseError::Changelog(_) => ExitCode::User,
      ReleaseError::Validation(_) | ReleaseError::Message { .. } => ExitCode::User,
      ReleaseError::Process(_) | ReleaseError::Io { .. } => ExitCode::System,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Version(e) => e.help_message(),
      ReleaseError::Changelog(e) => e.help_message(),
      ReleaseError::Validation(e) => e.help_message(),
      ReleaseError::Process(e) => e.help_message(),
      ReleaseError::Message { help, .. } => help.clone(),
      ReleaseError::Io { .. } => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Version(e) => write!(f, "{}", e),
      ReleaseError::Changelog(e) => write!(f, "{}", e),
      ReleaseError::Validation(e) => write!(f, "{}", e),
      ReleaseError::Process(e) => write!(f, "{}", e),
      ReleaseError::Io { source, context } => match context {
        Some(ctx) => write!(f, "{}\n{}", ctx, source),
        None => write!(f, "I/O error: {}", source),
      },
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io { source, .. } => Some(source),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io {
      source: err,
      context: None,
    }
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<regex::Error> for ReleaseError {
  fn from(err: regex::Error) -> Self {
    ReleaseError::message(format!("Pattern error: {}", err))
  }
}

impl From<glob::PatternError> for ReleaseError {
  fn from(err: glob::PatternError) -> Self {
    ReleaseError::message(format!("Glob pattern error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ReleaseError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ReleaseError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<ConfigError> for ReleaseError {
  fn from(err: ConfigError) -> Self {
    ReleaseError::Config(err)
  }
}

impl From<VersionError> for ReleaseError {
  fn from(err: VersionError) -> Self {
    ReleaseError::Version(err)
  }
}

impl From<ChangelogError> for ReleaseError {
  fn from(err: ChangelogError) -> Self {
    ReleaseError::Changelog(err)
  }
}

impl From<ValidationError> for ReleaseError {
  fn from(err: ValidationError) -> Self {
    ReleaseError::Validation(err)
  }
}

impl From<ProcessError> for ReleaseError {
  fn from(err: ProcessError) -> Self {
    ReleaseError::Process(err)
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// releases/config.json not found
  NotFound { path: PathBuf },

  /// File exists but is not a valid JSON document
  Malformed { path: PathBuf, reason: String },

  /// Missing or empty required field
  MissingField { field: String },

  /// A board entry is missing an identifying field or has the wrong shape
  InvalidBoard { index: usize, reason: String },

  /// The same board is listed twice
  DuplicateBoard { name: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some(
        "Create it with `boards`, `firmware_url_base` and `signing_key_path`, or point at another file with --config."
          .to_string(),
      ),
      ConfigError::InvalidBoard { .. } => Some(
        "Boards are either a name (\"my-board\") or an object ({\"name\": \"my-board\", \"chip_family\": \"ESP32-S3\"})."
          .to_string(),
      ),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => write!(f, "{} does not exist", path.display()),
      ConfigError::Malformed { path, reason } => {
        write!(f, "Error parsing {}: {}", path.display(), reason)
      }
      ConfigError::MissingField { field } => write!(f, "No {} found in release config", field),
      ConfigError::InvalidBoard { index, reason } => {
        write!(f, "Invalid board entry #{}: {}", index + 1, reason)
      }
      ConfigError::DuplicateBoard { name } => write!(f, "Board '{}' is listed more than once", name),
    }
  }
}

/// Firmware version resolution errors
#[derive(Debug)]
pub enum VersionError {
  /// Neither header exists
  NoSource { candidates: Vec<PathBuf> },

  /// Primary header exists but has no quoted version macro
  MacroNotFound { path: PathBuf, macro_name: String },

  /// Secondary header is missing one or more component macros
  Incomplete { path: PathBuf, missing: Vec<&'static str> },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::MacroNotFound { macro_name, .. } => {
        Some(format!("Add a line like: #define {} \"1.2.3\"", macro_name))
      }
      VersionError::Incomplete { .. } => Some(
        "Define YARRBOARD_VERSION_MAJOR, YARRBOARD_VERSION_MINOR and YARRBOARD_VERSION_PATCH as integers.".to_string(),
      ),
      VersionError::NoSource { .. } => None,
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::NoSource { candidates } => {
        let names: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        write!(f, "No firmware version source found (looked for {})", names.join(", "))
      }
      VersionError::MacroNotFound { path, macro_name } => {
        write!(f, "{} not #defined in {}", macro_name, path.display())
      }
      VersionError::Incomplete { path, missing } => {
        write!(f, "Incomplete version in {} (missing {})", path.display(), missing.join(", "))
      }
    }
  }
}

/// Changelog extraction errors
#[derive(Debug)]
pub enum ChangelogError {
  /// CHANGELOG.md not found
  NotFound { path: PathBuf },

  /// No heading for the release version
  MissingSection { version: String },
}

impl ChangelogError {
  fn help_message(&self) -> Option<String> {
    match self {
      ChangelogError::MissingSection { version } => {
        Some(format!("Needs this format: ## Version {}", version))
      }
      ChangelogError::NotFound { .. } => None,
    }
  }
}

impl fmt::Display for ChangelogError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChangelogError::NotFound { path } => write!(f, "{} does not exist", path.display()),
      ChangelogError::MissingSection { version } => {
        write!(f, "Could not extract the version {} block from the changelog", version)
      }
    }
  }
}

/// Release precondition errors
#[derive(Debug)]
pub enum ValidationError {
  /// Not on the configured release branch
  WrongBranch { expected: String, actual: String },
}

impl ValidationError {
  fn help_message(&self) -> Option<String> {
    match self {
      ValidationError::WrongBranch { expected, .. } => {
        Some(format!("Check out '{}' or run with --test to preview the release.", expected))
      }
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValidationError::WrongBranch { expected, actual } => {
        write!(f, "You are on '{}', not '{}'", actual, expected)
      }
    }
  }
}

/// External command and build step errors
#[derive(Debug)]
pub enum ProcessError {
  /// The program could not be started
  SpawnFailed { command: String, reason: String },

  /// The program ran and exited unsuccessfully
  Failed { command: String, code: Option<i32> },

  /// One or more boards did not build
  BoardsFailed { boards: Vec<String> },

  /// The publish sequence stopped part way
  PublishIncomplete {
    step: String,
    completed: Vec<String>,
    reason: String,
  },
}

impl ProcessError {
  fn help_message(&self) -> Option<String> {
    match self {
      ProcessError::SpawnFailed { command, .. } => {
        let program = command.split_whitespace().next().unwrap_or_default();
        Some(format!("Make sure `{}` is installed and on your PATH.", program))
      }
      ProcessError::BoardsFailed { .. } => {
        Some("No manifests were written. Fix the failing boards and rerun the release.".to_string())
      }
      ProcessError::PublishIncomplete { completed, .. } if !completed.is_empty() => Some(
        "Completed steps were not rolled back. Finish the remaining steps by hand from the checklist above.".to_string(),
      ),
      _ => None,
    }
  }
}

impl fmt::Display for ProcessError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProcessError::SpawnFailed { command, reason } => {
        write!(f, "Failed to run `{}`: {}", command, reason)
      }
      ProcessError::Failed { command, code } => match code {
        Some(code) => write!(f, "Command `{}` exited with status {}", command, code),
        None => write!(f, "Command `{}` was terminated by a signal", command),
      },
      ProcessError::BoardsFailed { boards } => {
        write!(f, "{} board(s) failed to build: {}", boards.len(), boards.join(", "))
      }
      ProcessError::PublishIncomplete {
        step,
        completed,
        reason,
      } => {
        write!(f, "Publishing stopped at '{}': {}", step, reason)?;
        if !completed.is_empty() {
          write!(f, "\nAlready done: {}", completed.join(", "))?;
        }
        Ok(())
      }
    }
  }
}

/// Result type alias for yarrboard-release
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Print an error to stderr with the failure marker and help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n🔴 {} 🔴\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
