//! Utility functions for rendering commands and paths

use std::path::Path;

/// Quote a single argument the way a POSIX shell would need it
///
/// Arguments made only of safe characters are returned unchanged so printed
/// commands stay readable (`pio run -e brineomatic -s`). Everything else is
/// wrapped in double quotes with `"`, `\`, `$` and `` ` `` escaped.
pub fn shell_quote(arg: &str) -> String {
  if !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | '+' | ',' | '~'))
  {
    return arg.to_string();
  }

  let mut quoted = String::with_capacity(arg.len() + 2);
  quoted.push('"');
  for c in arg.chars() {
    if matches!(c, '"' | '\\' | '$' | '`') {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}

/// Render a program and its arguments as one shell command line
pub fn render_command(program: &str, args: &[String]) -> String {
  let mut line = shell_quote(program);
  for arg in args {
    line.push(' ');
    line.push_str(&shell_quote(arg));
  }
  line
}

/// Display form of a path for printed commands
///
/// Always uses forward slashes so dry-run output is identical across platforms.
pub fn display_path(path: &Path) -> String {
  #[cfg(target_os = "windows")]
  {
    path.to_string_lossy().replace('\\', "/")
  }
  #[cfg(not(target_os = "windows"))]
  {
    path.to_string_lossy().to_string()
  }
}
