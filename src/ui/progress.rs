//! Progress indicators for the board build loop
//!
//! Uses `linya` for allocation-free progress bars

use linya::{Bar, Progress};

/// Progress bar over the boards of one release
pub struct BoardProgress {
  progress: Progress,
  bar: Bar,
}

impl BoardProgress {
  /// Create a new progress bar for `total` boards
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// Mark one more board as done
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
