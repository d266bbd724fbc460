//! Terminal progress display
pub mod progress;
