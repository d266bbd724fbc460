mod commands;
mod core;
mod release;
mod ui;
mod utils;

use clap::Parser;
use commands::release::ReleaseOptions;
use core::config::DEFAULT_CONFIG_PATH;
use core::error::{ReleaseError, print_error};
use std::path::PathBuf;

/// Build, sign and publish Yarrboard firmware for every configured board
#[derive(Parser)]
#[command(name = "yarrboard-release")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Test mode: print every command and file write instead of running it
  #[arg(long = "test")]
  test: bool,
  /// Offer to publish the release once the build finishes (still asks for YES)
  #[arg(long)]
  publish: bool,
  /// Firmware repository root
  #[arg(long, default_value = ".")]
  root: PathBuf,
  /// Release config, relative to the root
  #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
  config: PathBuf,
}

fn get_styles() -> clap::builder::Styles {
  let yellow_header = anstyle::Style::new()
    .bold()
    .underline()
    .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
  let red = anstyle::Style::new()
    .bold()
    .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

  clap::builder::Styles::styled()
    .usage(yellow_header)
    .header(yellow_header)
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(red)
    .error(red)
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  let opts = ReleaseOptions {
    root: cli.root,
    config_path: cli.config,
    dry_run: cli.test,
    publish: cli.publish,
  };

  if let Err(e) = commands::run_release(&opts) {
    handle_error(e);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
