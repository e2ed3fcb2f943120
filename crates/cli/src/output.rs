//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable durations, and Unicode symbols.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use kiln_lib::execute::{FailureKind, SkipReason, TaskStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIP: &str = "-";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One line per task: symbol, task, and failure or skip detail.
pub fn print_task(task: &str, status: &TaskStatus) {
  match status {
    TaskStatus::Succeeded => println!(
      "  {} {}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      task
    ),
    TaskStatus::Failed { kind, message } => println!(
      "  {} {} {}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
      task,
      failure_detail(*kind, message).if_supports_color(Stream::Stdout, |s| s.red())
    ),
    TaskStatus::Skipped { reason } => println!(
      "  {} {} {}",
      symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      task,
      skip_detail(reason).if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
  }
}

pub fn failure_detail(kind: FailureKind, message: &str) -> String {
  format!("[{}] {}", kind, message)
}

pub fn skip_detail(reason: &SkipReason) -> String {
  format!("(skipped: {})", reason)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
