// Terminal UI utilities

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}

/// Percentage progress bar fed with fraction-complete values.
///
/// Hidden when `enabled` is false (CI logs do not render carriage returns).
pub struct UploadProgress {
    bar: ProgressBar,
}

impl UploadProgress {
    pub fn new(message: &str, enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new(100)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn set_fraction(&self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u64;
        self.bar.set_position(percent);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
