/// User Interface Module
///
/// Progress bars, colored status output, and formatted summaries for the demo CLI binary.
/// Not part of the library's spec'd surface (§2 item 14) — a manual smoke-test harness over
/// the orchestration core.
use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Progress bar manager for a single upload or download.
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new_upload(file_size: u64) -> Self {
        let bar = ProgressBar::new(file_size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_message("uploading");

        Self { bar }
    }

    pub fn new_download(total_shards: u64) -> Self {
        let bar = ProgressBar::new(total_shards);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} shards ({msg})")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_message("downloading");

        Self { bar }
    }

    pub fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Progress manager for several concurrent shard workers.
pub struct MultiOperationProgress {
    multi: MultiProgress,
    operations: Vec<ProgressBar>,
}

impl Default for MultiOperationProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiOperationProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, name: &str, total: u64) -> usize {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_prefix(name.to_string());

        let index = self.operations.len();
        self.operations.push(pb);
        index
    }

    pub fn update_operation(&self, index: usize, position: u64, message: &str) {
        if let Some(pb) = self.operations.get(index) {
            pb.set_position(position);
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_operation(&self, index: usize, message: &str) {
        if let Some(pb) = self.operations.get(index) {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn clear(&self) {
        self.multi.clear().unwrap_or(());
    }
}

/// Interactive confirmation prompt.
pub fn confirm_action(message: &str, default: bool) -> bool {
    let default_char = if default { "Y/n" } else { "y/N" };
    print!("{} {} [{}]: ", "?".yellow().bold(), message, default_char);
    io::stdout().flush().unwrap();

    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => {
            let input = input.trim().to_lowercase();
            if input.is_empty() {
                default
            } else {
                matches!(input.as_str(), "y" | "yes")
            }
        }
        Err(_) => default,
    }
}

/// Display a formatted section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("> {}", title).bold().bright_blue());
    println!("{}", "-".repeat(title.len() + 2).bright_blue());
}

/// Display operation status with an icon.
pub fn print_operation_status(operation: &str, status: &str, details: Option<&str>) {
    let (icon, color) = match status.to_lowercase().as_str() {
        "success" | "completed" | "ok" => ("+", Color::Green),
        "error" | "failed" | "fail" => ("x", Color::Red),
        "warning" | "warn" => ("!", Color::Yellow),
        "info" | "running" | "in_progress" => ("i", Color::Cyan),
        "pending" | "waiting" => ("~", Color::Yellow),
        _ => ("*", Color::White),
    };

    let status_text = format!("{} {}", icon, operation).color(color).bold();

    if let Some(details) = details {
        println!("  {} {}", status_text, details.dimmed());
    } else {
        println!("  {}", status_text);
    }
}

/// Display a step in a multi-step process.
pub fn print_step(step_num: usize, total_steps: usize, description: &str) {
    let progress = format!("[{}/{}]", step_num, total_steps);
    println!(
        "  {} {} {}",
        progress.bright_cyan().bold(),
        "->".bright_blue(),
        description
    );
}

/// Display key-value information in a formatted way.
pub fn print_key_value(key: &str, value: &str) {
    println!("  {}: {}", key.bold().bright_white(), value.bright_green());
}

/// Format a byte count in human-readable units.
pub fn format_file_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if size == 0 {
        return "0 B".to_string();
    }

    let mut size_f = size as f64;
    let mut unit_index = 0;

    while size_f >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size_f /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size_f, UNITS[unit_index])
    }
}

/// Format a duration in human-readable units.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{} seconds", secs)
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else if secs < 86400 {
        format!("{} hours", secs / 3600)
    } else {
        format!("{} days", secs / 86400)
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "[ok]".green(), message);
}

pub fn print_error(message: &str) {
    println!("{} {}", "[err]".red(), message.red());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "[warn]".yellow(), message.yellow());
}

pub fn print_info(message: &str) {
    println!("{} {}", "[info]".blue(), message);
}

pub fn print_separator() {
    println!("{}", "-".repeat(50).dimmed());
}

/// Spinner for long-running operations (contract acquisition, finalize).
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["-", "\\", "|", "/"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_file_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30 seconds");
        assert_eq!(format_duration(Duration::from_secs(90)), "1 minutes");
        assert_eq!(format_duration(Duration::from_secs(3700)), "1 hours");
        assert_eq!(format_duration(Duration::from_secs(90000)), "1 days");
    }
}
