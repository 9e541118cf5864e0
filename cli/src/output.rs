//! Output formatting utilities for CLI commands

use colored::Colorize;
use serialguard_shared::Status;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Status padded to a fixed width and colored by verdict
pub fn status_label(status: Status) -> String {
    let padded = format!("{:<9}", status.as_str());
    match status {
        Status::Allowed => padded.green().to_string(),
        Status::Rejected => padded.red().bold().to_string(),
        Status::Undecided => padded.yellow().to_string(),
    }
}

/// Print one decision line
pub fn decision(status: Status, subject: &str) {
    println!("{} {}", status_label(status), subject);
}
