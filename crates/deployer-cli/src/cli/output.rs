//! Terminal output utilities.
//!
//! Colored status lines, key-value pairs and numbered plan steps used by the
//! command handlers.

use colored::Colorize;

/// Formatted CLI output.
pub struct Display;

impl Display {
	/// Displays a section header with underline
	///
	/// # Arguments
	/// * `text` - Header text to display
	pub fn header(text: &str) {
		println!("\n{}", text.bold().cyan());
		println!("{}", "─".repeat(text.chars().count()).cyan());
	}

	/// Displays a success message with green checkmark
	///
	/// # Arguments
	/// * `message` - Success message to display
	pub fn success(message: &str) {
		println!("{} {}", "✓".green().bold(), message);
	}

	/// Displays an error message with red X symbol to stderr
	///
	/// # Arguments
	/// * `message` - Error message to display
	pub fn error(message: &str) {
		eprintln!("{} {}", "✗".red().bold(), message.red());
	}

	/// Displays a warning message with yellow warning symbol
	///
	/// # Arguments
	/// * `message` - Warning message to display
	pub fn warning(message: &str) {
		println!("{} {}", "⚠".yellow().bold(), message.yellow());
	}

	pub fn info(message: &str) {
		println!("{} {}", "ℹ".blue().bold(), message);
	}

	/// Displays a key-value pair with bold label
	///
	/// # Arguments
	/// * `key` - Label shown before the colon
	/// * `value` - Value to display
	pub fn kv(key: &str, value: &str) {
		println!("  {} {}", format!("{}:", key).bold(), value);
	}

	/// Displays a numbered plan step with a status tag
	///
	/// # Arguments
	/// * `index` - Zero-based position in the plan
	/// * `name` - Contract name
	/// * `tag` - Short state label such as `recorded` or `deploy`
	/// * `detail` - Dimmed trailing detail, may be empty
	pub fn step(index: usize, name: &str, tag: &str, detail: &str) {
		println!(
			"  {:>2}. {:<24} {:<10} {}",
			index + 1,
			name.bold(),
			tag,
			detail.dimmed()
		);
	}

	/// Displays a numbered list of follow-up actions
	pub fn next_steps(steps: &[&str]) {
		println!("\n{}", "▸ Next Steps".bold());
		for (i, step) in steps.iter().enumerate() {
			println!("  {}. {}", i + 1, step);
		}
	}
}
