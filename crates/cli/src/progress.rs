//! Progress reporting for CLI runs

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Record-based progress bar with a stats line in the message slot
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} ({per_sec}) {msg}",
                )
                .expect("progress template")
                .progress_chars("█▓▒░-"),
        );
        Self { bar }
    }

    pub fn update(&self, processed: usize, kept: usize, rejected: usize, sanitized: usize) {
        self.bar.set_position(processed as u64);
        let mut msg = format!("{kept} kept");
        if rejected > 0 {
            msg.push_str(&format!(" | {rejected} rejected"));
        }
        if sanitized > 0 {
            msg.push_str(&format!(" | {sanitized} sanitized"));
        }
        self.bar.set_message(msg);
    }

    pub fn set_position(&self, processed: usize) {
        self.bar.set_position(processed as u64);
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

/// Print the end-of-run summary box.
pub fn print_summary(
    input: &Path,
    output: Option<&Path>,
    total: usize,
    kept: usize,
    rejected: usize,
    sanitized: usize,
) {
    let pct = |n: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64 * 100.0
        }
    };

    println!("\n{}", "═".repeat(60));
    println!("Corpus curation complete");
    println!("{}", "═".repeat(60));
    println!("Input:         {}", input.display());
    match output {
        Some(path) => println!("Output:        {}", path.display()),
        None => println!("Output:        (dry run - no output written)"),
    }
    println!("Total:         {}", format_with_commas(total));
    println!("Kept:          {} ({:.1}%)", format_with_commas(kept), pct(kept));
    if sanitized > 0 {
        println!(
            "Sanitized:     {} ({:.1}%)",
            format_with_commas(sanitized),
            pct(sanitized)
        );
    }
    if rejected > 0 {
        println!(
            "Rejected:      {} ({:.1}%)",
            format_with_commas(rejected),
            pct(rejected)
        );
    }
    println!("{}", "═".repeat(60));
}

/// Format a number with thousand separators
fn format_with_commas(n: usize) -> String {
    n.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(std::str::from_utf8)
        .collect::<Result<Vec<&str>, _>>()
        .unwrap()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(42), "42");
        assert_eq!(format_with_commas(1234), "1,234");
        assert_eq!(format_with_commas(1234567), "1,234,567");
    }
}
