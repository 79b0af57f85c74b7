//! CLI output formatting utilities.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print corpus info.
    pub fn corpus_info(corpus_id: &str, version: &str, chunks: u32) {
        println!(
            "  {} {} ({}, {} chunks)",
            style("*").cyan(),
            style(corpus_id).bold(),
            style(format!("v{}", version)).dim(),
            chunks
        );
    }

    /// Print a search result.
    pub fn search_result(chunk_id: &str, scene: &str, score: f32, content: &str) {
        println!(
            "\n{} {} {} (score: {:.2})",
            style(">>").green(),
            style(scene).bold(),
            style(chunk_id).dim(),
            score
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Print a citation.
    pub fn citation(marker: usize, chunk_id: &str, quote: &str) {
        println!(
            "  {} {} {}",
            style(format!("[{}]", marker)).cyan(),
            style(chunk_id).dim(),
            content_preview(quote, 120)
        );
    }

    /// Create a spinner with a message.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content to a preview length on a char boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let truncated: String = flattened.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview_truncates() {
        let long = "word ".repeat(100);
        let preview = content_preview(&long, 20);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 23);
    }
}
