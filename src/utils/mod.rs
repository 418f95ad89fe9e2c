use anyhow::{Context, Result};
use std::path::PathBuf;

pub mod regex;
pub mod task_tracker;

pub fn get_wahub_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("WAHUB_HOME") {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".wahub"))
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Lowercase, trim, and strip trailing punctuation for keyword matching.
pub fn normalize_phrase(text: &str) -> String {
    text.trim()
        .trim_end_matches(['?', '!', '.', ','])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
