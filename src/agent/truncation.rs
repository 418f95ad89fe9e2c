use crate::utils::regex::RegexPatterns;
use serde_json::Value;

/// Clip a tool result before it is replayed to the model.
pub fn truncate_tool_result(result: &str, max_chars: usize) -> String {
    let clean = RegexPatterns::ansi_escape().replace_all(result, "").to_string();

    if clean.len() <= max_chars {
        return clean;
    }

    let stripped = clean.trim_start();
    if (stripped.starts_with('{') || stripped.starts_with('['))
        && let Ok(parsed) = serde_json::from_str::<Value>(&clean)
        && let Ok(compact) = serde_json::to_string(&parsed)
        && compact.len() <= max_chars
    {
        return compact;
    }

    let budget = max_chars.saturating_sub(60);
    let safe_budget = floor_char_boundary(&clean, budget);
    format!(
        "{}\n... [truncated, showed {} of {} chars]",
        &clean[..safe_budget],
        safe_budget,
        clean.len()
    )
}

/// Find the largest byte index <= `index` that is a valid char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
