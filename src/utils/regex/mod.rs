use regex::Regex;
use std::sync::LazyLock;

/// Compiled regex patterns that are reused across the codebase
pub struct RegexPatterns;

impl RegexPatterns {
    /// Regex for matching ANSI escape codes
    pub fn ansi_escape() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("Failed to compile ANSI escape regex")
        });
        &RE
    }

    /// `buy <name>` / `order 2 <name>` / `buy 2x <name>`. Captures quantity and name.
    pub fn buy_command() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?:buy|order)\s+(?:(\d{1,2})\s*x?\s+)?(.+)$")
                .expect("Failed to compile buy command regex")
        });
        &RE
    }

    /// `product <name>`.
    pub fn product_command() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^product\s+(.+)$").expect("Failed to compile product command regex")
        });
        &RE
    }

    /// Phrases asking for a better price.
    pub fn price_sensitive() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"\b(?:discount|cheaper|too expensive|so expensive|expensive|lower (?:the )?price|best price|any promo|promo code|can less|kasi discount)\b",
            )
            .expect("Failed to compile price-sensitive regex")
        });
        &RE
    }
}

#[cfg(test)]
mod tests;
