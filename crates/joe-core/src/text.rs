// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text truncation used for chat previews.

/// Preview size of plans and query output, in characters.
pub const PLAN_SIZE: usize = 400;

/// Separator inserted where a preview was cut.
pub const CUT_SEPARATOR: &str = "\n[...SKIP...]\n";

/// Cuts `text` to `size` characters, ending with `separator`.
///
/// Returns the text unchanged and `false` when it already fits. Otherwise the
/// result is exactly `size` characters long and the flag is `true`.
pub fn cut_text(text: &str, size: usize, separator: &str) -> (String, bool) {
    if text.chars().count() <= size {
        return (text.to_string(), false);
    }

    let sep_len = separator.chars().count();
    if size <= sep_len {
        return (separator.chars().take(size).collect(), true);
    }

    let mut cut: String = text.chars().take(size - sep_len).collect();
    cut.push_str(separator);
    (cut, true)
}

/// Cuts `text` at `limit` characters, appending `...` when cut.
pub fn ellipsize(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        let (out, cut) = cut_text("Seq Scan on t", PLAN_SIZE, CUT_SEPARATOR);
        assert_eq!(out, "Seq Scan on t");
        assert!(!cut);
    }

    #[test]
    fn exact_size_is_unchanged() {
        let text = "a".repeat(PLAN_SIZE);
        let (out, cut) = cut_text(&text, PLAN_SIZE, CUT_SEPARATOR);
        assert_eq!(out, text);
        assert!(!cut);
    }

    #[test]
    fn long_text_is_cut_to_size_with_separator() {
        let text = "x".repeat(1000);
        let (out, cut) = cut_text(&text, PLAN_SIZE, CUT_SEPARATOR);
        assert!(cut);
        assert_eq!(out.chars().count(), PLAN_SIZE);
        assert!(out.ends_with(CUT_SEPARATOR));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ж".repeat(20);
        let (out, cut) = cut_text(&text, 16, "..");
        assert!(cut);
        assert_eq!(out.chars().count(), 16);
        assert!(out.starts_with("ж"));
    }

    #[test]
    fn tiny_size_keeps_exact_length() {
        let (out, cut) = cut_text("abcdefghij", 3, CUT_SEPARATOR);
        assert!(cut);
        assert_eq!(out.chars().count(), 3);
    }

    #[test]
    fn ellipsize_long_query() {
        let query = "select ".repeat(30);
        let out = ellipsize(&query, 100);
        assert_eq!(out.chars().count(), 103);
        assert!(out.ends_with("..."));
        assert_eq!(ellipsize("select 1", 100), "select 1");
    }
}
