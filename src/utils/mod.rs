use std::sync::LazyLock;

use regex::Regex;

/// Longest name produced by [`sanitize_filename`], marker included.
pub const MAX_FILENAME_CHARS: usize = 150;
const ELLIPSIS: &str = "...";

static FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Sanitize filename to remove invalid characters
///
/// Forbidden characters and stray control characters become `_`, whitespace
/// runs collapse to one space, and anything longer than
/// [`MAX_FILENAME_CHARS`] is cut and marked with `...`.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = FORBIDDEN.replace_all(filename, "_");
    let replaced: String = replaced
        .chars()
        .map(|c| if c.is_control() && !c.is_whitespace() { '_' } else { c })
        .collect();
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() > MAX_FILENAME_CHARS {
        let keep = MAX_FILENAME_CHARS - ELLIPSIS.len();
        let mut cut: String = trimmed.chars().take(keep).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        trimmed.to_string()
    }
}

/// Shorten text for one-line status displays.
pub fn truncate_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
