//! Formatting helpers for log output.

/// Upper bound for command output or file content quoted in a warning.
pub const LOG_EXCERPT_LEN: usize = 512;

/// Truncate string to max length with unicode ellipsis (`…`).
///
/// Cuts on a char boundary so multi-byte input never panics.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(1);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// [`truncate`] at [`LOG_EXCERPT_LEN`].
pub fn excerpt(s: &str) -> String {
    truncate(s, LOG_EXCERPT_LEN)
}
