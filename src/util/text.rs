// Character-based truncation helpers; byte slicing would split multi-byte text.

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// At most `max` characters, cut back to the last word boundary when one exists.
pub fn excerpt(s: &str, max: usize) -> String {
    let s = s.trim();
    let Some((idx, _)) = s.char_indices().nth(max) else {
        return s.to_string();
    };
    let head = &s[..idx];
    // the cut already falls between words
    if s[idx..].starts_with(char::is_whitespace) {
        return head.trim_end().to_string();
    }
    match head.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => head[..ws].trim_end().to_string(),
        _ => head.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn excerpt_cuts_at_word_boundary() {
        assert_eq!(excerpt("robots weld car frames", 10), "robots");
        assert_eq!(excerpt("robots weld car frames", 11), "robots weld");
        assert_eq!(excerpt("robots", 3), "rob");
        assert_eq!(excerpt("  fits  ", 10), "fits");
    }
}
