pub mod http;

/// Truncate a string to at most `max_units` UTF-16 code units, adding
/// `suffix` if truncated. LINE counts its text limits this way, so a
/// character outside the BMP (most emoji) costs two units.
pub fn truncate_utf16(s: &str, max_units: usize, suffix: &str) -> String {
    if s.encode_utf16().count() <= max_units {
        return s.to_string();
    }
    let budget = max_units.saturating_sub(suffix.encode_utf16().count());
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        used += c.len_utf16();
        if used > budget {
            break;
        }
        out.push(c);
    }
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf16() {
        assert_eq!(truncate_utf16("hello", 10, "..."), "hello");
        assert_eq!(truncate_utf16("hello world", 8, "..."), "hello...");
        assert_eq!(truncate_utf16("ab", 2, "..."), "ab");
    }

    #[test]
    fn test_truncate_utf16_multibyte() {
        let s = "こんにちは世界";
        assert_eq!(truncate_utf16(s, 7, "…"), s);
        assert_eq!(truncate_utf16(s, 4, "…"), "こんに…");
    }

    #[test]
    fn test_truncate_utf16_counts_surrogate_pairs() {
        // Four emoji are eight UTF-16 units.
        let s = "😀😀😀😀";
        assert_eq!(truncate_utf16(s, 8, "…"), s);
        assert_eq!(truncate_utf16(s, 7, "…"), "😀😀😀…");
        assert_eq!(truncate_utf16(s, 6, "…"), "😀😀…");
        assert!(truncate_utf16(s, 6, "…").encode_utf16().count() <= 6);
    }
}
