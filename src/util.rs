/// Truncate a string to `max` characters, appending an ellipsis when cut.
/// Unicode-safe: counts characters, never slices mid-codepoint.
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

/// First `max` characters of a string, with no ellipsis marker.
pub fn excerpt(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::{excerpt, truncate};

    #[test]
    fn test_truncate_unicode_safe() {
        let input = "ééééé";
        assert_eq!(truncate(input, 4), "é...");
    }

    #[test]
    fn test_truncate_small_max() {
        let input = "こんにちは";
        assert_eq!(truncate(input, 3), "こんに");
        assert_eq!(truncate(input, 0), "");
    }

    #[test]
    fn test_truncate_exact_length_untouched() {
        assert_eq!(truncate("abcdef", 6), "abcdef");
    }

    #[test]
    fn test_truncate_total_length_is_max() {
        let name: String = std::iter::repeat('x').take(75).collect();
        let out = truncate(&name, 60);
        assert_eq!(out.chars().count(), 60);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_excerpt_caps_chars() {
        assert_eq!(excerpt("hello", 3), "hel");
        assert_eq!(excerpt("hi", 10), "hi");
    }
}
