// Attachment filename derivation

/// Derive a header-safe base name from a video title.
///
/// Every character other than ASCII alphanumerics, `_` and whitespace is
/// dropped, and each whitespace run becomes a single `_`. The result only
/// contains `[A-Za-z0-9_]`. An empty title, or one that sanitizes to nothing,
/// yields `fallback`.
pub fn sanitize_filename(title: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_whitespace = false;

    for c in title.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_whitespace = false;
        }
        // Anything else is dropped without ending a whitespace run,
        // so "a ! b" collapses the same way "a  b" does.
    }

    if out.is_empty() {
        fallback.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_and_collapses() {
        assert_eq!(sanitize_filename("My Video!! 2024", "audio"), "My_Video_2024");
        assert_eq!(sanitize_filename("a\t\n  b", "x"), "a_b");
        assert_eq!(sanitize_filename("keep_under score", "x"), "keep_under_score");
    }

    #[test]
    fn test_header_unsafe_characters_removed() {
        let name = sanitize_filename("evil\"; filename=\"x.exe\r\n", "x");
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_eq!(name, "evil_filenamexexe_");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(sanitize_filename("", "video"), "video");
        assert_eq!(sanitize_filename("!!!", "audio"), "audio");
        assert_eq!(sanitize_filename("日本語", "audio"), "audio");
    }
}
